//! # Chathub
//!
//! Real-time connection hub for a chat backend. Tracks which users hold a
//! live connection and fans events out to them without letting a slow client
//! hold up anyone else.
//!
//! ## Features
//!
//! - **Single-owner registry**: one dispatcher task owns all connection state
//! - **Bounded memory**: every per-connection outbox has a fixed capacity
//! - **Slow-consumer eviction**: a full outbox drops that connection only
//! - **Presence**: online checks and a broadcast stream of presence changes
//! - **Transports**: WebSocket for clients, HTTP for backend producers
//!
//! ## Modules
//!
//! - [`hub`]: Registry, dispatcher and producer facade
//! - [`websocket`]: WebSocket transport
//! - [`api`]: HTTP server with Axum
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chathub::hub::{Hub, HubConfig, PayloadExt};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = Hub::new(HubConfig::default());
//!
//!     let (handle, mut outbox) = hub.connect(42);
//!     hub.register(handle).await?;
//!
//!     hub.deliver([42, 43], r#"{"type":"message.new","id":1}"#).await?;
//!
//!     if let Some(payload) = outbox.recv().await {
//!         println!("{}", payload.as_text().unwrap_or("<binary>"));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod hub;
pub mod websocket;

// Re-export top-level types for convenience
pub use hub::{
    ConnectionHandle, ConnectionId, DuplicatePolicy, FanoutRequest, Hub, HubConfig, HubError,
    HubResult, OfflineReason, Outbox, OverflowPolicy, Payload, PayloadExt, PresenceEvent,
    StatsSnapshot, UserId,
};

pub use api::{build_router, serve, ApiError, AppState};

pub use websocket::{websocket_handler, ClientMessage, ServerEvent};

pub use config::{Config, ConfigError, LoggingConfig, ServerConfig, WebSocketConfig};
