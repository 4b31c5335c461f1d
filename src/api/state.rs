//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::hub::Hub;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Connection hub shared by the HTTP producers and the WebSocket transport
    pub hub: Hub,
    pub config: Arc<Config>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create state with a fresh hub built from `config.hub`
    pub fn new(config: Config) -> Self {
        let hub = Hub::new(config.hub.clone());
        Self::with_hub(hub, config)
    }

    /// Create state around an existing hub
    pub fn with_hub(hub: Hub, config: Config) -> Self {
        Self {
            hub,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
