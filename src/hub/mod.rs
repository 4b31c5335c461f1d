//! Connection Hub
//!
//! Tracks which users are reachable over a live connection and fans events
//! out to them.
//!
//! ## Architecture
//!
//! - **Dispatcher**: a single task owns the registry of live connections and
//!   is the only code that mutates it
//! - **Hub**: the cloneable facade producers use; every mutation is a message
//!   on one of three bounded queues (register, unregister, fan-out)
//! - **PresenceView**: a read-only mirror of registry membership for
//!   `is_online` / `list_online` / `count`
//!
//! Delivery is best effort. An offline recipient is skipped, and a recipient
//! whose outbox is full is handled by the configured [`OverflowPolicy`].
//! Memory is bounded by `connections × outbox_capacity` regardless of how
//! fast producers submit.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chathub::hub::{Hub, HubConfig};
//!
//! # async fn demo() -> Result<(), chathub::hub::HubError> {
//! let hub = Hub::new(HubConfig::default());
//!
//! let (handle, mut outbox) = hub.connect(7);
//! hub.register(handle).await?;
//!
//! hub.deliver([7, 8], r#"{"type":"message.new"}"#).await?;
//! while let Some(payload) = outbox.recv().await {
//!     // write payload to the socket
//! #   let _ = payload;
//! }
//! # Ok(())
//! # }
//! ```

mod connection;
mod dispatcher;
mod error;
mod policy;
mod presence;
mod registry;
mod request;
mod stats;

pub use connection::{ConnectionHandle, ConnectionId, Outbox, PushError};
pub use error::{HubError, HubResult};
pub use policy::{DuplicatePolicy, OverflowPolicy};
pub use presence::{OfflineReason, PresenceEvent, PresenceView};
pub use request::{FanoutRequest, Payload, PayloadExt, UserId};
pub use stats::{HubStats, StatsSnapshot};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use dispatcher::{Dispatcher, Queues, Sequenced, Sequencer, Unregister};

/// Hub configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Payloads buffered per connection before the overflow policy applies
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,

    /// Capacity of the register queue
    #[serde(default = "default_register_queue")]
    pub register_queue: usize,

    /// Capacity of the unregister queue
    #[serde(default = "default_unregister_queue")]
    pub unregister_queue: usize,

    /// Capacity of the fan-out queue
    #[serde(default = "default_fanout_queue")]
    pub fanout_queue: usize,

    #[serde(default)]
    pub overflow_policy: OverflowPolicy,

    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Presence events retained for slow subscribers
    #[serde(default = "default_presence_channel")]
    pub presence_channel: usize,
}

fn default_outbox_capacity() -> usize {
    256
}

fn default_register_queue() -> usize {
    256
}

fn default_unregister_queue() -> usize {
    256
}

fn default_fanout_queue() -> usize {
    1024
}

fn default_presence_channel() -> usize {
    256
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: default_outbox_capacity(),
            register_queue: default_register_queue(),
            unregister_queue: default_unregister_queue(),
            fanout_queue: default_fanout_queue(),
            overflow_policy: OverflowPolicy::default(),
            duplicate_policy: DuplicatePolicy::default(),
            presence_channel: default_presence_channel(),
        }
    }
}

/// Producer-facing entry point. Cheap to clone; the dispatcher stops once
/// every clone has been dropped.
#[derive(Debug, Clone)]
pub struct Hub {
    register_tx: mpsc::Sender<Sequenced<ConnectionHandle>>,
    unregister_tx: mpsc::Sender<Sequenced<Unregister>>,
    fanout_tx: mpsc::Sender<Sequenced<FanoutRequest>>,
    sequencer: Arc<Sequencer>,
    presence: PresenceView,
    presence_tx: broadcast::Sender<PresenceEvent>,
    stats: Arc<HubStats>,
    config: HubConfig,
}

impl Hub {
    /// Create a hub and spawn its dispatcher on the current Tokio runtime
    pub fn new(config: HubConfig) -> Self {
        let (register_tx, register_rx) = mpsc::channel(config.register_queue.max(1));
        let (unregister_tx, unregister_rx) = mpsc::channel(config.unregister_queue.max(1));
        let (fanout_tx, fanout_rx) = mpsc::channel(config.fanout_queue.max(1));
        let (presence_tx, _) = broadcast::channel(config.presence_channel.max(1));

        let presence = PresenceView::new();
        let stats = Arc::new(HubStats::default());

        let dispatcher = Dispatcher::new(
            Queues {
                register_rx,
                unregister_rx,
                fanout_rx,
            },
            presence.clone(),
            presence_tx.clone(),
            Arc::clone(&stats),
            config.overflow_policy,
            config.duplicate_policy,
        );
        tokio::spawn(dispatcher.run());

        Self {
            register_tx,
            unregister_tx,
            fanout_tx,
            sequencer: Arc::new(Sequencer::default()),
            presence,
            presence_tx,
            stats,
            config,
        }
    }

    /// Create a connection for `user_id` sized by `outbox_capacity`.
    /// The handle still has to be passed to [`Hub::register`].
    pub fn connect(&self, user_id: UserId) -> (ConnectionHandle, Outbox) {
        ConnectionHandle::new(user_id, self.config.outbox_capacity)
    }

    /// Hand a connection to the hub. A previous connection for the same
    /// user is dealt with according to the duplicate policy.
    pub async fn register(&self, handle: ConnectionHandle) -> HubResult<()> {
        self.enqueue(&self.register_tx, handle, "register").await
    }

    /// Drop `connection_id` if it is still the registered connection for
    /// `user_id`; otherwise nothing happens.
    pub async fn unregister(&self, user_id: UserId, connection_id: ConnectionId) -> HubResult<()> {
        let request = Unregister {
            user_id,
            connection_id,
        };
        self.enqueue(&self.unregister_tx, request, "unregister").await
    }

    /// Fire-and-forget fan-out of `payload` to `recipients`
    pub async fn deliver(
        &self,
        recipients: impl IntoIterator<Item = UserId>,
        payload: impl Into<Payload>,
    ) -> HubResult<()> {
        self.submit(FanoutRequest::new(recipients, payload)).await
    }

    /// Submit a prepared fan-out request
    pub async fn submit(&self, request: FanoutRequest) -> HubResult<()> {
        if request.recipients().is_empty() {
            return Ok(());
        }

        self.enqueue(&self.fanout_tx, request, "fanout").await
    }

    /// Serialize `value` as JSON and fan it out
    pub async fn deliver_json<T: Serialize>(
        &self,
        recipients: impl IntoIterator<Item = UserId>,
        kind: &str,
        value: &T,
    ) -> HubResult<()> {
        let payload = serde_json::to_vec(value)?;
        self.submit(FanoutRequest::new(recipients, payload).kind(kind))
            .await
    }

    /// Best-effort delivery to a single user. Succeeds even when the user is
    /// not connected.
    pub async fn send_to_user(&self, user_id: UserId, payload: impl Into<Payload>) -> HubResult<()> {
        self.deliver([user_id], payload).await
    }

    /// Serialize `value` as JSON and send it to a single user
    pub async fn send_json<T: Serialize>(
        &self,
        user_id: UserId,
        kind: &str,
        value: &T,
    ) -> HubResult<()> {
        self.deliver_json([user_id], kind, value).await
    }

    pub async fn is_online(&self, user_id: UserId) -> bool {
        self.presence.is_online(user_id).await
    }

    /// Users with a registered connection, sorted ascending
    pub async fn list_online(&self) -> Vec<UserId> {
        self.presence.list().await
    }

    /// Number of registered connections
    pub async fn count(&self) -> usize {
        self.presence.count().await
    }

    /// Subscribe to presence changes. Lagging receivers skip events.
    pub fn subscribe_presence(&self) -> broadcast::Receiver<PresenceEvent> {
        self.presence_tx.subscribe()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Wait for queue space, then stamp and enqueue `item`
    async fn enqueue<T>(
        &self,
        tx: &mpsc::Sender<Sequenced<T>>,
        item: T,
        queue: &'static str,
    ) -> HubResult<()> {
        let permit = tx
            .reserve()
            .await
            .map_err(|_| HubError::DispatcherStopped(queue))?;
        self.sequencer.send(permit, item);
        Ok(())
    }
}
