//! Dispatcher Loop
//!
//! The only task that touches the [`Registry`]. It drains three bounded
//! queues (register, unregister, fan-out) and applies each request to
//! completion before looking at the next one.
//!
//! Every request is stamped with a hub-wide sequence number when it is
//! submitted. The dispatcher keeps one request of lookahead per queue and
//! always applies the lowest stamp, so requests from one producer are applied
//! in the order they were submitted even when they travel on different
//! queues. Each iteration applies exactly one request, so at most one
//! registration or unregistration runs before fan-out is checked again.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc};

use super::connection::{ConnectionHandle, ConnectionId, PushError};
use super::policy::{DuplicatePolicy, OverflowPolicy};
use super::presence::{OfflineReason, PresenceEvent, PresenceView};
use super::registry::{Admission, Registry};
use super::request::{FanoutRequest, UserId};
use super::stats::HubStats;

/// Request to drop a specific connection
#[derive(Debug, Clone, Copy)]
pub(crate) struct Unregister {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
}

/// A queued request and its submission stamp
#[derive(Debug)]
pub(crate) struct Sequenced<T> {
    pub seq: u64,
    pub item: T,
}

/// Hands out stamps in enqueue order across all three queues
#[derive(Debug, Default)]
pub(crate) struct Sequencer {
    next: Mutex<u64>,
}

impl Sequencer {
    /// Stamp `item` and enqueue it through an already reserved slot. Stamping
    /// and enqueueing happen under one lock, so every queue stays sorted by
    /// stamp.
    pub fn send<T>(&self, permit: mpsc::Permit<'_, Sequenced<T>>, item: T) {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        permit.send(Sequenced { seq: *next, item });
        *next += 1;
    }
}

/// The next request to apply, chosen across all three queues
enum Next {
    Register(ConnectionHandle),
    Unregister(Unregister),
    Fanout(FanoutRequest),
}

pub(crate) struct Dispatcher {
    registry: Registry,
    register_rx: mpsc::Receiver<Sequenced<ConnectionHandle>>,
    unregister_rx: mpsc::Receiver<Sequenced<Unregister>>,
    fanout_rx: mpsc::Receiver<Sequenced<FanoutRequest>>,
    next_register: Option<Sequenced<ConnectionHandle>>,
    next_unregister: Option<Sequenced<Unregister>>,
    next_fanout: Option<Sequenced<FanoutRequest>>,
    presence: PresenceView,
    presence_tx: broadcast::Sender<PresenceEvent>,
    stats: Arc<HubStats>,
    overflow_policy: OverflowPolicy,
    duplicate_policy: DuplicatePolicy,
}

/// Receiving ends of the dispatcher queues
pub(crate) struct Queues {
    pub register_rx: mpsc::Receiver<Sequenced<ConnectionHandle>>,
    pub unregister_rx: mpsc::Receiver<Sequenced<Unregister>>,
    pub fanout_rx: mpsc::Receiver<Sequenced<FanoutRequest>>,
}

impl Dispatcher {
    pub fn new(
        queues: Queues,
        presence: PresenceView,
        presence_tx: broadcast::Sender<PresenceEvent>,
        stats: Arc<HubStats>,
        overflow_policy: OverflowPolicy,
        duplicate_policy: DuplicatePolicy,
    ) -> Self {
        Self {
            registry: Registry::new(),
            register_rx: queues.register_rx,
            unregister_rx: queues.unregister_rx,
            fanout_rx: queues.fanout_rx,
            next_register: None,
            next_unregister: None,
            next_fanout: None,
            presence,
            presence_tx,
            stats,
            overflow_policy,
            duplicate_policy,
        }
    }

    /// Run until every facade handle has been dropped
    pub async fn run(mut self) {
        tracing::info!(
            overflow_policy = %self.overflow_policy,
            duplicate_policy = %self.duplicate_policy,
            "Dispatcher started"
        );

        loop {
            self.fill_lookahead();

            match self.take_next() {
                Some(Next::Register(handle)) => self.register(handle).await,
                Some(Next::Unregister(request)) => self.unregister(request).await,
                Some(Next::Fanout(request)) => self.deliver(request).await,
                None => {
                    // Nothing pending anywhere: park until some queue has work
                    tokio::select! {
                        Some(request) = self.register_rx.recv() => {
                            self.next_register = Some(request);
                        }
                        Some(request) = self.unregister_rx.recv() => {
                            self.next_unregister = Some(request);
                        }
                        Some(request) = self.fanout_rx.recv() => {
                            self.next_fanout = Some(request);
                        }
                        else => break,
                    }
                }
            }
        }

        tracing::info!(
            connections = self.registry.len(),
            "All hub handles dropped, dispatcher stopping"
        );
    }

    /// Top up empty lookahead slots until a full pass finds nothing new.
    ///
    /// Stamps are issued in enqueue order, so once a stamp has been observed
    /// every lower stamp is already enqueued and shows up at the head of its
    /// queue in the pass that follows.
    fn fill_lookahead(&mut self) {
        loop {
            let mut found = false;

            if self.next_register.is_none() {
                if let Ok(request) = self.register_rx.try_recv() {
                    self.next_register = Some(request);
                    found = true;
                }
            }
            if self.next_unregister.is_none() {
                if let Ok(request) = self.unregister_rx.try_recv() {
                    self.next_unregister = Some(request);
                    found = true;
                }
            }
            if self.next_fanout.is_none() {
                if let Ok(request) = self.fanout_rx.try_recv() {
                    self.next_fanout = Some(request);
                    found = true;
                }
            }

            if !found {
                break;
            }
        }
    }

    /// Take the pending request with the lowest stamp
    fn take_next(&mut self) -> Option<Next> {
        let register = self.next_register.as_ref().map(|r| r.seq);
        let unregister = self.next_unregister.as_ref().map(|r| r.seq);
        let fanout = self.next_fanout.as_ref().map(|r| r.seq);

        let lowest = [register, unregister, fanout].into_iter().flatten().min()?;

        if register == Some(lowest) {
            self.next_register.take().map(|r| Next::Register(r.item))
        } else if unregister == Some(lowest) {
            self.next_unregister.take().map(|r| Next::Unregister(r.item))
        } else {
            self.next_fanout.take().map(|r| Next::Fanout(r.item))
        }
    }

    async fn register(&mut self, handle: ConnectionHandle) {
        let user_id = handle.user_id();
        let connection_id = handle.id();

        if handle.is_closed() {
            tracing::debug!(
                user_id,
                connection_id = %connection_id,
                "Connection closed before registration, ignoring"
            );
            return;
        }

        match self.registry.insert(handle, self.duplicate_policy) {
            Admission::Inserted => {
                self.stats.record_registered();
                self.presence.mark_online(user_id).await;
                tracing::info!(
                    user_id,
                    connection_id = %connection_id,
                    total = self.registry.len(),
                    "User connected"
                );
            }
            Admission::Replaced(previous) => {
                let previous_id = previous.id();
                previous.close();
                self.stats.record_registered();
                self.stats.record_replaced();
                tracing::info!(
                    user_id,
                    connection_id = %connection_id,
                    previous = %previous_id,
                    total = self.registry.len(),
                    "User reconnected, previous connection closed"
                );
                self.publish(PresenceEvent::Offline {
                    user_id,
                    connection_id: previous_id,
                    reason: OfflineReason::Replaced,
                });
            }
            Admission::Rejected(newcomer) => {
                newcomer.close();
                self.stats.record_rejected();
                tracing::info!(
                    user_id,
                    connection_id = %connection_id,
                    "User already connected, new connection rejected"
                );
                self.publish(PresenceEvent::Offline {
                    user_id,
                    connection_id,
                    reason: OfflineReason::Rejected,
                });
                return;
            }
        }

        self.publish(PresenceEvent::Online {
            user_id,
            connection_id,
        });
    }

    async fn unregister(&mut self, request: Unregister) {
        let Unregister {
            user_id,
            connection_id,
        } = request;

        match self.registry.remove_if_current(user_id, connection_id) {
            Some(handle) => {
                handle.close();
                self.stats.record_unregistered();
                self.presence.mark_offline(user_id).await;
                tracing::info!(
                    user_id,
                    connection_id = %connection_id,
                    total = self.registry.len(),
                    "User disconnected"
                );
                self.publish(PresenceEvent::Offline {
                    user_id,
                    connection_id,
                    reason: OfflineReason::Disconnected,
                });
            }
            None => {
                self.stats.record_stale_unregister();
                tracing::debug!(
                    user_id,
                    connection_id = %connection_id,
                    "Unregister for a connection that is not current, ignoring"
                );
            }
        }
    }

    async fn deliver(&mut self, request: FanoutRequest) {
        self.stats.record_fanout();

        let mut delivered = 0usize;
        let mut offline = 0usize;

        for &user_id in request.recipients() {
            let outcome = match self.registry.get(user_id) {
                Some(handle) => handle.try_push(request.payload().clone()),
                None => {
                    offline += 1;
                    self.stats.record_skipped_offline();
                    continue;
                }
            };

            match outcome {
                Ok(()) => {
                    delivered += 1;
                    self.stats.record_delivered();
                    tracing::trace!(user_id, kind = request.kind_tag(), "Payload queued");
                }
                Err(PushError::Full) => self.overflow(user_id, request.kind_tag()).await,
                Err(PushError::Closed) => {
                    tracing::debug!(user_id, "Writer gone before unregister, removing");
                    self.drop_connection(user_id, OfflineReason::Closed).await;
                }
            }
        }

        tracing::debug!(
            kind = request.kind_tag(),
            recipients = request.recipients().len(),
            delivered,
            offline,
            bytes = request.payload().len(),
            "Fan-out processed"
        );
    }

    async fn overflow(&mut self, user_id: UserId, kind: &str) {
        match self.overflow_policy {
            OverflowPolicy::Evict => {
                self.stats.record_evicted();
                tracing::warn!(user_id, kind, "Outbox full, evicting slow connection");
                self.drop_connection(user_id, OfflineReason::Evicted).await;
            }
            OverflowPolicy::DropNewest => {
                self.stats.record_dropped();
                tracing::warn!(user_id, kind, "Outbox full, dropping payload");
            }
        }
    }

    async fn drop_connection(&mut self, user_id: UserId, reason: OfflineReason) {
        if let Some(handle) = self.registry.remove(user_id) {
            let connection_id = handle.id();
            handle.close();
            self.presence.mark_offline(user_id).await;
            self.publish(PresenceEvent::Offline {
                user_id,
                connection_id,
                reason,
            });
        }
    }

    fn publish(&self, event: PresenceEvent) {
        // No subscribers is fine
        let _ = self.presence_tx.send(event);
    }
}
