//! Presence
//!
//! The dispatcher mirrors registry membership into a [`PresenceView`] so
//! that presence queries can be answered without a round trip through the
//! dispatcher queues. Answers are valid as of the read and may be stale by
//! the time the caller acts on them.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::connection::ConnectionId;
use super::request::UserId;

/// Why a connection stopped being reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineReason {
    /// The transport reported the connection ended
    Disconnected,
    /// A newer connection for the same user took its place
    Replaced,
    /// The outbox overflowed and the slow consumer was dropped
    Evicted,
    /// A connection already existed and the newcomer was turned away
    Rejected,
    /// The writer went away before the transport unregistered it
    Closed,
}

/// Presence change observed by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceEvent {
    Online {
        user_id: UserId,
        #[serde(skip)]
        connection_id: ConnectionId,
    },
    Offline {
        user_id: UserId,
        #[serde(skip)]
        connection_id: ConnectionId,
        reason: OfflineReason,
    },
}

impl PresenceEvent {
    pub fn user_id(&self) -> UserId {
        match self {
            PresenceEvent::Online { user_id, .. } | PresenceEvent::Offline { user_id, .. } => {
                *user_id
            }
        }
    }
}

/// Read-only snapshot of who is online. Only the dispatcher writes to it.
#[derive(Debug, Clone, Default)]
pub struct PresenceView {
    online: Arc<RwLock<HashSet<UserId>>>,
}

impl PresenceView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_online(&self, user_id: UserId) -> bool {
        self.online.read().await.contains(&user_id)
    }

    /// All online users, sorted ascending
    pub async fn list(&self) -> Vec<UserId> {
        let mut ids: Vec<_> = self.online.read().await.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn count(&self) -> usize {
        self.online.read().await.len()
    }

    pub(crate) async fn mark_online(&self, user_id: UserId) {
        self.online.write().await.insert(user_id);
    }

    pub(crate) async fn mark_offline(&self, user_id: UserId) {
        self.online.write().await.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_view_tracks_marks() {
        let view = PresenceView::new();
        view.mark_online(5).await;
        view.mark_online(2).await;

        assert!(view.is_online(5).await);
        assert_eq!(view.list().await, vec![2, 5]);
        assert_eq!(view.count().await, 2);

        view.mark_offline(5).await;
        assert!(!view.is_online(5).await);
        assert_eq!(view.count().await, 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = PresenceEvent::Offline {
            user_id: 9,
            connection_id: ConnectionId::new(),
            reason: OfflineReason::Evicted,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"offline","user_id":9,"reason":"evicted"}"#);
        assert_eq!(event.user_id(), 9);
    }
}
