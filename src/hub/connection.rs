//! Connection Handles
//!
//! A live connection is split in two halves when it is created:
//!
//! - [`ConnectionHandle`] holds the only sending end of the outbox. It is
//!   moved into the hub on registration and owned by the dispatcher from
//!   then on. Dropping it closes the outbox.
//! - [`Outbox`] is the receiving end, kept by the connection's writer task.
//!   When it yields `None` the hub has let go of the connection and the
//!   writer should close the socket.

use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::request::{Payload, UserId};

/// Unique identifier for one connection (server-generated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a push onto an outbox did not happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The outbox holds `capacity` payloads already
    Full,
    /// The writer dropped its end
    Closed,
}

/// The hub's side of a live connection
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: UserId,
    sender: mpsc::Sender<Payload>,
}

impl ConnectionHandle {
    /// Create a connection for `user_id` with an outbox of `capacity` payloads
    pub fn new(user_id: UserId, capacity: usize) -> (Self, Outbox) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let id = ConnectionId::new();

        let handle = Self {
            id,
            user_id,
            sender,
        };
        let outbox = Outbox {
            id,
            user_id,
            receiver,
        };

        (handle, outbox)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Non-blocking push; never waits for the writer
    pub fn try_push(&self, payload: Payload) -> Result<(), PushError> {
        self.sender.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => PushError::Full,
            TrySendError::Closed(_) => PushError::Closed,
        })
    }

    /// Number of payloads waiting in the outbox
    pub fn buffered(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Whether the writer has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Close the outbox. The writer still drains whatever is buffered and
    /// then observes the end of the stream.
    pub fn close(self) {
        drop(self);
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("buffered", &self.buffered())
            .finish()
    }
}

/// The writer's side of a live connection
#[derive(Debug)]
pub struct Outbox {
    id: ConnectionId,
    user_id: UserId,
    receiver: mpsc::Receiver<Payload>,
}

impl Outbox {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Wait for the next payload. `None` once the hub closed the outbox and
    /// everything buffered has been drained.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.receiver.recv().await
    }

    /// Take a payload if one is buffered
    pub fn try_recv(&mut self) -> Option<Payload> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let (a, _) = ConnectionHandle::new(1, 4);
        let (b, _) = ConnectionHandle::new(1, 4);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_halves_share_identity() {
        let (handle, outbox) = ConnectionHandle::new(42, 4);
        assert_eq!(handle.id(), outbox.id());
        assert_eq!(handle.user_id(), 42);
        assert_eq!(outbox.user_id(), 42);
    }

    #[test]
    fn test_push_until_full() {
        let (handle, mut outbox) = ConnectionHandle::new(1, 2);

        assert_eq!(handle.try_push("a".into()), Ok(()));
        assert_eq!(handle.try_push("b".into()), Ok(()));
        assert_eq!(handle.buffered(), 2);
        assert_eq!(handle.try_push("c".into()), Err(PushError::Full));

        assert_eq!(outbox.try_recv(), Some(Payload::from("a")));
        assert_eq!(handle.buffered(), 1);
        assert_eq!(handle.try_push("c".into()), Ok(()));
    }

    #[test]
    fn test_push_after_writer_gone() {
        let (handle, outbox) = ConnectionHandle::new(1, 2);
        drop(outbox);

        assert!(handle.is_closed());
        assert_eq!(handle.try_push("a".into()), Err(PushError::Closed));
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let (handle, mut outbox) = ConnectionHandle::new(1, 4);
        handle.try_push("last".into()).unwrap();
        handle.close();

        assert_eq!(outbox.recv().await, Some(Payload::from("last")));
        assert_eq!(outbox.recv().await, None);
        assert_eq!(outbox.try_recv(), None);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (handle, _outbox) = ConnectionHandle::new(1, 0);
        assert_eq!(handle.capacity(), 1);
    }
}
