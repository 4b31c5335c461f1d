//! Connection Registry
//!
//! Plain map from user id to the single live handle for that user. It has no
//! interior locking: the dispatcher owns it exclusively, so every
//! check-then-act sequence below runs without interleaving.

use std::collections::HashMap;

use super::connection::{ConnectionHandle, ConnectionId};
use super::policy::DuplicatePolicy;
use super::request::UserId;

/// Result of inserting a handle
#[derive(Debug)]
pub enum Admission {
    /// No previous handle for the user
    Inserted,
    /// The previous handle was displaced and must be closed
    Replaced(ConnectionHandle),
    /// The existing handle was kept; the newcomer is handed back to be closed
    Rejected(ConnectionHandle),
}

#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<UserId, ConnectionHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `handle` according to `policy`
    pub fn insert(&mut self, handle: ConnectionHandle, policy: DuplicatePolicy) -> Admission {
        let user_id = handle.user_id();

        match (self.connections.contains_key(&user_id), policy) {
            (true, DuplicatePolicy::Reject) => Admission::Rejected(handle),
            _ => match self.connections.insert(user_id, handle) {
                Some(previous) => Admission::Replaced(previous),
                None => Admission::Inserted,
            },
        }
    }

    /// Remove the entry for `user_id` only if it is the connection
    /// `connection_id`. A stale request for a replaced connection leaves the
    /// newer handle in place.
    pub fn remove_if_current(
        &mut self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Option<ConnectionHandle> {
        let is_current = self
            .connections
            .get(&user_id)
            .is_some_and(|current| current.id() == connection_id);

        if is_current {
            self.connections.remove(&user_id)
        } else {
            None
        }
    }

    /// Remove the entry for `user_id` unconditionally
    pub fn remove(&mut self, user_id: UserId) -> Option<ConnectionHandle> {
        self.connections.remove(&user_id)
    }

    pub fn get(&self, user_id: UserId) -> Option<&ConnectionHandle> {
        self.connections.get(&user_id)
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.connections.contains_key(&user_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_new_user() {
        let mut registry = Registry::new();
        let (handle, _outbox) = ConnectionHandle::new(7, 4);

        assert!(matches!(
            registry.insert(handle, DuplicatePolicy::Replace),
            Admission::Inserted
        ));
        assert!(registry.contains(7));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_replace_returns_previous() {
        let mut registry = Registry::new();
        let (first, _o1) = ConnectionHandle::new(7, 4);
        let (second, _o2) = ConnectionHandle::new(7, 4);
        let first_id = first.id();
        let second_id = second.id();

        registry.insert(first, DuplicatePolicy::Replace);
        match registry.insert(second, DuplicatePolicy::Replace) {
            Admission::Replaced(previous) => assert_eq!(previous.id(), first_id),
            other => panic!("Expected Replaced, got {:?}", other),
        }

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(7).map(|h| h.id()), Some(second_id));
    }

    #[test]
    fn test_reject_keeps_existing() {
        let mut registry = Registry::new();
        let (first, _o1) = ConnectionHandle::new(7, 4);
        let (second, _o2) = ConnectionHandle::new(7, 4);
        let first_id = first.id();
        let second_id = second.id();

        registry.insert(first, DuplicatePolicy::Reject);
        match registry.insert(second, DuplicatePolicy::Reject) {
            Admission::Rejected(newcomer) => assert_eq!(newcomer.id(), second_id),
            other => panic!("Expected Rejected, got {:?}", other),
        }

        assert_eq!(registry.get(7).map(|h| h.id()), Some(first_id));
    }

    #[test]
    fn test_stale_remove_is_noop() {
        let mut registry = Registry::new();
        let (first, _o1) = ConnectionHandle::new(7, 4);
        let (second, _o2) = ConnectionHandle::new(7, 4);
        let first_id = first.id();
        let second_id = second.id();

        registry.insert(first, DuplicatePolicy::Replace);
        registry.insert(second, DuplicatePolicy::Replace);

        assert!(registry.remove_if_current(7, first_id).is_none());
        assert!(registry.contains(7));

        let removed = registry.remove_if_current(7, second_id);
        assert_eq!(removed.map(|h| h.id()), Some(second_id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_absent_user() {
        let mut registry = Registry::new();
        assert!(registry.remove_if_current(1, ConnectionId::new()).is_none());
        assert!(registry.remove(1).is_none());
    }
}
