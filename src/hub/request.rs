//! Fan-out Requests
//!
//! A fan-out request is a single delivery intent: one payload for a set of
//! recipients. Payloads are already serialized by the producer and are shared
//! between recipients without copying.

use bytes::Bytes;
use std::collections::HashSet;

/// Stable identifier of a user account
pub type UserId = i64;

/// Immutable serialized event body. Clones share one buffer, so a fan-out
/// copies the bytes zero times regardless of recipient count.
pub type Payload = Bytes;

/// Text view of a payload, used to pick the WebSocket frame type
pub trait PayloadExt {
    /// The payload as UTF-8 text, if it is valid
    fn as_text(&self) -> Option<&str>;
}

impl PayloadExt for Payload {
    fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(self).ok()
    }
}

/// A delivery intent consumed exactly once by the dispatcher
#[derive(Debug, Clone)]
pub struct FanoutRequest {
    recipients: Vec<UserId>,
    payload: Payload,
    kind: Option<String>,
}

impl FanoutRequest {
    /// Build a request. Duplicate recipients are collapsed, keeping the
    /// first occurrence, so each user receives the payload at most once.
    pub fn new(recipients: impl IntoIterator<Item = UserId>, payload: impl Into<Payload>) -> Self {
        let mut seen = HashSet::new();
        let recipients = recipients
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        Self {
            recipients,
            payload: payload.into(),
            kind: None,
        }
    }

    /// Tag the request with a routing kind (e.g. "message.new").
    /// Only used for logging.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn recipients(&self) -> &[UserId] {
        &self.recipients
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn kind_tag(&self) -> &str {
        self.kind.as_deref().unwrap_or("untyped")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_recipients_collapse() {
        let req = FanoutRequest::new(vec![3, 1, 3, 2, 1], "hi");
        assert_eq!(req.recipients(), &[3, 1, 2]);
    }

    #[test]
    fn test_kind_defaults_to_untyped() {
        let req = FanoutRequest::new([1], "x");
        assert_eq!(req.kind_tag(), "untyped");

        let req = req.kind("typing");
        assert_eq!(req.kind_tag(), "typing");
    }

    #[test]
    fn test_payload_text_view() {
        let text = Payload::from(r#"{"type":"pong"}"#);
        assert_eq!(text.as_text(), Some(r#"{"type":"pong"}"#));

        let binary = Payload::copy_from_slice(&[0xff, 0xfe]);
        assert!(binary.as_text().is_none());
        assert_eq!(binary.len(), 2);
    }

    #[test]
    fn test_payload_clone_shares_buffer() {
        let a = Payload::from(vec![1u8, 2, 3]);
        let b = a.clone();
        assert_eq!(a.as_ptr(), b.as_ptr());
    }
}
