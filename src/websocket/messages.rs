//! WebSocket Message Types
//!
//! Frames exchanged between chat clients and the hub. Client frames that
//! carry ephemeral conversation state (typing, receipts) are re-emitted as
//! server events to the listed recipients.

use serde::{Deserialize, Serialize};

use crate::hub::UserId;

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Typing indicator for a conversation
    Typing {
        conversation_id: i64,
        /// Other participants to notify
        recipients: Vec<UserId>,
        #[serde(default = "default_is_typing")]
        is_typing: bool,
    },
    /// Read receipt
    Read {
        conversation_id: i64,
        message_id: i64,
        recipients: Vec<UserId>,
    },
    /// Delivery receipt
    Delivered {
        conversation_id: i64,
        message_id: i64,
        recipients: Vec<UserId>,
    },
    /// Ping for keepalive
    Ping,
}

fn default_is_typing() -> bool {
    true
}

/// Receipt state carried by [`ServerEvent::Receipt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Delivered,
    Read,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Another participant started or stopped typing
    Typing {
        conversation_id: i64,
        user_id: UserId,
        is_typing: bool,
        /// Milliseconds since epoch
        timestamp: i64,
    },
    /// Another participant received or read a message
    Receipt {
        conversation_id: i64,
        message_id: i64,
        user_id: UserId,
        status: ReceiptStatus,
        timestamp: i64,
    },
    /// Pong response to ping
    Pong { timestamp: i64 },
    /// Error message
    Error { message: String },
}

impl ServerEvent {
    pub fn pong() -> Self {
        ServerEvent::Pong { timestamp: now_millis() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    /// Tag used for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Typing { .. } => "typing",
            ServerEvent::Receipt { .. } => "receipt",
            ServerEvent::Pong { .. } => "pong",
            ServerEvent::Error { .. } => "error",
        }
    }
}

/// A client frame that should be fanned out to other users
#[derive(Debug, Clone)]
pub struct Relay {
    pub recipients: Vec<UserId>,
    pub event: ServerEvent,
}

impl ClientMessage {
    /// Turn a client frame sent by `sender` into the event its recipients see.
    /// Returns `None` for frames answered locally.
    pub fn into_relay(self, sender: UserId) -> Option<Relay> {
        let timestamp = now_millis();

        let (recipients, event) = match self {
            ClientMessage::Typing {
                conversation_id,
                recipients,
                is_typing,
            } => (
                recipients,
                ServerEvent::Typing {
                    conversation_id,
                    user_id: sender,
                    is_typing,
                    timestamp,
                },
            ),
            ClientMessage::Read {
                conversation_id,
                message_id,
                recipients,
            } => (
                recipients,
                receipt(conversation_id, message_id, sender, ReceiptStatus::Read),
            ),
            ClientMessage::Delivered {
                conversation_id,
                message_id,
                recipients,
            } => (
                recipients,
                receipt(conversation_id, message_id, sender, ReceiptStatus::Delivered),
            ),
            ClientMessage::Ping => return None,
        };

        Some(Relay { recipients, event })
    }
}

fn receipt(conversation_id: i64, message_id: i64, user_id: UserId, status: ReceiptStatus) -> ServerEvent {
    ServerEvent::Receipt {
        conversation_id,
        message_id,
        user_id,
        status,
        timestamp: now_millis(),
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_deserialize_typing() {
        let json = r#"{"type": "typing", "conversation_id": 4, "recipients": [2, 3]}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Typing {
                conversation_id,
                recipients,
                is_typing,
            } => {
                assert_eq!(conversation_id, 4);
                assert_eq!(recipients, vec![2, 3]);
                assert!(is_typing);
            }
            _ => panic!("Expected Typing"),
        }
    }

    #[test]
    fn test_client_message_deserialize_ping() {
        let json = r#"{"type": "ping"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
        assert!(msg.into_relay(1).is_none());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{"type": "subscribe", "topics": []}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_read_relays_receipt_from_sender() {
        let msg = ClientMessage::Read {
            conversation_id: 10,
            message_id: 55,
            recipients: vec![2],
        };

        let relay = msg.into_relay(1).unwrap();
        assert_eq!(relay.recipients, vec![2]);
        match relay.event {
            ServerEvent::Receipt {
                user_id, status, message_id, ..
            } => {
                assert_eq!(user_id, 1);
                assert_eq!(message_id, 55);
                assert_eq!(status, ReceiptStatus::Read);
            }
            other => panic!("Expected Receipt, got {:?}", other),
        }
    }

    #[test]
    fn test_server_event_serialize() {
        let json = serde_json::to_string(&ServerEvent::error("bad frame")).unwrap();
        assert_eq!(json, r#"{"type":"error","message":"bad frame"}"#);

        let json = serde_json::to_string(&ServerEvent::Receipt {
            conversation_id: 1,
            message_id: 2,
            user_id: 3,
            status: ReceiptStatus::Delivered,
            timestamp: 1699000000000,
        })
        .unwrap();
        assert!(json.contains("\"type\":\"receipt\""));
        assert!(json.contains("\"status\":\"delivered\""));
    }
}
