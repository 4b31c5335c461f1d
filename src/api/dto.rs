//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use serde::{Deserialize, Serialize};

use crate::hub::{StatsSnapshot, UserId};

// ============================================
// EVENT DTOs
// ============================================

/// Fan-out request from a trusted producer
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    /// Users to deliver to; duplicates are collapsed
    pub recipients: Vec<UserId>,
    /// Event type, used for logging only
    #[serde(default)]
    pub kind: Option<String>,
    /// Delivered to clients exactly as given
    pub payload: serde_json::Value,
}

/// Direct send to a single user
#[derive(Debug, Deserialize)]
pub struct DirectRequest {
    #[serde(default)]
    pub kind: Option<String>,
    pub payload: serde_json::Value,
}

/// Accepted for delivery
#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResponse {
    /// Status: "accepted"
    pub status: String,
    /// Distinct recipients addressed, online or not
    pub recipients: usize,
}

// ============================================
// PRESENCE DTOs
// ============================================

/// All online users
#[derive(Debug, Serialize, Deserialize)]
pub struct OnlineResponse {
    pub online: Vec<UserId>,
    pub count: usize,
}

/// Presence of a single user
#[derive(Debug, Serialize, Deserialize)]
pub struct PresenceResponse {
    pub user_id: UserId,
    pub online: bool,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy
    pub status: String,
    /// Registered connections
    pub connections: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
    pub hub: StatsSnapshot,
}
