//! Delivery Policies
//!
//! The two places where the hub has to choose between competing behaviours
//! are named here instead of falling out of map or channel semantics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What happens when a recipient's outbox is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the connection entirely; the client reconnects and recovers
    /// missed events from message history
    #[default]
    Evict,
    /// Keep the connection and discard only the payload that did not fit
    DropNewest,
}

/// What happens when a user registers while already holding a connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Close the existing connection and keep the new one (last wins)
    #[default]
    Replace,
    /// Keep the existing connection and close the newcomer
    Reject,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Evict => write!(f, "evict"),
            OverflowPolicy::DropNewest => write!(f, "drop_newest"),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::Replace => write!(f, "replace"),
            DuplicatePolicy::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "evict" => Ok(OverflowPolicy::Evict),
            "drop_newest" | "drop-newest" => Ok(OverflowPolicy::DropNewest),
            other => Err(format!("Unknown overflow policy: {}", other)),
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(DuplicatePolicy::Replace),
            "reject" => Ok(DuplicatePolicy::Reject),
            other => Err(format!("Unknown duplicate policy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Policies {
        overflow: OverflowPolicy,
        duplicate: DuplicatePolicy,
    }

    #[test]
    fn test_defaults() {
        assert_eq!(OverflowPolicy::default(), OverflowPolicy::Evict);
        assert_eq!(DuplicatePolicy::default(), DuplicatePolicy::Replace);
    }

    #[test]
    fn test_deserialize_snake_case() {
        let parsed: Policies = toml::from_str(
            r#"
            overflow = "drop_newest"
            duplicate = "reject"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.overflow, OverflowPolicy::DropNewest);
        assert_eq!(parsed.duplicate, DuplicatePolicy::Reject);
    }

    #[test]
    fn test_display_matches_config_names() {
        assert_eq!(OverflowPolicy::DropNewest.to_string(), "drop_newest");
        assert_eq!(DuplicatePolicy::Replace.to_string(), "replace");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Drop-Newest".parse(), Ok(OverflowPolicy::DropNewest));
        assert_eq!("reject".parse(), Ok(DuplicatePolicy::Reject));
        assert!("block".parse::<OverflowPolicy>().is_err());
    }
}
