//! Wire events carried on the message bus.
//!
//! Events are ephemeral and idempotent: they signal that something should
//! happen now and carry no data beyond a timestamp. Consumers fetch current
//! state from the provider and the database, so a lost or duplicated event
//! costs at most one refresh cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Topic on which refresh triggers travel.
pub const UPDATE_TOPIC: &str = "crypto.update";

/// The trigger kind that requests a refresh cycle.
pub const UPDATE_TRIGGER: &str = "update";

/// Event published by the scheduler to request a refresh cycle.
///
/// Wire format is JSON: `{"trigger": "update", "timestamp": <RFC 3339>}`.
/// The `trigger` field stays an open string so that unknown kinds decode
/// cleanly and can be ignored instead of failing the subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub trigger: String,
    pub timestamp: DateTime<Utc>,
}

impl TriggerEvent {
    /// Build an update trigger stamped with the current time.
    pub fn update_now() -> Self {
        Self {
            trigger: UPDATE_TRIGGER.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_update(&self) -> bool {
        self.trigger == UPDATE_TRIGGER
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_wire_format_round_trip() {
        let event = TriggerEvent::update_now();
        let encoded = serde_json::to_vec(&event).unwrap();
        let decoded: TriggerEvent = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(decoded, event);
        assert!(decoded.is_update());
    }

    #[test]
    fn test_unknown_trigger_kind_decodes() {
        let payload = br#"{"trigger": "noop", "timestamp": "2024-05-01T12:00:00Z"}"#;
        let event: TriggerEvent = serde_json::from_slice(payload).unwrap();
        assert!(!event.is_update());
    }
}
