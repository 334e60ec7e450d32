//! Event types pushed to subscribed clients (spec §4.11).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A typed system event, tagged with its event name for serialization:
/// `{"event": "device.appeared", "data": {...}}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SystemEvent {
    #[serde(rename = "device.appeared")]
    DeviceAppeared { device: String, name: String },

    #[serde(rename = "device.disappeared")]
    DeviceDisappeared { device: String },

    #[serde(rename = "recording.started")]
    RecordingStarted {
        session_id: String,
        device: String,
        file: String,
    },

    #[serde(rename = "recording.progress")]
    RecordingProgress {
        session_id: String,
        device: String,
        duration_secs: i64,
        file_size_bytes: u64,
    },

    #[serde(rename = "recording.stopped")]
    RecordingStopped {
        session_id: String,
        device: String,
        duration_secs: i64,
    },

    #[serde(rename = "snapshot.taken")]
    SnapshotTaken {
        device: String,
        file: String,
        tier_used: u8,
    },

    #[serde(rename = "health.changed")]
    HealthChanged { status: String, circuit_state: String },

    #[serde(rename = "system.error")]
    SystemError { module: String, message: String },
}

impl SystemEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::DeviceAppeared { .. } => "device.appeared",
            Self::DeviceDisappeared { .. } => "device.disappeared",
            Self::RecordingStarted { .. } => "recording.started",
            Self::RecordingProgress { .. } => "recording.progress",
            Self::RecordingStopped { .. } => "recording.stopped",
            Self::SnapshotTaken { .. } => "snapshot.taken",
            Self::HealthChanged { .. } => "health.changed",
            Self::SystemError { .. } => "system.error",
        }
    }

    /// `*` matches everything, `prefix.*` matches any event sharing `prefix`,
    /// anything else must match the event name exactly.
    pub fn matches_topic(&self, topic: &str) -> bool {
        if topic == "*" {
            return true;
        }
        let name = self.event_name();
        if let Some(prefix) = topic.strip_suffix(".*") {
            name.starts_with(prefix)
        } else {
            name == topic
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: SystemEvent,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_topic_wildcard_forms() {
        let event = SystemEvent::DeviceAppeared {
            device: "/dev/video0".to_string(),
            name: "cam".to_string(),
        };
        assert!(event.matches_topic("*"));
        assert!(event.matches_topic("device.*"));
        assert!(event.matches_topic("device.appeared"));
        assert!(!event.matches_topic("recording.*"));
        assert!(!event.matches_topic("device.disappeared"));
    }

    #[test]
    fn serializes_with_tagged_event_name() {
        let event = SystemEvent::SnapshotTaken {
            device: "/dev/video0".to_string(),
            file: "snap.jpg".to_string(),
            tier_used: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("snapshot.taken"));
    }
}
