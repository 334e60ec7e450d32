//! Device entity and capability record (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a probed device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DeviceStatus {
    Connected,
    Disconnected,
    Error,
}

/// One supported pixel-format/resolution/frame-rate combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatRecord {
    pub pixel_format: String,
    pub width: u32,
    pub height: u32,
    pub frame_rates: Vec<String>,
}

/// Parsed capability record for a device (C2 output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRecord {
    pub driver: String,
    pub card: String,
    pub bus: String,
    pub driver_version: String,
    pub formats: Vec<FormatRecord>,
}

impl Default for CapabilityRecord {
    fn default() -> Self {
        Self {
            driver: "unknown".to_string(),
            card: "Unknown Video Device".to_string(),
            bus: String::new(),
            driver_version: String::new(),
            formats: Vec::new(),
        }
    }
}

/// A device owned by the Device Monitor (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub path: String,
    pub device_number: u32,
    pub name: String,
    pub status: DeviceStatus,
    pub last_seen: DateTime<Utc>,
    pub capabilities: CapabilityRecord,
    /// Consecutive failed probes since last successful sighting; reset on sighting.
    #[serde(skip)]
    pub miss_count: u32,
    /// Reason text for the most recent probe failure; set only while `status`
    /// is `Error`, cleared on the next successful probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

/// Events the Device Monitor emits on a status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DeviceEvent {
    Connected { device: Device },
    Disconnected { path: String },
    Error { path: String, reason: String },
}
