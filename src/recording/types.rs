//! Recording Session entity and start options (spec §3, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SessionState {
    Created,
    Recording,
    Rotating,
    Stopped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingOptions {
    pub container: String,
    pub codec: String,
    pub quality: u8,
    pub segment_duration: u64,
    pub max_duration: Option<u64>,
    pub retention_days: Option<u32>,
    pub segment_format: Option<String>,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            container: "mp4".to_string(),
            codec: "h264".to_string(),
            quality: 23,
            segment_duration: 900,
            max_duration: None,
            retention_days: None,
            segment_format: None,
        }
    }
}

const ALLOWED_KEYS: &[&str] = &[
    "container",
    "codec",
    "quality",
    "segment_duration",
    "max_duration",
    "retention_days",
    "segment_format",
];
const ALLOWED_CONTAINERS: &[&str] = &["mp4", "mkv", "avi"];

impl RecordingOptions {
    /// Parse from a JSON object, rejecting unknown keys and out-of-range values.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let mut options = Self::default();
        let Some(map) = value.as_object() else {
            if value.is_null() {
                return Ok(options);
            }
            return Err(AppError::BadRequest("options must be an object".into()));
        };
        for key in map.keys() {
            if !ALLOWED_KEYS.contains(&key.as_str()) {
                return Err(AppError::BadRequest(format!("unknown recording option '{key}'")));
            }
        }
        if let Some(v) = map.get("container") {
            let container = v
                .as_str()
                .ok_or_else(|| AppError::BadRequest("container must be a string".into()))?;
            if !ALLOWED_CONTAINERS.contains(&container) {
                return Err(AppError::BadRequest(format!("unsupported container '{container}'")));
            }
            options.container = container.to_string();
        }
        if let Some(v) = map.get("codec") {
            options.codec = v
                .as_str()
                .ok_or_else(|| AppError::BadRequest("codec must be a string".into()))?
                .to_string();
        }
        if let Some(v) = map.get("quality") {
            let quality = v
                .as_u64()
                .ok_or_else(|| AppError::BadRequest("quality must be an integer".into()))?;
            if quality > 51 {
                return Err(AppError::BadRequest("quality must be between 0 and 51".into()));
            }
            options.quality = quality as u8;
        }
        if let Some(v) = map.get("segment_duration") {
            let seconds = v
                .as_u64()
                .ok_or_else(|| AppError::BadRequest("segment_duration must be an integer".into()))?;
            if seconds == 0 {
                return Err(AppError::BadRequest("segment_duration must be positive".into()));
            }
            options.segment_duration = seconds;
        }
        if let Some(v) = map.get("max_duration") {
            if !v.is_null() {
                options.max_duration = Some(
                    v.as_u64()
                        .ok_or_else(|| AppError::BadRequest("max_duration must be an integer".into()))?,
                );
            }
        }
        if let Some(v) = map.get("retention_days") {
            if !v.is_null() {
                options.retention_days = Some(
                    v.as_u64()
                        .ok_or_else(|| AppError::BadRequest("retention_days must be an integer".into()))?
                        as u32,
                );
            }
        }
        if let Some(v) = map.get("segment_format") {
            if !v.is_null() {
                options.segment_format = Some(
                    v.as_str()
                        .ok_or_else(|| AppError::BadRequest("segment_format must be a string".into()))?
                        .to_string(),
                );
            }
        }
        Ok(options)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSession {
    pub id: Uuid,
    pub device_path: String,
    pub path_name: String,
    pub state: SessionState,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub current_file: String,
    pub file_size_bytes: u64,
    pub rotation_index: u32,
    pub options: RecordingOptions,
}

impl RecordingSession {
    pub fn new(device_path: String, path_name: String, options: RecordingOptions) -> Self {
        let start_time = Utc::now();
        let current_file = segment_file_name(&device_path, start_time, 0, &options);
        Self {
            id: Uuid::new_v4(),
            device_path,
            path_name,
            state: SessionState::Recording,
            start_time,
            end_time: None,
            duration_secs: None,
            current_file,
            file_size_bytes: 0,
            rotation_index: 0,
            options,
        }
    }
}

/// Derive a segment file path from the session's start time and rotation
/// index, so rotation preserves continuity without relying on wall-clock
/// time at rotation instant (spec §4.7).
pub fn segment_file_name(
    device_path: &str,
    start_time: DateTime<Utc>,
    rotation_index: u32,
    options: &RecordingOptions,
) -> String {
    let sanitized: String = device_path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!(
        "{sanitized}_{}_{:04}.{}",
        start_time.format("%Y%m%dT%H%M%S"),
        rotation_index,
        options.container
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_option_keys() {
        let value = serde_json::json!({"bogus": true});
        assert!(RecordingOptions::from_json(&value).is_err());
    }

    #[test]
    fn zero_segment_duration_is_rejected() {
        let value = serde_json::json!({"segment_duration": 0});
        assert!(RecordingOptions::from_json(&value).is_err());
    }

    #[test]
    fn defaults_apply_when_omitted() {
        let options = RecordingOptions::from_json(&serde_json::Value::Null).unwrap();
        assert_eq!(options.container, "mp4");
        assert_eq!(options.segment_duration, 900);
    }

    #[test]
    fn rejects_unsupported_container() {
        let value = serde_json::json!({"container": "webm"});
        assert!(RecordingOptions::from_json(&value).is_err());
    }
}
