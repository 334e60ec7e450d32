//! Snapshot entity and capture options (spec §3, §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserExperience {
    Excellent,
    Acceptable,
    Slow,
    Poor,
}

impl UserExperience {
    pub fn from_capture_millis(ms: u64) -> Self {
        if ms < 300 {
            Self::Excellent
        } else if ms < 1500 {
            Self::Acceptable
        } else if ms < 3000 {
            Self::Slow
        } else {
            Self::Poor
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotOptions {
    pub format: String,
    pub quality: u8,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Resize only applies when this is explicitly set; `max_width`/
    /// `max_height` alone are not enough (spec §4.8).
    pub auto_resize: bool,
}

impl SnapshotOptions {
    pub fn from_json(value: &serde_json::Value, default_format: &str, default_quality: u8) -> Result<Self> {
        let mut options = Self {
            format: default_format.to_string(),
            quality: default_quality,
            max_width: None,
            max_height: None,
            auto_resize: false,
        };
        if value.is_null() {
            return Ok(options);
        }
        let Some(map) = value.as_object() else {
            return Err(AppError::BadRequest("options must be an object".into()));
        };
        if let Some(v) = map.get("format") {
            let format = v
                .as_str()
                .ok_or_else(|| AppError::BadRequest("format must be a string".into()))?;
            if !matches!(format, "jpg" | "png") {
                return Err(AppError::BadRequest(format!("unsupported snapshot format '{format}'")));
            }
            options.format = format.to_string();
        }
        if let Some(v) = map.get("quality") {
            let quality = v
                .as_u64()
                .ok_or_else(|| AppError::BadRequest("quality must be an integer".into()))?;
            if !(1..=100).contains(&quality) {
                return Err(AppError::BadRequest("quality must be between 1 and 100".into()));
            }
            options.quality = quality as u8;
        }
        if let Some(v) = map.get("max_width") {
            if !v.is_null() {
                options.max_width = Some(
                    v.as_u64()
                        .ok_or_else(|| AppError::BadRequest("max_width must be an integer".into()))? as u32,
                );
            }
        }
        if let Some(v) = map.get("max_height") {
            if !v.is_null() {
                options.max_height = Some(
                    v.as_u64()
                        .ok_or_else(|| AppError::BadRequest("max_height must be an integer".into()))? as u32,
                );
            }
        }
        if let Some(v) = map.get("auto_resize") {
            options.auto_resize = v
                .as_bool()
                .ok_or_else(|| AppError::BadRequest("auto_resize must be a boolean".into()))?;
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auto_resize_defaults_to_false() {
        let options = SnapshotOptions::from_json(&serde_json::Value::Null, "jpg", 80).unwrap();
        assert!(!options.auto_resize);
    }

    #[test]
    fn auto_resize_can_be_enabled_alongside_dimensions() {
        let options = SnapshotOptions::from_json(
            &json!({"max_width": 640, "max_height": 480, "auto_resize": true}),
            "jpg",
            80,
        )
        .unwrap();
        assert!(options.auto_resize);
        assert_eq!(options.max_width, Some(640));
        assert_eq!(options.max_height, Some(480));
    }

    #[test]
    fn auto_resize_rejects_non_boolean() {
        assert!(SnapshotOptions::from_json(&json!({"auto_resize": "yes"}), "jpg", 80).is_err());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    UsbDirect = 1,
    RtspReadyCheck = 2,
    OnDemandActivation = 3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub device_path: String,
    pub file_path: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub tier_used: u8,
    pub capture_time_ms: u64,
    pub user_experience: UserExperience,
}
