//! Configuration schema
//!
//! Mirrors the keys recognised per spec §6: `server.*`, `security.*`,
//! `mediamtx.*`, `camera.*`, `recording.*`, `snapshots.*`, `storage.*`,
//! `logging.*`. Environment overrides follow `CAMERA_SERVICE_<SECTION>_<KEY>`
//! with `__` for nested keys; applying them is the job of `ConfigStore`, this
//! module only defines the shape and its defaults.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Top-level application configuration snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub mediamtx: MediaMtxConfig,
    pub camera: CameraConfig,
    pub recording: RecordingConfig,
    pub snapshots: SnapshotsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            mediamtx: MediaMtxConfig::default(),
            camera: CameraConfig::default(),
            recording: RecordingConfig::default(),
            snapshots: SnapshotsConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate cross-field invariants spec §8 requires to be rejected
    /// at config load time, not discovered later as a runtime surprise.
    pub fn validate(&self) -> Result<()> {
        if !(self.storage.warn_percent > 0.0
            && self.storage.warn_percent < self.storage.block_percent
            && self.storage.block_percent <= 100.0)
        {
            return Err(AppError::Config(
                "storage.block_percent must be > storage.warn_percent, both in (0, 100]".into(),
            ));
        }
        if self.camera.device_range.is_empty() {
            return Err(AppError::Config("camera.device_range must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub websocket_path: String,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8002,
            websocket_path: "/ws".to_string(),
            max_connections: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    pub jwt_secret_key: String,
    pub jwt_expiry_hours: u32,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u32,
    pub session_timeout_secs: u32,
    pub session_cleanup_interval_secs: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret_key: "change-me".to_string(),
            jwt_expiry_hours: 24,
            rate_limit_requests: 100,
            rate_limit_window_secs: 60,
            session_timeout_secs: 3600,
            session_cleanup_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MediaMtxConfig {
    pub host: String,
    pub api_port: u16,
    pub rtsp_port: u16,
    pub webrtc_port: u16,
    pub hls_port: u16,
    pub recordings_path: String,
    pub snapshots_path: String,
    pub health_check_interval_secs: u64,
    pub health_failure_threshold: u32,
    pub health_circuit_breaker_timeout_secs: u64,
    pub health_max_backoff_interval_secs: u64,
    pub health_recovery_confirmation_threshold: u32,
    pub backoff_base_multiplier: f64,
    pub backoff_jitter_range: f64,
    pub process_termination_timeout_secs: u64,
    pub process_kill_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for MediaMtxConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            api_port: 9997,
            rtsp_port: 8554,
            webrtc_port: 8889,
            hls_port: 8888,
            recordings_path: "/var/lib/camera-recorder/recordings".to_string(),
            snapshots_path: "/var/lib/camera-recorder/snapshots".to_string(),
            health_check_interval_secs: 10,
            health_failure_threshold: 3,
            health_circuit_breaker_timeout_secs: 30,
            health_max_backoff_interval_secs: 120,
            health_recovery_confirmation_threshold: 2,
            backoff_base_multiplier: 2.0,
            backoff_jitter_range: 0.1,
            process_termination_timeout_secs: 5,
            process_kill_timeout_secs: 2,
            request_timeout_secs: 5,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub poll_interval_secs: u64,
    pub detection_timeout_secs: u64,
    pub device_range: Vec<u32>,
    pub enable_capability_detection: bool,
    pub auto_start_streams: bool,
    pub capability_timeout_secs: u64,
    pub capability_retry_interval_secs: u64,
    pub capability_max_retries: u32,
    pub disconnect_after_misses: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            detection_timeout_secs: 2,
            device_range: (0..10).collect(),
            enable_capability_detection: true,
            auto_start_streams: true,
            capability_timeout_secs: 2,
            capability_retry_interval_secs: 1,
            capability_max_retries: 2,
            disconnect_after_misses: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecordingConfig {
    pub format: String,
    pub quality: u8,
    pub segment_duration_secs: u64,
    pub default_rotation_size_bytes: u64,
    pub default_max_duration_secs: Option<u64>,
    pub default_retention_days: Option<u32>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            format: "mp4".to_string(),
            quality: 23,
            segment_duration_secs: 900,
            default_rotation_size_bytes: 1024 * 1024 * 1024,
            default_max_duration_secs: None,
            default_retention_days: Some(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SnapshotsConfig {
    pub format: String,
    pub quality: u8,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub auto_cleanup: bool,
    pub cleanup_interval_secs: u64,
    pub max_age_secs: u64,
    pub max_count: usize,
    pub tier1_timeout_ms: u64,
    pub tier2_timeout_ms: u64,
    pub tier3_activation_timeout_ms: u64,
    pub tier3_timeout_ms: u64,
    pub total_timeout_ms: u64,
}

impl Default for SnapshotsConfig {
    fn default() -> Self {
        Self {
            format: "jpg".to_string(),
            quality: 85,
            max_width: None,
            max_height: None,
            auto_cleanup: true,
            cleanup_interval_secs: 3600,
            max_age_secs: 30 * 24 * 3600,
            max_count: 1000,
            tier1_timeout_ms: 300,
            tier2_timeout_ms: 500,
            tier3_activation_timeout_ms: 500,
            tier3_timeout_ms: 2000,
            total_timeout_ms: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub warn_percent: f64,
    pub block_percent: f64,
    pub default_path: String,
    pub fallback_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            warn_percent: 80.0,
            block_percent: 95.0,
            default_path: "/var/lib/camera-recorder".to_string(),
            fallback_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_enabled: false,
            console_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn block_percent_must_exceed_warn_percent() {
        let mut cfg = AppConfig::default();
        cfg.storage.warn_percent = 90.0;
        cfg.storage.block_percent = 90.0;
        assert!(cfg.validate().is_err());

        cfg.storage.block_percent = 80.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_device_range_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.camera.device_range.clear();
        assert!(cfg.validate().is_err());
    }
}
