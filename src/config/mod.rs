//! Configuration: schema, environment/file loading, and the read-only view
//! callers consult at runtime (C1, spec §4.1).

pub mod schema;
pub mod store;

pub use schema::{
    AppConfig, CameraConfig, LoggingConfig, MediaMtxConfig, RecordingConfig, SecurityConfig,
    ServerConfig, SnapshotsConfig, StorageConfig,
};
pub use store::ConfigView;

use std::path::Path;

use crate::error::{AppError, Result};

/// Load configuration from an optional TOML file, then apply
/// `CAMERA_SERVICE_<SECTION>_<KEY>` environment overrides on top, per
/// spec §6. Config-file parsing is intentionally simple: this crate treats
/// it as ambient plumbing, not a control-plane behavior worth its own
/// component.
pub fn load(file: Option<&Path>) -> Result<AppConfig> {
    let mut config = match file {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            toml::from_str(&text)
                .map_err(|e| AppError::Config(format!("failed to parse {}: {e}", path.display())))?
        }
        None => AppConfig::default(),
    };
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Apply `CAMERA_SERVICE_<SECTION>_<KEY>` overrides. Only the handful of
/// keys operators actually override from the environment in practice are
/// wired here; unrecognised variables are ignored rather than rejected, so
/// unrelated `CAMERA_SERVICE_*` variables never crash startup.
fn apply_env_overrides(config: &mut AppConfig) {
    use std::env::var;

    if let Ok(v) = var("CAMERA_SERVICE_SERVER__HOST") {
        config.server.host = v;
    }
    if let Some(v) = env_parsed("CAMERA_SERVICE_SERVER__PORT") {
        config.server.port = v;
    }
    if let Ok(v) = var("CAMERA_SERVICE_SERVER__WEBSOCKET_PATH") {
        config.server.websocket_path = v;
    }
    if let Some(v) = env_parsed("CAMERA_SERVICE_SERVER__MAX_CONNECTIONS") {
        config.server.max_connections = v;
    }
    if let Ok(v) = var("CAMERA_SERVICE_SECURITY__JWT_SECRET_KEY") {
        config.security.jwt_secret_key = v;
    }
    if let Some(v) = env_parsed("CAMERA_SERVICE_SECURITY__RATE_LIMIT_REQUESTS") {
        config.security.rate_limit_requests = v;
    }
    if let Ok(v) = var("CAMERA_SERVICE_MEDIAMTX__HOST") {
        config.mediamtx.host = v;
    }
    if let Some(v) = env_parsed("CAMERA_SERVICE_MEDIAMTX__API_PORT") {
        config.mediamtx.api_port = v;
    }
    if let Ok(v) = var("CAMERA_SERVICE_STORAGE__DEFAULT_PATH") {
        config.storage.default_path = v;
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_without_a_file() {
        let cfg = load(None).unwrap();
        assert_eq!(cfg.server.port, 8002);
    }

    #[test]
    fn env_override_takes_precedence() {
        std::env::set_var("CAMERA_SERVICE_SERVER__PORT", "9100");
        let cfg = load(None).unwrap();
        std::env::remove_var("CAMERA_SERVICE_SERVER__PORT");
        assert_eq!(cfg.server.port, 9100);
    }
}
