//! Snapshot capture handler: `take_snapshot`.

use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::events::SystemEvent;
use crate::snapshot::SnapshotOptions;
use crate::state::AppState;

fn device_param(params: &Value) -> Result<String> {
    params
        .get("device")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest("missing required parameter 'device'".to_string()))
}

pub async fn take_snapshot(state: &AppState, params: Value) -> Result<Value> {
    let device_path = device_param(&params)?;
    let config = state.config.get();
    let options = SnapshotOptions::from_json(
        params.get("options").unwrap_or(&Value::Null),
        &config.snapshots.format,
        config.snapshots.quality,
    )?;

    let snapshot = state.snapshot.capture_snapshot(&device_path, options).await?;

    state.events.publish(SystemEvent::SnapshotTaken {
        device: device_path,
        file: snapshot.file_path.clone(),
        tier_used: snapshot.tier_used,
    });

    Ok(json!({
        "device": snapshot.device_path,
        "file": snapshot.file_path,
        "size_bytes": snapshot.size_bytes,
        "tier_used": snapshot.tier_used,
        "capture_time_ms": snapshot.capture_time_ms,
        "user_experience": snapshot.user_experience,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_param_requires_the_field() {
        assert!(device_param(&json!({})).is_err());
        assert!(device_param(&json!({"device": "/dev/video0"})).is_ok());
    }
}
