//! Recording control handlers: `start_recording`, `stop_recording`.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::events::SystemEvent;
use crate::recording::RecordingOptions;
use crate::state::AppState;

fn device_param(params: &Value) -> Result<String> {
    params
        .get("device")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest("missing required parameter 'device'".to_string()))
}

fn session_id_param(params: &Value) -> Result<Uuid> {
    let raw = params
        .get("session_id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("missing required parameter 'session_id'".to_string()))?;
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("session_id is not a valid uuid".to_string()))
}

pub async fn start_recording(state: &AppState, params: Value) -> Result<Value> {
    let device_path = device_param(&params)?;
    let options = RecordingOptions::from_json(params.get("options").unwrap_or(&Value::Null))?;

    let session = state.recording.start_recording_with_segments(&device_path, options).await?;

    state.events.publish(SystemEvent::RecordingStarted {
        session_id: session.id.to_string(),
        device: device_path,
        file: session.current_file.clone(),
    });

    Ok(json!({
        "session_id": session.id,
        "device": session.device_path,
        "file": session.current_file,
        "started_at": session.start_time,
    }))
}

pub async fn stop_recording(state: &AppState, params: Value) -> Result<Value> {
    let session_id = session_id_param(&params)?;
    let session = state.recording.stop_recording(session_id).await?;

    state.events.publish(SystemEvent::RecordingStopped {
        session_id: session.id.to_string(),
        device: session.device_path.clone(),
        duration_secs: session.duration_secs.unwrap_or(0),
    });

    Ok(json!({
        "session_id": session.id,
        "device": session.device_path,
        "file": session.current_file,
        "duration_secs": session.duration_secs.unwrap_or(0),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_param_rejects_non_uuid_strings() {
        assert!(session_id_param(&json!({"session_id": "not-a-uuid"})).is_err());
        assert!(session_id_param(&json!({"session_id": Uuid::new_v4().to_string()})).is_ok());
    }

    #[test]
    fn device_param_requires_the_field() {
        assert!(device_param(&json!({})).is_err());
    }
}
