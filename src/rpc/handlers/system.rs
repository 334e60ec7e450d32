//! Server-status handlers: `ping`, `get_server_info`, `get_status`,
//! `get_metrics`, `get_streams`.

use serde_json::{json, Value};

use crate::error::Result;
use crate::state::{AppState, SERVER_VERSION};
use crate::video::PixelFormat;

pub async fn ping(_state: &AppState, _params: Value) -> Result<Value> {
    Ok(Value::String("pong".to_string()))
}

pub async fn get_server_info(state: &AppState, _params: Value) -> Result<Value> {
    let supported_formats: Vec<String> = PixelFormat::all().iter().map(|f| f.to_string()).collect();
    Ok(json!({
        "name": "camera-recorder",
        "version": SERVER_VERSION,
        "build_date": option_env!("BUILD_DATE").unwrap_or("unknown"),
        "go_version": "n/a",
        "architecture": std::env::consts::ARCH,
        "capabilities": ["recording", "snapshot", "events"],
        "supported_formats": supported_formats,
        "max_cameras": state.config.get().camera.device_range.len(),
    }))
}

pub async fn get_status(state: &AppState, _params: Value) -> Result<Value> {
    let mediamtx_status = if state.health_monitor.is_circuit_open() {
        "unreachable"
    } else if state.health_monitor.is_healthy() {
        "healthy"
    } else {
        "degraded"
    };
    let overall = if mediamtx_status == "healthy" { "healthy" } else { "degraded" };

    Ok(json!({
        "status": overall,
        "uptime": state.uptime().as_secs(),
        "version": SERVER_VERSION,
        "components": {
            "camera_monitor": "running",
            "websocket_server": "running",
            "mediamtx": mediamtx_status,
        },
    }))
}

pub async fn get_metrics(state: &AppState, _params: Value) -> Result<Value> {
    Ok(json!({
        "active_connections": state.metrics.active_connections(),
        "total_requests": state.metrics.total_requests(),
        "average_response_time": state.metrics.average_response_time_ms(),
        "error_rate": state.metrics.error_rate(),
        "dropped_events": state.events.total_drop_count(),
        "memory_usage": 0,
        "cpu_usage": 0.0,
    }))
}

pub async fn get_streams(state: &AppState, _params: Value) -> Result<Value> {
    let paths = state.path_controller.list_active_paths().await;
    let streams: Vec<Value> = paths
        .iter()
        .map(|(device, path_name)| json!({"device": device, "path": path_name}))
        .collect();
    let active = streams.len();
    Ok(json!({
        "streams": streams,
        "total": active,
        "active": active,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_response_is_literal_pong() {
        assert_eq!(Value::String("pong".to_string()), json!("pong"));
    }
}
