//! Camera inspection handlers: `get_camera_list`, `get_camera_status`,
//! `get_camera_capabilities`.

use serde_json::{json, Value};

use crate::device::{Device, DeviceStatus};
use crate::error::{AppError, Result};
use crate::state::AppState;

fn device_param(params: &Value) -> Result<String> {
    params
        .get("device")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest("missing required parameter 'device'".to_string()))
}

fn primary_resolution(device: &Device) -> String {
    device
        .capabilities
        .formats
        .first()
        .map(|f| format!("{}x{}", f.width, f.height))
        .unwrap_or_default()
}

fn primary_fps(device: &Device) -> u32 {
    device
        .capabilities
        .formats
        .first()
        .and_then(|f| f.frame_rates.first())
        .and_then(|rate| rate.parse::<f64>().ok())
        .map(|rate| rate.round() as u32)
        .unwrap_or(0)
}

fn status_str(status: DeviceStatus) -> &'static str {
    match status {
        DeviceStatus::Connected => "connected",
        DeviceStatus::Disconnected => "disconnected",
        DeviceStatus::Error => "error",
    }
}

pub async fn get_camera_list(state: &AppState, _params: Value) -> Result<Value> {
    let devices = state.device_monitor.snapshot();
    let connected = devices.iter().filter(|d| d.status == DeviceStatus::Connected).count();
    let cameras: Vec<Value> = devices
        .iter()
        .map(|d| {
            json!({
                "device": d.path,
                "name": d.name,
                "status": status_str(d.status),
                "error_reason": d.error_reason,
            })
        })
        .collect();
    Ok(json!({
        "cameras": cameras,
        "total": devices.len(),
        "connected": connected,
    }))
}

/// Unknown devices are not an error here: they report as disconnected so a
/// client polling a camera that has never been probed gets a stable answer.
pub async fn get_camera_status(state: &AppState, params: Value) -> Result<Value> {
    let device_path = device_param(&params)?;
    match state.device_monitor.get(&device_path) {
        Some(device) => {
            let streams = if state.path_controller.get_path_for_camera(&device_path).await.is_some() {
                1
            } else {
                0
            };
            Ok(json!({
                "device": device.path,
                "status": status_str(device.status),
                "name": device.name,
                "resolution": primary_resolution(&device),
                "fps": primary_fps(&device),
                "streams": streams,
                "error_reason": device.error_reason,
            }))
        }
        None => Ok(json!({
            "device": device_path,
            "status": "disconnected",
            "name": "",
            "resolution": "",
            "fps": 0,
            "streams": 0,
            "error_reason": Value::Null,
        })),
    }
}

pub async fn get_camera_capabilities(state: &AppState, params: Value) -> Result<Value> {
    let device_path = device_param(&params)?;
    let device = state
        .device_monitor
        .get(&device_path)
        .ok_or_else(|| AppError::NotFound(format!("device '{device_path}' not found")))?;

    let formats: Vec<&str> = device
        .capabilities
        .formats
        .iter()
        .map(|f| f.pixel_format.as_str())
        .collect();
    let resolutions: Vec<String> = device
        .capabilities
        .formats
        .iter()
        .map(|f| format!("{}x{}", f.width, f.height))
        .collect();
    let fps_options: Vec<&str> = device
        .capabilities
        .formats
        .iter()
        .flat_map(|f| f.frame_rates.iter().map(String::as_str))
        .collect();
    let validation_status = if device.capabilities.formats.is_empty() {
        "unverified"
    } else {
        "verified"
    };

    Ok(json!({
        "device": device.path,
        "formats": formats,
        "resolutions": resolutions,
        "fps_options": fps_options,
        "validation_status": validation_status,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CapabilityRecord, FormatRecord};
    use chrono::Utc;

    fn device_with_format() -> Device {
        Device {
            path: "/dev/video0".to_string(),
            device_number: 0,
            name: "Test Camera".to_string(),
            status: DeviceStatus::Connected,
            last_seen: Utc::now(),
            capabilities: CapabilityRecord {
                driver: "uvcvideo".to_string(),
                card: "Test Camera".to_string(),
                bus: "usb-0000:00:14.0-1".to_string(),
                driver_version: "5.15.0".to_string(),
                formats: vec![FormatRecord {
                    pixel_format: "MJPG".to_string(),
                    width: 1920,
                    height: 1080,
                    frame_rates: vec!["30.000".to_string()],
                }],
            },
            miss_count: 0,
            error_reason: None,
        }
    }

    #[test]
    fn primary_resolution_and_fps_read_first_format() {
        let device = device_with_format();
        assert_eq!(primary_resolution(&device), "1920x1080");
        assert_eq!(primary_fps(&device), 30);
    }

    #[test]
    fn device_param_requires_the_field() {
        assert!(device_param(&json!({})).is_err());
        assert!(device_param(&json!({"device": "/dev/video0"})).is_ok());
    }
}
