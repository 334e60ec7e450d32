//! Path Controller (C6): 1:1 Device→Path mapping on the media server.
//!
//! The map lives behind a `tokio::sync::Mutex` rather than `parking_lot`,
//! since every mutation calls the media server and must hold the lock across
//! an `.await` (the teacher's convention for any state touched by an async
//! collaborator call).

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::media::MediaClient;

fn sanitize(device_path: &str) -> String {
    device_path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn path_name_for(device_path: &str) -> String {
    format!("camera_{}", sanitize(device_path))
}

#[derive(Debug, Clone, Serialize)]
struct CreatePathBody {
    source: String,
}

/// Maintains the Device→Path mapping (spec §4.6).
pub struct PathController {
    client: std::sync::Arc<MediaClient>,
    mapping: tokio::sync::Mutex<HashMap<String, String>>,
}

impl PathController {
    pub fn new(client: std::sync::Arc<MediaClient>) -> Self {
        Self {
            client,
            mapping: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// No-op success if a mapping already exists.
    pub async fn create_path_for_camera(&self, device_path: &str) -> Result<String> {
        let mut mapping = self.mapping.lock().await;
        if let Some(existing) = mapping.get(device_path) {
            return Ok(existing.clone());
        }
        let path_name = path_name_for(device_path);
        let body = CreatePathBody { source: "publisher".to_string() };
        let _: serde_json::Value = self
            .client
            .post(&format!("/v3/config/paths/add/{path_name}"), &body)
            .await?;
        mapping.insert(device_path.to_string(), path_name.clone());
        Ok(path_name)
    }

    /// No-op success if no mapping exists. A 404 on delete is non-fatal.
    pub async fn delete_path_for_camera(&self, device_path: &str) -> Result<()> {
        let mut mapping = self.mapping.lock().await;
        let Some(path_name) = mapping.get(device_path).cloned() else {
            return Ok(());
        };
        match self.client.delete(&format!("/v3/config/paths/delete/{path_name}")).await {
            Ok(()) => {
                mapping.remove(device_path);
                Ok(())
            }
            Err(AppError::MediaServerStatus { status: 404, .. }) => {
                mapping.remove(device_path);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_path_for_camera(&self, device_path: &str) -> Option<String> {
        self.mapping.lock().await.get(device_path).cloned()
    }

    pub async fn list_active_paths(&self) -> HashMap<String, String> {
        self.mapping.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_name_sanitizes_device_path() {
        assert_eq!(path_name_for("/dev/video0"), "camera__dev_video0");
    }
}
