//! Snapshot Coordinator (C8): tiered still-image capture bounded by
//! per-tier and total timeouts.
//!
//! Tier 1 reuses the teacher's single-shot `FrameGrabber`. Tiers 2/3 go
//! through the Media Client/Path Controller; every attempt is wrapped in
//! `tokio::time::timeout`. Output encode/resize uses `image`, since no
//! example repo in the pack already solves encode+resize together.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use parking_lot::Mutex as SyncMutex;
use serde::Deserialize;
use uuid::Uuid;

use super::types::{Snapshot, SnapshotOptions, Tier, UserExperience};
use crate::error::{AppError, Result};
use crate::media::MediaClient;
use crate::paths::PathController;
use crate::storage::StorageGuard;
use crate::video::capture::FrameGrabber;
use crate::video::format::{PixelFormat, Resolution};

#[derive(Debug, Clone)]
pub struct SnapshotSettings {
    pub output_dir: PathBuf,
    pub capture_resolution: Resolution,
    pub tier1_timeout: Duration,
    pub tier2_timeout: Duration,
    pub tier3_activation_timeout: Duration,
    pub tier3_timeout: Duration,
    pub total_timeout: Duration,
    pub max_age: Duration,
    pub max_count: usize,
}

#[derive(Debug, Deserialize)]
struct PathStatus {
    #[serde(default)]
    ready: bool,
}

pub struct SnapshotCoordinator {
    media_client: Arc<MediaClient>,
    path_controller: Arc<PathController>,
    storage_guard: Arc<StorageGuard>,
    settings: SnapshotSettings,
    snapshots: SyncMutex<HashMap<Uuid, Snapshot>>,
}

impl SnapshotCoordinator {
    pub fn new(
        media_client: Arc<MediaClient>,
        path_controller: Arc<PathController>,
        storage_guard: Arc<StorageGuard>,
        settings: SnapshotSettings,
    ) -> Self {
        Self {
            media_client,
            path_controller,
            storage_guard,
            settings,
            snapshots: SyncMutex::new(HashMap::new()),
        }
    }

    pub async fn capture_snapshot(&self, device_path: &str, options: SnapshotOptions) -> Result<Snapshot> {
        let storage = self.storage_guard.check_storage_space().await?;
        if storage.at_or_above_block {
            return Err(AppError::StorageLow);
        }
        if storage.at_or_above_warn {
            tracing::warn!(
                device = %device_path,
                used_percent = storage.used_percent,
                "storage usage at or above warn threshold; snapshot allowed to proceed"
            );
        }

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.settings.total_timeout, self.run_tiers(device_path)).await;
        let (raw, tier) = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(AppError::Timeout(format!("snapshot capture for '{device_path}' timed out"))),
        };
        let capture_time_ms = started.elapsed().as_millis() as u64;

        let encoded = encode_image(&raw, &options)?;
        let file_name = format!(
            "{}_{}.{}",
            sanitize(device_path),
            Utc::now().format("%Y%m%dT%H%M%S%3f"),
            options.format
        );
        let file_path = self.settings.output_dir.join(&file_name);
        tokio::fs::write(&file_path, &encoded)
            .await
            .map_err(AppError::Io)?;

        let snapshot = Snapshot {
            id: Uuid::new_v4(),
            device_path: device_path.to_string(),
            file_path: file_path.to_string_lossy().to_string(),
            size_bytes: encoded.len() as u64,
            created_at: Utc::now(),
            tier_used: tier as u8,
            capture_time_ms,
            user_experience: UserExperience::from_capture_millis(capture_time_ms),
        };
        self.snapshots.lock().insert(snapshot.id, snapshot.clone());
        Ok(snapshot)
    }

    async fn run_tiers(&self, device_path: &str) -> Result<(Vec<u8>, Tier)> {
        if let Ok(Ok(bytes)) = tokio::time::timeout(self.settings.tier1_timeout, self.capture_tier1(device_path)).await {
            return Ok((bytes, Tier::UsbDirect));
        }

        if let Some(path_name) = self.path_controller.get_path_for_camera(device_path).await {
            if let Ok(Ok(true)) = tokio::time::timeout(self.settings.tier2_timeout, self.is_path_ready(&path_name)).await {
                if let Ok(Ok(bytes)) = tokio::time::timeout(self.settings.tier2_timeout, self.pull_keyframe(&path_name)).await {
                    return Ok((bytes, Tier::RtspReadyCheck));
                }
            }

            let _ = tokio::time::timeout(self.settings.tier3_activation_timeout, self.trigger_activation(&path_name)).await;
            if let Ok(Ok(bytes)) = tokio::time::timeout(self.settings.tier3_timeout, self.pull_keyframe(&path_name)).await {
                return Ok((bytes, Tier::OnDemandActivation));
            }
        }

        Err(AppError::Device(format!("no tier succeeded for '{device_path}'")))
    }

    async fn capture_tier1(&self, device_path: &str) -> Result<Vec<u8>> {
        let grabber = FrameGrabber::new(device_path);
        let frame = grabber.grab(self.settings.capture_resolution, PixelFormat::Mjpeg).await?;
        Ok(frame.data().to_vec())
    }

    async fn is_path_ready(&self, path_name: &str) -> Result<bool> {
        let status: PathStatus = self.media_client.get(&format!("/v3/paths/get/{path_name}")).await?;
        Ok(status.ready)
    }

    async fn pull_keyframe(&self, path_name: &str) -> Result<Vec<u8>> {
        #[derive(Deserialize)]
        struct KeyframeResponse {
            image_base64: String,
        }
        let response: KeyframeResponse = self.media_client.get(&format!("/v3/paths/{path_name}/snapshot")).await?;
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, response.image_base64)
            .map_err(|e| AppError::MediaServer(e.to_string()))
    }

    async fn trigger_activation(&self, path_name: &str) -> Result<()> {
        let _: serde_json::Value = self
            .media_client
            .post(&format!("/v3/paths/{path_name}/activate"), &serde_json::json!({}))
            .await?;
        Ok(())
    }

    pub fn get_snapshot(&self, id: Uuid) -> Option<Snapshot> {
        self.snapshots.lock().get(&id).cloned()
    }

    pub fn list_snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.lock().values().cloned().collect()
    }

    /// Removes snapshots past max-age or past max-count (oldest first).
    /// Returns `(files_deleted, bytes_freed)`.
    pub async fn cleanup(&self) -> Result<(usize, u64)> {
        let mut removed = Vec::new();
        {
            let mut snapshots = self.snapshots.lock();
            let mut ordered: Vec<Snapshot> = snapshots.values().cloned().collect();
            ordered.sort_by_key(|s| s.created_at);

            let mut to_remove = Vec::new();
            let now = Utc::now();
            for snapshot in &ordered {
                let age = now.signed_duration_since(snapshot.created_at);
                if age.to_std().unwrap_or_default() > self.settings.max_age {
                    to_remove.push(snapshot.id);
                }
            }
            while ordered.len() - to_remove.len() > self.settings.max_count {
                if let Some(oldest) = ordered.iter().find(|s| !to_remove.contains(&s.id)) {
                    to_remove.push(oldest.id);
                } else {
                    break;
                }
            }
            for id in to_remove {
                if let Some(snapshot) = snapshots.remove(&id) {
                    removed.push(snapshot);
                }
            }
        }
        let mut freed = 0u64;
        for snapshot in &removed {
            if tokio::fs::remove_file(&snapshot.file_path).await.is_ok() {
                freed += snapshot.size_bytes;
            }
        }
        Ok((removed.len(), freed))
    }
}

fn sanitize(device_path: &str) -> String {
    device_path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn encode_image(raw: &[u8], options: &SnapshotOptions) -> Result<Vec<u8>> {
    let image = image::load_from_memory(raw).map_err(|e| AppError::Internal(format!("decode failed: {e}")))?;
    let image = if options.auto_resize {
        resize_if_needed(image, options.max_width, options.max_height)
    } else {
        image
    };

    let mut buffer = Cursor::new(Vec::new());
    match options.format.as_str() {
        "png" => image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| AppError::Internal(format!("png encode failed: {e}")))?,
        _ => {
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, options.quality);
            encoder
                .encode_image(&image)
                .map_err(|e| AppError::Internal(format!("jpeg encode failed: {e}")))?;
        }
    }
    Ok(buffer.into_inner())
}

fn resize_if_needed(image: DynamicImage, max_width: Option<u32>, max_height: Option<u32>) -> DynamicImage {
    match (max_width, max_height) {
        (None, None) => image,
        (w, h) => {
            let target_w = w.unwrap_or(image.width());
            let target_h = h.unwrap_or(image.height());
            if target_w >= image.width() && target_h >= image.height() {
                image
            } else {
                image.resize(target_w, target_h, FilterType::Lanczos3)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_experience_thresholds() {
        assert_eq!(UserExperience::from_capture_millis(100), UserExperience::Excellent);
        assert_eq!(UserExperience::from_capture_millis(1000), UserExperience::Acceptable);
        assert_eq!(UserExperience::from_capture_millis(2000), UserExperience::Slow);
        assert_eq!(UserExperience::from_capture_millis(5000), UserExperience::Poor);
    }

    fn tiny_png() -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(64, 48)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn encode_image_ignores_max_dimensions_when_auto_resize_is_off() {
        let raw = tiny_png();
        let options = SnapshotOptions {
            format: "png".to_string(),
            quality: 80,
            max_width: Some(16),
            max_height: Some(12),
            auto_resize: false,
        };
        let encoded = encode_image(&raw, &options).unwrap();
        let decoded = image::load_from_memory(&encoded).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 48);
    }

    #[test]
    fn encode_image_resizes_when_auto_resize_is_on() {
        let raw = tiny_png();
        let options = SnapshotOptions {
            format: "png".to_string(),
            quality: 80,
            max_width: Some(16),
            max_height: Some(12),
            auto_resize: true,
        };
        let encoded = encode_image(&raw, &options).unwrap();
        let decoded = image::load_from_memory(&encoded).unwrap();
        assert!(decoded.width() <= 16);
        assert!(decoded.height() <= 12);
    }
}
