//! Storage Guard (C12): refuses recording/snapshot operations when the
//! target volume crosses warn/block thresholds.
//!
//! Uses `nix::sys::statvfs`, already a teacher dependency via the `fs`
//! feature, instead of shelling out to `df`.

use std::path::PathBuf;

use nix::sys::statvfs::statvfs;
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::StorageConfig;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct StorageStatus {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub used_percent: f64,
    pub available: bool,
    pub at_or_above_warn: bool,
    pub at_or_above_block: bool,
}

struct Thresholds {
    warn_percent: f64,
    block_percent: f64,
}

fn classify_warn(used_percent: f64, warn_percent: f64) -> bool {
    used_percent >= warn_percent
}

fn classify_block(used_percent: f64, block_percent: f64) -> bool {
    used_percent >= block_percent
}

/// Enforces storage warn/block thresholds ahead of space-consuming
/// operations (spec §4.12).
pub struct StorageGuard {
    path: PathBuf,
    thresholds: RwLock<Thresholds>,
}

impl StorageGuard {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            path: PathBuf::from(config.default_path),
            thresholds: RwLock::new(Thresholds {
                warn_percent: config.warn_percent,
                block_percent: config.block_percent,
            }),
        }
    }

    pub async fn check_storage_space(&self) -> Result<StorageStatus> {
        let path = self.path.clone();
        let (warn, block) = {
            let t = self.thresholds.read();
            (t.warn_percent, t.block_percent)
        };
        let stats = tokio::task::spawn_blocking(move || statvfs(&path))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map_err(|e| AppError::Internal(format!("statvfs failed: {e}")))?;

        let block_size = stats.fragment_size().max(1) as u64;
        let total_bytes = stats.blocks() as u64 * block_size;
        let free_bytes = stats.blocks_available() as u64 * block_size;
        let used_bytes = total_bytes.saturating_sub(free_bytes);
        let used_percent = if total_bytes == 0 {
            0.0
        } else {
            (used_bytes as f64 / total_bytes as f64) * 100.0
        };

        Ok(StorageStatus {
            total_bytes,
            used_bytes,
            free_bytes,
            used_percent,
            available: used_percent < block,
            at_or_above_warn: classify_warn(used_percent, warn),
            at_or_above_block: classify_block(used_percent, block),
        })
    }

    /// Must satisfy `0 < warn < block <= 100`.
    pub fn update_storage_thresholds(&self, warn_percent: f64, block_percent: f64) -> Result<()> {
        if !(warn_percent > 0.0 && warn_percent < block_percent && block_percent <= 100.0) {
            return Err(AppError::Config(
                "block_percent must be > warn_percent, both in (0, 100]".into(),
            ));
        }
        let mut t = self.thresholds.write();
        t.warn_percent = warn_percent;
        t.block_percent = block_percent;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_threshold_update() {
        let guard = StorageGuard::new(StorageConfig::default());
        assert!(guard.update_storage_thresholds(90.0, 90.0).is_err());
        assert!(guard.update_storage_thresholds(10.0, 95.0).is_ok());
    }

    #[tokio::test]
    async fn check_storage_space_reports_current_filesystem() {
        let mut config = StorageConfig::default();
        config.default_path = "/".to_string();
        let guard = StorageGuard::new(config);
        let status = guard.check_storage_space().await.unwrap();
        assert!(status.total_bytes > 0);
    }

    #[test]
    fn warn_and_block_tiers_are_independently_observable() {
        assert!(!classify_warn(79.9, 80.0));
        assert!(classify_warn(80.0, 80.0));
        assert!(classify_warn(95.0, 80.0));
        assert!(!classify_block(94.9, 95.0));
        assert!(classify_block(95.0, 95.0));
        // a usage in [warn, block) is a warning, not a block: the three-tier
        // contract requires both bits be independently true there.
        assert!(classify_warn(85.0, 80.0) && !classify_block(85.0, 95.0));
    }
}
