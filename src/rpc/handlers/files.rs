//! File-lifecycle handlers: listing, info, deletion, retention, and cleanup
//! for recordings and snapshots (spec §6).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Operator-configurable retention knobs (`set_retention_policy`). `None`
/// means "no limit on this dimension".
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub recordings_days: Option<u32>,
    pub snapshots_days: Option<u32>,
    pub max_storage_gb: Option<f64>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            recordings_days: Some(30),
            snapshots_days: Some(7),
            max_storage_gb: None,
        }
    }
}

fn filename_param(params: &Value) -> Result<String> {
    let name = params
        .get("filename")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("missing required parameter 'filename'".to_string()))?;
    if name.contains('/') || name.contains("..") {
        return Err(AppError::BadRequest("filename must not contain path separators".to_string()));
    }
    Ok(name.to_string())
}

async fn file_entries(dir: &Path) -> Result<Vec<(String, std::fs::Metadata)>> {
    let mut entries = Vec::new();
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(r) => r,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = read_dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push((name, metadata));
    }
    Ok(entries)
}

pub async fn dir_stats(dir: &Path) -> (usize, u64) {
    match file_entries(dir).await {
        Ok(entries) => {
            let count = entries.len();
            let size = entries.iter().map(|(_, m)| m.len()).sum();
            (count, size)
        }
        Err(_) => (0, 0),
    }
}

fn file_time(metadata: &std::fs::Metadata, f: impl Fn(&std::fs::Metadata) -> std::io::Result<std::time::SystemTime>) -> DateTime<Utc> {
    f(metadata).map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now())
}

async fn list_entries(dir: &Path, kind: &str) -> Result<(Vec<Value>, u64)> {
    let entries = file_entries(dir).await?;
    let total_size = entries.iter().map(|(_, m)| m.len()).sum();
    let items = entries
        .into_iter()
        .map(|(name, metadata)| {
            json!({
                "filename": name,
                "file_size": metadata.len(),
                "created_at": file_time(&metadata, std::fs::Metadata::created),
                "modified_at": file_time(&metadata, std::fs::Metadata::modified),
                "download_url": format!("/files/{kind}/{name}"),
            })
        })
        .collect();
    Ok((items, total_size))
}

pub async fn list_recordings(state: &AppState, _params: Value) -> Result<Value> {
    let (recordings, total_size) = list_entries(&state.recordings_dir, "recordings").await?;
    let total_count = recordings.len();
    Ok(json!({
        "recordings": recordings,
        "total_count": total_count,
        "total_size": total_size,
    }))
}

pub async fn list_snapshots(state: &AppState, _params: Value) -> Result<Value> {
    let (snapshots, total_size) = list_entries(&state.snapshots_dir, "snapshots").await?;
    let total_count = snapshots.len();
    Ok(json!({
        "snapshots": snapshots,
        "total_count": total_count,
        "total_size": total_size,
    }))
}

async fn file_info(dir: &Path, kind: &str, filename: &str) -> Result<Value> {
    let path = dir.join(filename);
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| AppError::NotFound(format!("{filename} not found")))?;
    Ok(json!({
        "filename": filename,
        "file_size": metadata.len(),
        "created_at": file_time(&metadata, std::fs::Metadata::created),
        "modified_at": file_time(&metadata, std::fs::Metadata::modified),
        "download_url": format!("/files/{kind}/{filename}"),
    }))
}

pub async fn get_recording_info(state: &AppState, params: Value) -> Result<Value> {
    let filename = filename_param(&params)?;
    let mut info = file_info(&state.recordings_dir, "recordings", &filename).await?;
    if let Some(session) = state
        .recording
        .list_sessions()
        .into_iter()
        .find(|s| s.current_file == filename)
    {
        info["duration"] = json!(session.duration_secs.unwrap_or(0));
    }
    Ok(info)
}

pub async fn get_snapshot_info(state: &AppState, params: Value) -> Result<Value> {
    let filename = filename_param(&params)?;
    file_info(&state.snapshots_dir, "snapshots", &filename).await
}

async fn delete_file(dir: &Path, filename: &str) -> Result<u64> {
    let path = dir.join(filename);
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| AppError::NotFound(format!("{filename} not found")))?;
    let size = metadata.len();
    tokio::fs::remove_file(&path).await?;
    Ok(size)
}

pub async fn delete_recording(state: &AppState, params: Value) -> Result<Value> {
    let filename = filename_param(&params)?;
    let size_freed = delete_file(&state.recordings_dir, &filename).await?;
    Ok(json!({
        "deleted": true,
        "filename": filename,
        "size_freed": size_freed,
    }))
}

pub async fn delete_snapshot(state: &AppState, params: Value) -> Result<Value> {
    let filename = filename_param(&params)?;
    let size_freed = delete_file(&state.snapshots_dir, &filename).await?;
    Ok(json!({
        "deleted": true,
        "filename": filename,
        "size_freed": size_freed,
    }))
}

pub async fn set_retention_policy(state: &AppState, params: Value) -> Result<Value> {
    let mut policy = *state.retention.lock();
    if let Some(v) = params.get("recordings_days") {
        policy.recordings_days = if v.is_null() { None } else {
            Some(v.as_u64().ok_or_else(|| AppError::BadRequest("recordings_days must be an integer".into()))? as u32)
        };
    }
    if let Some(v) = params.get("snapshots_days") {
        policy.snapshots_days = if v.is_null() { None } else {
            Some(v.as_u64().ok_or_else(|| AppError::BadRequest("snapshots_days must be an integer".into()))? as u32)
        };
    }
    if let Some(v) = params.get("max_storage_gb") {
        policy.max_storage_gb = if v.is_null() { None } else {
            Some(v.as_f64().ok_or_else(|| AppError::BadRequest("max_storage_gb must be a number".into()))?)
        };
    }
    *state.retention.lock() = policy;
    Ok(json!({
        "updated": true,
        "policy": policy,
    }))
}

async fn purge_older_than(dir: &Path, max_age_days: Option<u32>) -> Result<(usize, u64)> {
    let Some(days) = max_age_days else {
        return Ok((0, 0));
    };
    let cutoff = Utc::now() - chrono::Duration::days(days as i64);
    let entries = file_entries(dir).await?;
    let mut deleted = 0usize;
    let mut freed = 0u64;
    for (name, metadata) in entries {
        let modified = file_time(&metadata, std::fs::Metadata::modified);
        if modified < cutoff {
            let path: PathBuf = dir.join(&name);
            if tokio::fs::remove_file(&path).await.is_ok() {
                deleted += 1;
                freed += metadata.len();
            }
        }
    }
    Ok((deleted, freed))
}

pub async fn cleanup_old_files(state: &AppState, _params: Value) -> Result<Value> {
    let policy = *state.retention.lock();
    let (recordings_deleted, recordings_freed) = purge_older_than(&state.recordings_dir, policy.recordings_days).await?;
    let (snapshots_deleted, snapshots_freed) = purge_older_than(&state.snapshots_dir, policy.snapshots_days).await?;
    let (coordinator_deleted, coordinator_freed) = state.snapshot.cleanup().await?;

    let total_snapshots_deleted = snapshots_deleted + coordinator_deleted;
    Ok(json!({
        "cleaned": true,
        "files_deleted": recordings_deleted + total_snapshots_deleted,
        "space_freed": recordings_freed + snapshots_freed + coordinator_freed,
        "recordings_deleted": recordings_deleted,
        "snapshots_deleted": total_snapshots_deleted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_param_rejects_path_traversal() {
        assert!(filename_param(&json!({"filename": "../etc/passwd"})).is_err());
        assert!(filename_param(&json!({"filename": "a/b.mp4"})).is_err());
        assert!(filename_param(&json!({"filename": "clip.mp4"})).is_ok());
    }

    #[test]
    fn default_retention_matches_documented_defaults() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.recordings_days, Some(30));
        assert_eq!(policy.snapshots_days, Some(7));
        assert_eq!(policy.max_storage_gb, None);
    }
}
