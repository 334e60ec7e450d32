//! Storage inspection: `get_storage_info`.

use serde_json::{json, Value};

use crate::error::Result;
use crate::state::AppState;

use super::files::dir_stats;

pub async fn get_storage_info(state: &AppState, _params: Value) -> Result<Value> {
    let status = state.storage_guard.check_storage_space().await?;
    let (recordings_count, recordings_size) = dir_stats(&state.recordings_dir).await;
    let (snapshots_count, snapshots_size) = dir_stats(&state.snapshots_dir).await;

    Ok(json!({
        "total_space": status.total_bytes,
        "used_space": status.used_bytes,
        "free_space": status.free_bytes,
        "recordings_count": recordings_count,
        "snapshots_count": snapshots_count,
        "recordings_size": recordings_size,
        "snapshots_size": snapshots_size,
    }))
}
