//! RPC method handlers, one module per functional area, routed by
//! [`dispatch`] after the [`super::dispatcher::Dispatcher`] gate passes.

pub mod auth;
pub mod camera;
pub mod files;
pub mod recording;
pub mod snapshot;
pub mod storage;
pub mod system;

pub use files::RetentionPolicy;

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::state::AppState;

use super::dispatcher::ConnectionContext;

pub async fn dispatch(state: &AppState, ctx: &ConnectionContext, method: &str, params: Value) -> Result<Value> {
    match method {
        "ping" => system::ping(state, params).await,
        "authenticate" => auth::authenticate(state, ctx, params).await,
        "get_camera_list" => camera::get_camera_list(state, params).await,
        "get_camera_status" => camera::get_camera_status(state, params).await,
        "get_camera_capabilities" => camera::get_camera_capabilities(state, params).await,
        "get_server_info" => system::get_server_info(state, params).await,
        "get_status" => system::get_status(state, params).await,
        "get_metrics" => system::get_metrics(state, params).await,
        "get_streams" => system::get_streams(state, params).await,
        "take_snapshot" => snapshot::take_snapshot(state, params).await,
        "start_recording" => recording::start_recording(state, params).await,
        "stop_recording" => recording::stop_recording(state, params).await,
        "list_recordings" => files::list_recordings(state, params).await,
        "list_snapshots" => files::list_snapshots(state, params).await,
        "get_recording_info" => files::get_recording_info(state, params).await,
        "get_snapshot_info" => files::get_snapshot_info(state, params).await,
        "delete_recording" => files::delete_recording(state, params).await,
        "delete_snapshot" => files::delete_snapshot(state, params).await,
        "get_storage_info" => storage::get_storage_info(state, params).await,
        "set_retention_policy" => files::set_retention_policy(state, params).await,
        "cleanup_old_files" => files::cleanup_old_files(state, params).await,
        other => Err(AppError::NotFound(format!("method not found: {other}"))),
    }
}
