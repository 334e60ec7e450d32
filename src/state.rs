//! Application-wide state shared across every RPC handler.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::auth::{PermissionTable, RateLimiter, SessionStore, TokenCodec};
use crate::config::ConfigView;
use crate::device::DeviceMonitor;
use crate::events::EventFanout;
use crate::media::{HealthMonitor, MediaClient};
use crate::paths::PathController;
use crate::recording::RecordingCoordinator;
use crate::rpc::metrics::RequestMetrics;
use crate::rpc::handlers::files::RetentionPolicy;
use crate::snapshot::SnapshotCoordinator;
use crate::storage::StorageGuard;

pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct AppState {
    pub config: Arc<ConfigView>,
    pub device_monitor: Arc<DeviceMonitor>,
    pub media_client: Arc<MediaClient>,
    pub health_monitor: Arc<HealthMonitor>,
    pub path_controller: Arc<PathController>,
    pub recording: Arc<RecordingCoordinator>,
    pub snapshot: Arc<SnapshotCoordinator>,
    pub storage_guard: Arc<StorageGuard>,
    pub sessions: Arc<SessionStore>,
    pub permissions: Arc<PermissionTable>,
    pub rate_limiter: Arc<RateLimiter>,
    pub token_codec: Arc<TokenCodec>,
    pub events: Arc<EventFanout>,
    pub recordings_dir: PathBuf,
    pub snapshots_dir: PathBuf,
    pub metrics: RequestMetrics,
    pub retention: Mutex<RetentionPolicy>,
    started_at: Instant,
}

#[allow(clippy::too_many_arguments)]
impl AppState {
    pub fn new(
        config: Arc<ConfigView>,
        device_monitor: Arc<DeviceMonitor>,
        media_client: Arc<MediaClient>,
        health_monitor: Arc<HealthMonitor>,
        path_controller: Arc<PathController>,
        recording: Arc<RecordingCoordinator>,
        snapshot: Arc<SnapshotCoordinator>,
        storage_guard: Arc<StorageGuard>,
        sessions: Arc<SessionStore>,
        permissions: Arc<PermissionTable>,
        rate_limiter: Arc<RateLimiter>,
        token_codec: Arc<TokenCodec>,
        events: Arc<EventFanout>,
        recordings_dir: PathBuf,
        snapshots_dir: PathBuf,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            device_monitor,
            media_client,
            health_monitor,
            path_controller,
            recording,
            snapshot,
            storage_guard,
            sessions,
            permissions,
            rate_limiter,
            token_codec,
            events,
            recordings_dir,
            snapshots_dir,
            metrics: RequestMetrics::default(),
            retention: Mutex::new(RetentionPolicy::default()),
            started_at: Instant::now(),
        })
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
