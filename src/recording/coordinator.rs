//! Recording Coordinator (C7): segmented-recording session state machine
//! with at-most-one-active-session-per-device enforcement.
//!
//! Grounded on the teacher's single in-flight `JoinHandle` guarded by a
//! mutex (`video/capture.rs`); generalized here to a per-device mutex plus a
//! device→session index so multiple devices record independently while each
//! device still serializes its own start/rotate/stop calls.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use super::types::{segment_file_name, RecordingOptions, RecordingSession, SessionState};
use crate::device::{DeviceMonitor, DeviceStatus};
use crate::error::{AppError, Result};
use crate::paths::PathController;
use crate::storage::StorageGuard;

/// Per-device serialization lock, created lazily.
struct DeviceLocks {
    locks: SyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl DeviceLocks {
    fn new() -> Self {
        Self { locks: SyncMutex::new(HashMap::new()) }
    }

    fn get(&self, device_path: &str) -> Arc<AsyncMutex<()>> {
        self.locks
            .lock()
            .entry(device_path.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

pub struct RecordingCoordinator {
    device_monitor: Arc<DeviceMonitor>,
    path_controller: Arc<PathController>,
    storage_guard: Arc<StorageGuard>,
    sessions: SyncMutex<HashMap<Uuid, RecordingSession>>,
    device_to_session: SyncMutex<HashMap<String, Uuid>>,
    device_locks: DeviceLocks,
}

impl RecordingCoordinator {
    pub fn new(
        device_monitor: Arc<DeviceMonitor>,
        path_controller: Arc<PathController>,
        storage_guard: Arc<StorageGuard>,
    ) -> Self {
        Self {
            device_monitor,
            path_controller,
            storage_guard,
            sessions: SyncMutex::new(HashMap::new()),
            device_to_session: SyncMutex::new(HashMap::new()),
            device_locks: DeviceLocks::new(),
        }
    }

    pub async fn start_recording_with_segments(
        &self,
        device_path: &str,
        options: RecordingOptions,
    ) -> Result<RecordingSession> {
        let lock = self.device_locks.get(device_path);
        let _guard = lock.lock().await;

        let status = self.storage_guard.check_storage_space().await?;
        if status.at_or_above_block {
            return Err(AppError::StorageCritical);
        }
        if status.at_or_above_warn {
            tracing::warn!(
                device = %device_path,
                used_percent = status.used_percent,
                "storage usage at or above warn threshold; recording allowed to proceed"
            );
        }

        let device = self
            .device_monitor
            .get(device_path)
            .ok_or_else(|| AppError::NotFound(format!("device '{device_path}' not found")))?;
        if device.status != DeviceStatus::Connected {
            return Err(AppError::Device(format!("device '{device_path}' is not connected")));
        }

        if self.device_to_session.lock().contains_key(device_path) {
            return Err(AppError::AlreadyRecording(device_path.to_string()));
        }

        let path_name = match self.path_controller.get_path_for_camera(device_path).await {
            Some(name) => name,
            None => self.path_controller.create_path_for_camera(device_path).await?,
        };

        let session = RecordingSession::new(device_path.to_string(), path_name, options);
        let id = session.id;
        self.sessions.lock().insert(id, session.clone());
        self.device_to_session.lock().insert(device_path.to_string(), id);
        Ok(session)
    }

    /// Only valid from `Recording`. Derives the next file from the session's
    /// start time and rotation index so continuity is preserved without an
    /// observable gap.
    pub async fn rotate_recording_file(&self, session_id: Uuid) -> Result<RecordingSession> {
        let device_path = {
            let sessions = self.sessions.lock();
            sessions
                .get(&session_id)
                .map(|s| s.device_path.clone())
                .ok_or_else(|| AppError::NotFound(format!("session '{session_id}' not found")))?
        };
        let lock = self.device_locks.get(&device_path);
        let _guard = lock.lock().await;

        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| AppError::NotFound(format!("session '{session_id}' not found")))?;
        if session.state != SessionState::Recording {
            return Err(AppError::BadRequest(format!(
                "session '{session_id}' is not in Recording state"
            )));
        }
        session.state = SessionState::Rotating;
        session.rotation_index += 1;
        session.current_file =
            segment_file_name(&session.device_path, session.start_time, session.rotation_index, &session.options);
        session.state = SessionState::Recording;
        Ok(session.clone())
    }

    /// Allowed from `Recording` or `Rotating`.
    pub async fn stop_recording(&self, session_id: Uuid) -> Result<RecordingSession> {
        let device_path = {
            let sessions = self.sessions.lock();
            sessions
                .get(&session_id)
                .map(|s| s.device_path.clone())
                .ok_or_else(|| AppError::NotFound(format!("session '{session_id}' not found")))?
        };
        let lock = self.device_locks.get(&device_path);
        let _guard = lock.lock().await;

        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| AppError::NotFound(format!("session '{session_id}' not found")))?;
        if !matches!(session.state, SessionState::Recording | SessionState::Rotating) {
            return Err(AppError::BadRequest(format!(
                "session '{session_id}' is not recording"
            )));
        }
        let end_time = Utc::now();
        session.end_time = Some(end_time);
        session.duration_secs = Some((end_time - session.start_time).num_seconds());
        session.state = SessionState::Stopped;
        let result = session.clone();
        drop(sessions);
        self.device_to_session.lock().remove(&device_path);
        Ok(result)
    }

    /// Marks a session Failed and releases its per-device lock slot so the
    /// device is never permanently stuck (spec §7: an invariant violation in
    /// C7 releases the relevant lock).
    pub fn mark_failed(&self, session_id: Uuid) {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get_mut(&session_id) {
            session.state = SessionState::Failed;
            let device_path = session.device_path.clone();
            drop(sessions);
            self.device_to_session.lock().remove(&device_path);
        }
    }

    pub fn get_session(&self, session_id: Uuid) -> Option<RecordingSession> {
        self.sessions.lock().get(&session_id).cloned()
    }

    pub fn active_session_for_device(&self, device_path: &str) -> Option<RecordingSession> {
        let id = *self.device_to_session.lock().get(device_path)?;
        self.sessions.lock().get(&id).cloned()
    }

    pub fn list_sessions(&self) -> Vec<RecordingSession> {
        self.sessions.lock().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::device::{DeviceCommandExecutor, ProbeCommand};
    use std::path::Path;

    struct NoopExecutor;
    impl DeviceCommandExecutor for NoopExecutor {
        fn exec(&self, _path: &Path, _command: ProbeCommand) -> Result<String, String> {
            Ok(String::new())
        }
    }

    async fn make_coordinator() -> (Arc<DeviceMonitor>, RecordingCoordinator, wiremock::MockServer) {
        let monitor = Arc::new(DeviceMonitor::new(Arc::new(|_: &Path| true), Arc::new(NoopExecutor)));
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        let client = Arc::new(
            crate::media::MediaClient::new(crate::media::MediaClientConfig {
                base_url: server.uri(),
                request_timeout: std::time::Duration::from_millis(500),
                max_retries: 0,
                backoff_base: std::time::Duration::from_millis(1),
                jitter_range: 0.0,
            })
            .unwrap(),
        );
        let paths = Arc::new(PathController::new(client));
        let storage = Arc::new(StorageGuard::new(StorageConfig::default()));
        let coordinator = RecordingCoordinator::new(monitor.clone(), paths, storage);
        (monitor, coordinator, server)
    }

    #[tokio::test]
    async fn second_start_on_same_device_is_rejected() {
        let (monitor, coordinator, _server) = make_coordinator().await;
        // seed a connected device directly via a probe cycle
        monitor
            .start(crate::device::MonitorSettings {
                poll_interval: std::time::Duration::from_millis(5),
                device_range: vec![0],
                disconnect_after_misses: 5,
            })
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        monitor.stop().await;

        let device_path = "/dev/video0";
        // create a matching path mapping so start doesn't need the network
        let session = match coordinator
            .start_recording_with_segments(device_path, RecordingOptions::default())
            .await
        {
            Ok(s) => s,
            Err(e) => panic!("expected success, got {e:?}"),
        };
        assert_eq!(session.state, SessionState::Recording);

        let err = coordinator
            .start_recording_with_segments(device_path, RecordingOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyRecording(_)));
    }

    #[tokio::test]
    async fn stop_sets_end_time_and_matching_duration() {
        let (monitor, coordinator, _server) = make_coordinator().await;
        monitor
            .start(crate::device::MonitorSettings {
                poll_interval: std::time::Duration::from_millis(5),
                device_range: vec![0],
                disconnect_after_misses: 5,
            })
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        monitor.stop().await;

        let session = coordinator
            .start_recording_with_segments("/dev/video0", RecordingOptions::default())
            .await
            .unwrap();
        let stopped = coordinator.stop_recording(session.id).await.unwrap();
        assert_eq!(stopped.state, SessionState::Stopped);
        assert!(stopped.end_time.unwrap() >= stopped.start_time);
        assert_eq!(
            stopped.duration_secs.unwrap(),
            (stopped.end_time.unwrap() - stopped.start_time).num_seconds()
        );
    }
}
