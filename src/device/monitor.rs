//! Device Monitor (C3): single periodic, non-overlapping poll over the
//! configured device range, driving each [`Device`] through its status
//! state machine and emitting ordered events.
//!
//! Grounded on the teacher's single-owner-task health-polling shape
//! (`audio/monitor.rs`): one task owns all writes to the device set: readers
//! only ever take a read lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::probe::{probe_device, DeviceCommandExecutor};
use super::types::{CapabilityRecord, Device, DeviceEvent, DeviceStatus};
use crate::error::{AppError, Result};

pub type DeviceListener = Box<dyn Fn(&DeviceEvent) + Send + Sync>;

/// Settings the monitor's poll loop needs; a narrowed view of `CameraConfig`
/// so this module doesn't depend on the full config schema type.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: std::time::Duration,
    pub device_range: Vec<u32>,
    pub disconnect_after_misses: u32,
}

fn device_path(number: u32) -> PathBuf {
    PathBuf::from(format!("/dev/video{number}"))
}

struct Inner {
    devices: RwLock<HashMap<String, Device>>,
    listeners: RwLock<Vec<DeviceListener>>,
    exists: Arc<dyn Fn(&Path) -> bool + Send + Sync>,
    executor: Arc<dyn DeviceCommandExecutor + Send + Sync>,
}

/// Maintains the live device set via one periodic polling task.
pub struct DeviceMonitor {
    inner: Arc<Inner>,
    handle: AsyncMutex<Option<JoinHandle<()>>>,
    cancel: AsyncMutex<Option<CancellationToken>>,
}

impl DeviceMonitor {
    pub fn new(
        exists: Arc<dyn Fn(&Path) -> bool + Send + Sync>,
        executor: Arc<dyn DeviceCommandExecutor + Send + Sync>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                devices: RwLock::new(HashMap::new()),
                listeners: RwLock::new(Vec::new()),
                exists,
                executor,
            }),
            handle: AsyncMutex::new(None),
            cancel: AsyncMutex::new(None),
        }
    }

    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&DeviceEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.write().push(Box::new(listener));
    }

    pub fn snapshot(&self) -> Vec<Device> {
        self.inner.devices.read().values().cloned().collect()
    }

    pub fn get(&self, path: &str) -> Option<Device> {
        self.inner.devices.read().get(path).cloned()
    }

    /// Idempotent only from a stopped state; errors if already running.
    pub async fn start(&self, settings: MonitorSettings) -> Result<()> {
        let mut handle_guard = self.handle.lock().await;
        if handle_guard.is_some() {
            return Err(AppError::AlreadyRunning);
        }
        let token = CancellationToken::new();
        let inner = self.inner.clone();
        let child_token = token.clone();
        let join = tokio::spawn(async move {
            run_poll_loop(inner, settings, child_token).await;
        });
        *handle_guard = Some(join);
        *self.cancel.lock().await = Some(token);
        Ok(())
    }

    /// Always succeeds, including when already stopped.
    pub async fn stop(&self) {
        if let Some(token) = self.cancel.lock().await.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}

async fn run_poll_loop(inner: Arc<Inner>, settings: MonitorSettings, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(settings.poll_interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                poll_once(&inner, &settings);
            }
        }
    }
}

fn poll_once(inner: &Arc<Inner>, settings: &MonitorSettings) {
    for number in &settings.device_range {
        let path = device_path(*number);
        let path_str = path.to_string_lossy().to_string();
        let present = (inner.exists)(&path);
        let event = {
            let mut devices = inner.devices.write();
            transition(&mut devices, &path_str, *number, present, settings, &inner.exists, &*inner.executor)
        };
        if let Some(event) = event {
            for listener in inner.listeners.read().iter() {
                listener(&event);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn transition(
    devices: &mut HashMap<String, Device>,
    path_str: &str,
    number: u32,
    present: bool,
    settings: &MonitorSettings,
    exists: &Arc<dyn Fn(&Path) -> bool + Send + Sync>,
    executor: &(dyn DeviceCommandExecutor + Send + Sync),
) -> Option<DeviceEvent> {
    let now = Utc::now();
    match devices.get_mut(path_str) {
        None if present => match probe_device(exists.as_ref(), executor, Path::new(path_str)) {
            Ok(capabilities) => {
                let device = Device {
                    path: path_str.to_string(),
                    device_number: number,
                    name: capabilities.card.clone(),
                    status: DeviceStatus::Connected,
                    last_seen: now,
                    capabilities,
                    miss_count: 0,
                    error_reason: None,
                };
                devices.insert(path_str.to_string(), device.clone());
                Some(DeviceEvent::Connected { device })
            }
            Err(reason) => {
                let device = Device {
                    path: path_str.to_string(),
                    device_number: number,
                    name: String::new(),
                    status: DeviceStatus::Error,
                    last_seen: now,
                    capabilities: CapabilityRecord::default(),
                    miss_count: 0,
                    error_reason: Some(reason.clone()),
                };
                devices.insert(path_str.to_string(), device.clone());
                Some(DeviceEvent::Error { path: path_str.to_string(), reason })
            }
        },
        None => None,
        Some(device) => match device.status {
            DeviceStatus::Connected if present => {
                device.last_seen = now;
                None
            }
            DeviceStatus::Connected => {
                device.miss_count += 1;
                if device.miss_count >= settings.disconnect_after_misses {
                    device.status = DeviceStatus::Disconnected;
                    Some(DeviceEvent::Disconnected { path: path_str.to_string() })
                } else {
                    None
                }
            }
            DeviceStatus::Disconnected | DeviceStatus::Error if present => {
                match probe_device(exists.as_ref(), executor, Path::new(path_str)) {
                    Ok(capabilities) => {
                        device.capabilities = capabilities.clone();
                        device.name = capabilities.card;
                        device.status = DeviceStatus::Connected;
                        device.last_seen = now;
                        device.miss_count = 0;
                        device.error_reason = None;
                        Some(DeviceEvent::Connected { device: device.clone() })
                    }
                    Err(reason) => {
                        let is_new_error =
                            device.status != DeviceStatus::Error || device.error_reason.as_deref() != Some(reason.as_str());
                        device.status = DeviceStatus::Error;
                        device.last_seen = now;
                        device.error_reason = Some(reason.clone());
                        is_new_error.then(|| DeviceEvent::Error { path: path_str.to_string(), reason })
                    }
                }
            }
            DeviceStatus::Disconnected | DeviceStatus::Error => None,
        },
    }
}

impl Device {
    pub fn default_capabilities() -> CapabilityRecord {
        CapabilityRecord::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct NoopExecutor;
    impl DeviceCommandExecutor for NoopExecutor {
        fn exec(&self, _path: &Path, _command: super::super::probe::ProbeCommand) -> Result<String, String> {
            Ok(String::new())
        }
    }

    struct FailingExecutor;
    impl DeviceCommandExecutor for FailingExecutor {
        fn exec(&self, _path: &Path, _command: super::super::probe::ProbeCommand) -> Result<String, String> {
            Err("probe failed".to_string())
        }
    }

    #[tokio::test]
    async fn start_twice_is_an_error_then_stop_always_succeeds() {
        let present = Arc::new(AtomicBool::new(false));
        let present2 = present.clone();
        let monitor = DeviceMonitor::new(
            Arc::new(move |_: &Path| present2.load(Ordering::SeqCst)),
            Arc::new(NoopExecutor),
        );
        let settings = MonitorSettings {
            poll_interval: Duration::from_millis(20),
            device_range: vec![0],
            disconnect_after_misses: 2,
        };
        monitor.start(settings.clone()).await.unwrap();
        assert!(monitor.start(settings).await.is_err());
        monitor.stop().await;
        monitor.stop().await; // always succeeds
    }

    #[tokio::test]
    async fn connect_then_disconnect_emits_ordered_events() {
        let present = Arc::new(AtomicBool::new(true));
        let present2 = present.clone();
        let monitor = DeviceMonitor::new(
            Arc::new(move |_: &Path| present2.load(Ordering::SeqCst)),
            Arc::new(NoopExecutor),
        );
        let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let events2 = events.clone();
        monitor.add_listener(move |e| events2.lock().push(format!("{e:?}")));

        let settings = MonitorSettings {
            poll_interval: Duration::from_millis(10),
            device_range: vec![0],
            disconnect_after_misses: 2,
        };
        monitor.start(settings).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        present.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        monitor.stop().await;

        let log = events.lock();
        assert!(log.first().unwrap().contains("Connected"));
        assert!(log.last().unwrap().contains("Disconnected"));
    }

    #[tokio::test]
    async fn failing_probe_emits_error_event_once_then_stays_quiet() {
        let monitor = DeviceMonitor::new(Arc::new(|_: &Path| true), Arc::new(FailingExecutor));
        let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let events2 = events.clone();
        monitor.add_listener(move |e| events2.lock().push(format!("{e:?}")));

        let settings = MonitorSettings {
            poll_interval: Duration::from_millis(10),
            device_range: vec![0],
            disconnect_after_misses: 2,
        };
        monitor.start(settings).await.unwrap();
        tokio::time::sleep(Duration::from_millis(35)).await;
        monitor.stop().await;

        let log = events.lock();
        assert_eq!(log.len(), 1);
        assert!(log[0].contains("Error"));
        assert!(log[0].contains("probe failed"));

        let device = monitor.get("/dev/video0").unwrap();
        assert_eq!(device.status, DeviceStatus::Error);
        assert_eq!(device.error_reason.as_deref(), Some("probe failed"));
    }
}
