//! Health Monitor (C5): circuit breaker over periodic media-server probes.
//!
//! State lives behind a `parking_lot::RwLock`, the teacher's pattern for hot,
//! short-held state (`video/capture.rs`'s `last_error`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::client::MediaClient;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthRecord {
    pub status: Status,
    pub last_check: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub circuit_state: CircuitState,
    pub components: HashMap<String, Status>,
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self {
            status: Status::Unknown,
            last_check: None,
            consecutive_failures: 0,
            consecutive_successes: 0,
            circuit_state: CircuitState::Closed,
            components: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthMetrics {
    pub total_checks: u64,
    pub successful_checks: u64,
    pub failed_checks: u64,
    pub is_healthy: bool,
    pub failure_count: u32,
    pub status: Status,
}

#[derive(Debug, Clone)]
pub struct HealthMonitorSettings {
    pub check_interval: Duration,
    pub failure_threshold: u32,
    pub recovery_confirmation_threshold: u32,
    pub circuit_breaker_timeout: Duration,
    pub max_backoff_interval: Duration,
    pub backoff_base_multiplier: f64,
    pub request_timeout: Duration,
}

struct Counters {
    total: u64,
    successful: u64,
    failed: u64,
}

/// Periodic health probing with circuit breaker and exponential backoff.
pub struct HealthMonitor {
    record: RwLock<HealthRecord>,
    counters: RwLock<Counters>,
    opened_at: RwLock<Option<Instant>>,
    handle: AsyncMutex<Option<JoinHandle<()>>>,
    cancel: AsyncMutex<Option<CancellationToken>>,
    settings: HealthMonitorSettings,
}

impl HealthMonitor {
    pub fn new(settings: HealthMonitorSettings) -> Arc<Self> {
        Arc::new(Self {
            record: RwLock::new(HealthRecord::default()),
            counters: RwLock::new(Counters { total: 0, successful: 0, failed: 0 }),
            opened_at: RwLock::new(None),
            handle: AsyncMutex::new(None),
            cancel: AsyncMutex::new(None),
            settings,
        })
    }

    pub fn get_status(&self) -> HealthRecord {
        self.record.read().clone()
    }

    pub fn is_healthy(&self) -> bool {
        self.record.read().status == Status::Healthy
    }

    pub fn is_circuit_open(&self) -> bool {
        self.record.read().circuit_state == CircuitState::Open
    }

    pub fn check_all_components(&self) -> HashMap<String, Status> {
        self.record.read().components.clone()
    }

    pub fn get_metrics(&self) -> HealthMetrics {
        let counters = self.counters.read();
        let record = self.record.read();
        HealthMetrics {
            total_checks: counters.total,
            successful_checks: counters.successful,
            failed_checks: counters.failed,
            is_healthy: record.status == Status::Healthy,
            failure_count: record.consecutive_failures,
            status: record.status,
        }
    }

    /// Should this probe run, given the circuit state? Returns whether the
    /// upcoming probe is a HalfOpen trial (gates whether callers should even
    /// attempt the guarded operation while Open).
    pub fn should_attempt(&self) -> bool {
        let record = self.record.read();
        match record.circuit_state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let opened_at = *self.opened_at.read();
                match opened_at {
                    Some(at) => at.elapsed() >= self.current_backoff(record.consecutive_failures),
                    None => true,
                }
            }
        }
    }

    fn current_backoff(&self, failures: u32) -> Duration {
        let exp = failures.min(10);
        let scaled = self.settings.circuit_breaker_timeout.as_secs_f64()
            * self.settings.backoff_base_multiplier.powi(exp as i32);
        Duration::from_secs_f64(scaled).min(self.settings.max_backoff_interval)
    }

    pub fn record_success(&self) {
        self.counters.write().successful += 1;
        self.counters.write().total += 1;
        let mut record = self.record.write();
        record.consecutive_successes += 1;
        record.consecutive_failures = 0;
        record.last_check = Some(Utc::now());
        if record.circuit_state == CircuitState::HalfOpen
            && record.consecutive_successes >= self.settings.recovery_confirmation_threshold
        {
            record.circuit_state = CircuitState::Closed;
            record.status = Status::Healthy;
            *self.opened_at.write() = None;
        } else if record.circuit_state == CircuitState::Closed {
            record.status = Status::Healthy;
        }
    }

    pub fn record_failure(&self) {
        self.counters.write().failed += 1;
        self.counters.write().total += 1;
        let mut record = self.record.write();
        record.consecutive_failures += 1;
        record.consecutive_successes = 0;
        record.last_check = Some(Utc::now());
        if record.consecutive_failures >= self.settings.failure_threshold {
            record.circuit_state = CircuitState::Open;
            record.status = Status::Unhealthy;
            if self.opened_at.read().is_none() {
                *self.opened_at.write() = Some(Instant::now());
            }
        } else if record.status == Status::Healthy {
            record.status = Status::Degraded;
        }
    }

    /// Idempotent from stopped; starts the periodic probe task.
    pub async fn start(self: &Arc<Self>, client: Arc<MediaClient>) -> Result<()> {
        let mut handle_guard = self.handle.lock().await;
        if handle_guard.is_some() {
            return Err(AppError::AlreadyRunning);
        }
        let token = CancellationToken::new();
        let monitor = self.clone();
        let child = token.clone();
        let interval = self.settings.check_interval;
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = child.cancelled() => return,
                    _ = ticker.tick() => {
                        if monitor.should_attempt() {
                            let mut record = monitor.record.write();
                            if record.circuit_state == CircuitState::Open {
                                record.circuit_state = CircuitState::HalfOpen;
                            }
                            drop(record);
                            match client.health_check().await {
                                Ok(()) => monitor.record_success(),
                                Err(_) => monitor.record_failure(),
                            }
                        }
                    }
                }
            }
        });
        *handle_guard = Some(join);
        *self.cancel.lock().await = Some(token);
        Ok(())
    }

    /// Completes any in-flight probe bounded by the request timeout, then
    /// stops the periodic task.
    pub async fn stop(&self) {
        if let Some(token) = self.cancel.lock().await.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = tokio::time::timeout(self.settings.request_timeout, handle).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> HealthMonitorSettings {
        HealthMonitorSettings {
            check_interval: Duration::from_millis(10),
            failure_threshold: 2,
            recovery_confirmation_threshold: 2,
            circuit_breaker_timeout: Duration::from_millis(20),
            max_backoff_interval: Duration::from_secs(5),
            backoff_base_multiplier: 2.0,
            request_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn circuit_opens_after_threshold_failures() {
        let monitor = HealthMonitor::new(settings());
        monitor.record_failure();
        assert_eq!(monitor.get_status().circuit_state, CircuitState::Closed);
        monitor.record_failure();
        assert_eq!(monitor.get_status().circuit_state, CircuitState::Open);
        assert!(!monitor.is_healthy());
    }

    #[test]
    fn half_open_closes_after_recovery_threshold() {
        let monitor = HealthMonitor::new(settings());
        monitor.record_failure();
        monitor.record_failure();
        monitor.record.write().circuit_state = CircuitState::HalfOpen;
        monitor.record_success();
        assert_eq!(monitor.get_status().circuit_state, CircuitState::HalfOpen);
        monitor.record_success();
        assert_eq!(monitor.get_status().circuit_state, CircuitState::Closed);
        assert!(monitor.is_healthy());
    }

    #[test]
    fn metrics_track_totals() {
        let monitor = HealthMonitor::new(settings());
        monitor.record_success();
        monitor.record_failure();
        let metrics = monitor.get_metrics();
        assert_eq!(metrics.total_checks, 2);
        assert_eq!(metrics.successful_checks, 1);
        assert_eq!(metrics.failed_checks, 1);
    }
}
