//! Lightweight request counters backing `get_metrics` (spec §6).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct RequestMetrics {
    active_connections: AtomicU64,
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_response_time_micros: AtomicU64,
}

impl RequestMetrics {
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_request(&self, elapsed: Duration, failed: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        self.total_response_time_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn average_response_time_ms(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        let micros = self.total_response_time_micros.load(Ordering::Relaxed);
        (micros as f64 / total as f64) / 1000.0
    }

    pub fn error_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.failed_requests.load(Ordering::Relaxed) as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_rate_is_zero_with_no_requests() {
        let metrics = RequestMetrics::default();
        assert_eq!(metrics.error_rate(), 0.0);
    }

    #[test]
    fn tracks_failures_proportionally() {
        let metrics = RequestMetrics::default();
        metrics.record_request(Duration::from_millis(10), false);
        metrics.record_request(Duration::from_millis(10), true);
        assert_eq!(metrics.error_rate(), 0.5);
        assert!(metrics.average_response_time_ms() > 0.0);
    }
}
