//! Per-client sliding-window rate limiting (spec §4.9).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct ClientRateInfo {
    pub client_id: String,
    pub request_count: u32,
    pub window_start: DateTime<Utc>,
}

struct Window {
    count: u32,
    started_at: DateTime<Utc>,
}

pub struct RateLimiter {
    window: chrono::Duration,
    max_requests: u32,
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::seconds(60)),
            max_requests,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Records one request for `client_id`. Returns `true` if the request is
    /// within the configured limit, `false` if it must be rejected.
    pub fn record_request(&self, client_id: &str) -> bool {
        let now = Utc::now();
        let mut clients = self.clients.lock();
        let window = clients.entry(client_id.to_string()).or_insert_with(|| Window {
            count: 0,
            started_at: now,
        });

        if now - window.started_at >= self.window {
            window.started_at = now;
            window.count = 0;
        }

        window.count += 1;
        window.count <= self.max_requests
    }

    pub fn get_client_rate_info(&self, client_id: &str) -> ClientRateInfo {
        let clients = self.clients.lock();
        match clients.get(client_id) {
            Some(window) => ClientRateInfo {
                client_id: client_id.to_string(),
                request_count: window.count,
                window_start: window.started_at,
            },
            None => ClientRateInfo {
                client_id: client_id.to_string(),
                request_count: 0,
                window_start: Utc::now(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_up_to_the_configured_count() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 3);
        assert!(limiter.record_request("client-a"));
        assert!(limiter.record_request("client-a"));
        assert!(limiter.record_request("client-a"));
        assert!(!limiter.record_request("client-a"));
    }

    #[test]
    fn tracks_clients_independently() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        assert!(limiter.record_request("a"));
        assert!(limiter.record_request("b"));
    }

    #[test]
    fn rate_info_reflects_recorded_requests() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 5);
        limiter.record_request("client-a");
        limiter.record_request("client-a");
        let info = limiter.get_client_rate_info("client-a");
        assert_eq!(info.client_id, "client-a");
        assert_eq!(info.request_count, 2);
    }

    #[test]
    fn unknown_client_reports_zero_requests() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 5);
        let info = limiter.get_client_rate_info("never-seen");
        assert_eq!(info.request_count, 0);
    }
}
