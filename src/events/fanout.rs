//! Event Fanout (C11): per-connection, per-topic bounded delivery with
//! drop-oldest backpressure.
//!
//! Each connection keeps one bounded FIFO queue per topic it is subscribed
//! to. `publish` never blocks: a full topic queue drops its oldest entry and
//! increments that connection's drop counter before enqueuing the new one.
//! Cross-topic ordering is not guaranteed, only per-topic per-connection FIFO.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use super::types::{EventEnvelope, SystemEvent};

#[derive(Debug, Clone)]
pub struct FanoutSettings {
    pub queue_depth_per_topic: usize,
    pub cleanup_interval: Duration,
}

impl Default for FanoutSettings {
    fn default() -> Self {
        Self {
            queue_depth_per_topic: 32,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

struct ConnectionState {
    subscriptions: Mutex<Vec<String>>,
    queues: Mutex<HashMap<String, VecDeque<EventEnvelope>>>,
    drop_count: AtomicU64,
    alive: AtomicBool,
    notify: Notify,
}

pub struct EventFanout {
    settings: FanoutSettings,
    order: Mutex<Vec<Uuid>>,
    connections: Mutex<HashMap<Uuid, Arc<ConnectionState>>>,
    cleanup_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    cancel: tokio::sync::Mutex<Option<tokio_util::sync::CancellationToken>>,
}

impl EventFanout {
    pub fn new(settings: FanoutSettings) -> Arc<Self> {
        Arc::new(Self {
            settings,
            order: Mutex::new(Vec::new()),
            connections: Mutex::new(HashMap::new()),
            cleanup_handle: tokio::sync::Mutex::new(None),
            cancel: tokio::sync::Mutex::new(None),
        })
    }

    pub fn register(&self, topics: Vec<String>) -> Uuid {
        let id = Uuid::new_v4();
        let state = Arc::new(ConnectionState {
            subscriptions: Mutex::new(topics),
            queues: Mutex::new(HashMap::new()),
            drop_count: AtomicU64::new(0),
            alive: AtomicBool::new(true),
            notify: Notify::new(),
        });
        self.connections.lock().insert(id, state);
        self.order.lock().push(id);
        id
    }

    /// Replaces a connection's subscription set (client-issued subscribe /
    /// unsubscribe). A no-op if the connection is unknown or already gone.
    pub fn set_subscriptions(&self, id: Uuid, topics: Vec<String>) {
        if let Some(state) = self.connections.lock().get(&id) {
            *state.subscriptions.lock() = topics;
        }
    }

    pub fn subscriptions(&self, id: Uuid) -> Vec<String> {
        self.connections
            .lock()
            .get(&id)
            .map(|s| s.subscriptions.lock().clone())
            .unwrap_or_default()
    }

    pub fn disconnect(&self, id: Uuid) {
        if let Some(state) = self.connections.lock().get(&id) {
            state.alive.store(false, Ordering::SeqCst);
        }
    }

    pub fn drop_count(&self, id: Uuid) -> u64 {
        self.connections
            .lock()
            .get(&id)
            .map(|s| s.drop_count.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Sum of every live connection's drop counter, surfaced via
    /// `get_metrics` (spec §4.11/§7).
    pub fn total_drop_count(&self) -> u64 {
        self.connections
            .lock()
            .values()
            .map(|s| s.drop_count.load(Ordering::SeqCst))
            .sum()
    }

    /// Enqueues `event` for every live, subscribed connection, in
    /// registration order.
    pub fn publish(&self, event: SystemEvent) {
        let topic = event.event_name().to_string();
        let envelope = EventEnvelope {
            event,
            timestamp: chrono::Utc::now(),
        };
        let order = self.order.lock().clone();
        let connections = self.connections.lock();
        for id in order {
            let Some(state) = connections.get(&id) else { continue };
            if !state.alive.load(Ordering::SeqCst) {
                continue;
            }
            if !state.subscriptions.lock().iter().any(|t| matches_subscription(t, &topic)) {
                continue;
            }
            let mut queues = state.queues.lock();
            let queue = queues.entry(topic.clone()).or_default();
            if queue.len() >= self.settings.queue_depth_per_topic {
                queue.pop_front();
                state.drop_count.fetch_add(1, Ordering::SeqCst);
            }
            queue.push_back(envelope.clone());
            drop(queues);
            state.notify.notify_waiters();
        }
    }

    /// Pops the next queued notification for a connection, round-robining
    /// across its subscribed topics. Returns `None` if nothing is queued.
    pub fn try_next(&self, id: Uuid) -> Option<EventEnvelope> {
        let state = self.connections.lock().get(&id).cloned()?;
        let mut queues = state.queues.lock();
        let topic = queues
            .iter()
            .find(|(_, q)| !q.is_empty())
            .map(|(t, _)| t.clone())?;
        queues.get_mut(&topic).and_then(|q| q.pop_front())
    }

    pub async fn wait_for_next(&self, id: Uuid) {
        let Some(state) = self.connections.lock().get(&id).cloned() else {
            return;
        };
        state.notify.notified().await;
    }

    pub async fn start_cleanup(self: &Arc<Self>) -> crate::error::Result<()> {
        let mut handle_guard = self.cleanup_handle.lock().await;
        if handle_guard.is_some() {
            return Err(crate::error::AppError::AlreadyRunning);
        }
        let token = tokio_util::sync::CancellationToken::new();
        let child = token.child_token();
        let fanout = Arc::clone(self);
        let interval = self.settings.cleanup_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => fanout.sweep_disconnected(),
                }
            }
        });
        *handle_guard = Some(handle);
        *self.cancel.lock().await = Some(token);
        Ok(())
    }

    pub async fn stop_cleanup(&self) {
        if let Some(token) = self.cancel.lock().await.take() {
            token.cancel();
        }
        if let Some(handle) = self.cleanup_handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    fn sweep_disconnected(&self) {
        let mut connections = self.connections.lock();
        let dead: Vec<Uuid> = connections
            .iter()
            .filter(|(_, s)| !s.alive.load(Ordering::SeqCst))
            .map(|(id, _)| *id)
            .collect();
        for id in &dead {
            connections.remove(id);
        }
        drop(connections);
        if !dead.is_empty() {
            self.order.lock().retain(|id| !dead.contains(id));
        }
    }
}

fn matches_subscription(subscription: &str, topic: &str) -> bool {
    if subscription == "*" {
        return true;
    }
    if let Some(prefix) = subscription.strip_suffix(".*") {
        topic.starts_with(prefix)
    } else {
        subscription == topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fanout() -> Arc<EventFanout> {
        EventFanout::new(FanoutSettings {
            queue_depth_per_topic: 2,
            cleanup_interval: Duration::from_secs(60),
        })
    }

    #[test]
    fn delivers_to_subscribed_connection_only() {
        let fanout = fanout();
        let subscribed = fanout.register(vec!["device.*".to_string()]);
        let unsubscribed = fanout.register(vec!["recording.*".to_string()]);

        fanout.publish(SystemEvent::DeviceAppeared {
            device: "/dev/video0".to_string(),
            name: "cam".to_string(),
        });

        assert!(fanout.try_next(subscribed).is_some());
        assert!(fanout.try_next(unsubscribed).is_none());
    }

    #[test]
    fn full_topic_queue_drops_oldest_and_counts_it() {
        let fanout = fanout();
        let id = fanout.register(vec!["device.*".to_string()]);

        for i in 0..3 {
            fanout.publish(SystemEvent::DeviceAppeared {
                device: format!("/dev/video{i}"),
                name: "cam".to_string(),
            });
        }

        assert_eq!(fanout.drop_count(id), 1);
        assert_eq!(fanout.total_drop_count(), 1);
        let first = fanout.try_next(id).unwrap();
        match first.event {
            SystemEvent::DeviceAppeared { device, .. } => assert_eq!(device, "/dev/video1"),
            _ => panic!("unexpected event"),
        }
    }

    #[test]
    fn total_drop_count_sums_across_connections() {
        let fanout = fanout();
        let a = fanout.register(vec!["device.*".to_string()]);
        let b = fanout.register(vec!["device.*".to_string()]);

        for i in 0..3 {
            fanout.publish(SystemEvent::DeviceAppeared {
                device: format!("/dev/video{i}"),
                name: "cam".to_string(),
            });
        }

        assert_eq!(fanout.drop_count(a), 1);
        assert_eq!(fanout.drop_count(b), 1);
        assert_eq!(fanout.total_drop_count(), 2);
    }

    #[test]
    fn disconnect_then_sweep_removes_the_connection() {
        let fanout = fanout();
        let id = fanout.register(vec!["*".to_string()]);
        fanout.disconnect(id);
        fanout.sweep_disconnected();
        assert!(fanout.try_next(id).is_none());
        assert!(!fanout.order.lock().contains(&id));
    }
}
