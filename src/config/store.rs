//! Read-only configuration snapshot with update callbacks (spec §4.1, C1)
//!
//! Uses `ArcSwap` for lock-free reads, matching the teacher's
//! `config::store::ConfigStore` pattern but dropping the SQLite-backed
//! persistence layer: this spec treats config-file parsing and hot-reload
//! plumbing as an external collaborator's concern (spec §1), so `ConfigView`
//! only needs to hold the current snapshot and notify callbacks on reload.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::schema::AppConfig;
use crate::error::Result;

/// A registered reload callback. Boxed so `ConfigView` can hold a
/// heterogeneous list of listeners.
type UpdateCallback = Box<dyn Fn(&AppConfig) + Send + Sync>;

/// Read-only, update-notified configuration view (C1: Config View).
///
/// `get()` is a lock-free pointer load; `reload()` swaps the pointer and
/// then runs every registered callback, in registration order, inside a
/// panic boundary so one broken callback cannot prevent the others from
/// running or abort the reload itself.
pub struct ConfigView {
    current: ArcSwap<AppConfig>,
    callbacks: Mutex<Vec<UpdateCallback>>,
}

impl ConfigView {
    /// Create a view seeded with an already-validated configuration.
    pub fn new(initial: AppConfig) -> Arc<Self> {
        Arc::new(Self {
            current: ArcSwap::from_pointee(initial),
            callbacks: Mutex::new(Vec::new()),
        })
    }

    /// Return the current configuration snapshot (cheap `Arc` clone).
    pub fn get(&self) -> Arc<AppConfig> {
        self.current.load_full()
    }

    /// Register a callback invoked after every successful reload with the
    /// new snapshot. Callbacks run sequentially in registration order.
    pub fn add_update_callback<F>(&self, callback: F)
    where
        F: Fn(&AppConfig) + Send + Sync + 'static,
    {
        self.callbacks.lock().push(Box::new(callback));
    }

    /// Validate `new`, and if valid, install it and notify callbacks.
    /// On validation failure the previous snapshot is left in place and
    /// the error is returned; callbacks are not invoked.
    pub fn reload(&self, new: AppConfig) -> Result<()> {
        new.validate()?;
        self.current.store(Arc::new(new));
        let snapshot = self.current.load_full();

        let callbacks = self.callbacks.lock();
        for callback in callbacks.iter() {
            // A panicking callback must not prevent the others from
            // running, and must not be allowed to unwind into whatever
            // task drove this reload.
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| callback(&snapshot)));
            if let Err(panic) = result {
                tracing::error!(?panic, "config update callback panicked; continuing");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn reload_installs_new_snapshot() {
        let view = ConfigView::new(AppConfig::default());
        let mut changed = AppConfig::default();
        changed.server.port = 9999;
        view.reload(changed).unwrap();
        assert_eq!(view.get().server.port, 9999);
    }

    #[test]
    fn invalid_reload_leaves_previous_snapshot() {
        let view = ConfigView::new(AppConfig::default());
        let mut bad = AppConfig::default();
        bad.storage.warn_percent = 99.0;
        bad.storage.block_percent = 10.0;
        assert!(view.reload(bad).is_err());
        assert_eq!(view.get().storage.warn_percent, 80.0);
    }

    #[test]
    fn callbacks_run_in_order_and_survive_a_panic() {
        let view = ConfigView::new(AppConfig::default());
        let order = Arc::new(Mutex::new(Vec::new()));

        let order1 = order.clone();
        view.add_update_callback(move |_| order1.lock().push(1));
        view.add_update_callback(|_| panic!("boom"));
        let order3 = order.clone();
        view.add_update_callback(move |_| order3.lock().push(3));

        let mut changed = AppConfig::default();
        changed.server.port = 1234;
        view.reload(changed).unwrap();

        assert_eq!(*order.lock(), vec![1, 3]);
    }

    #[test]
    fn callback_invocation_count_matches_reload_count() {
        let view = ConfigView::new(AppConfig::default());
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        view.add_update_callback(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });

        for port in [1000u16, 2000, 3000] {
            let mut changed = AppConfig::default();
            changed.server.port = port;
            view.reload(changed).unwrap();
        }

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
