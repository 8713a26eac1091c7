//! Health check logic

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Tracks whether the components behind the API are up
///
/// The controller flips the flags as it brings the store and the worker
/// pool up and down; the probes only read them.
#[derive(Debug)]
pub struct HealthChecker {
    /// Whether the notification store is open
    store_ready: Arc<AtomicBool>,

    /// Whether the delivery worker pool is consuming tasks
    delivery_ready: Arc<AtomicBool>,
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthChecker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store_ready: Arc::new(AtomicBool::new(false)),
            delivery_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_store_ready(&self, ready: bool) {
        self.store_ready.store(ready, Ordering::Relaxed);
        tracing::debug!(ready, "Store readiness updated");
    }

    pub fn set_delivery_ready(&self, ready: bool) {
        self.delivery_ready.store(ready, Ordering::Relaxed);
        tracing::debug!(ready, "Delivery readiness updated");
    }

    /// Check if the application is alive
    ///
    /// Answering at all is the signal. A hung server is caught by the
    /// probe's own timeout.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        true
    }

    /// Ready once both the store and the worker pool are up
    #[must_use]
    pub fn is_ready(&self) -> bool {
        let store_ok = self.store_ready.load(Ordering::Relaxed);
        let delivery_ok = self.delivery_ready.load(Ordering::Relaxed);

        let ready = store_ok && delivery_ok;
        if !ready {
            tracing::debug!(
                store_ready = store_ok,
                delivery_ready = delivery_ok,
                "Readiness check failed"
            );
        }

        ready
    }

    #[must_use]
    pub fn get_status(&self) -> HealthStatus {
        HealthStatus {
            alive: self.is_alive(),
            ready: self.is_ready(),
            store_ready: self.store_ready.load(Ordering::Relaxed),
            delivery_ready: self.delivery_ready.load(Ordering::Relaxed),
        }
    }
}

/// Detailed health status, returned by a failing readiness probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "One flag per probed component"
)]
pub struct HealthStatus {
    pub alive: bool,
    pub ready: bool,
    pub store_ready: bool,
    pub delivery_ready: bool,
}
