//! Shared registry handle and a timer task that cleans it periodically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::registry::ResourceRegistry;

/// The single registry handle shared by the loader, the quality controller and
/// the cleanup task.
pub type SharedRegistry = Arc<Mutex<ResourceRegistry>>;

pub fn shared(registry: ResourceRegistry) -> SharedRegistry {
    Arc::new(Mutex::new(registry))
}

/// Lock the shared registry. A panic in another holder does not leave the
/// bookkeeping half-updated, so a poisoned lock is recovered.
pub fn lock(registry: &SharedRegistry) -> MutexGuard<'_, ResourceRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Background task running [`ResourceRegistry::run_cleanup_pass`] on an interval.
///
/// Enabling while already enabled stops the running task first, so repeated
/// enables never leave more than one timer alive.
#[derive(Default)]
pub struct AutoCleanupTask {
    handle: Option<JoinHandle<()>>,
    passes: Arc<AtomicU64>,
}

impl AutoCleanupTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the timer on the current tokio runtime. Returns `false` (and
    /// stays disabled) when called outside a runtime.
    pub fn enable(&mut self, registry: SharedRegistry, interval: Duration) -> bool {
        self.disable();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("Auto-cleanup needs a tokio runtime; leaving it disabled");
            return false;
        };
        if interval.is_zero() {
            log::warn!("Auto-cleanup interval must be positive; leaving it disabled");
            return false;
        }

        let passes = self.passes.clone();
        self.handle = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let released = lock(&registry).run_cleanup_pass();
                passes.fetch_add(1, Ordering::Relaxed);
                log::trace!("Auto-cleanup pass released {} resources", released);
            }
        }));
        log::debug!("Auto-cleanup task started every {:?}", interval);
        true
    }

    pub fn disable(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            log::debug!("Auto-cleanup task stopped");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Completed cleanup passes since creation
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }
}

impl Drop for AutoCleanupTask {
    fn drop(&mut self) {
        self.disable();
    }
}
