//! Single coarse lock around cache-mutating sync cycles
//!
//! One [`CriticalSection`] is shared by every project a sync engine serves, so
//! sync cycles of different projects run one after another. This costs
//! cross-project throughput and is a known scalability limitation. Callers only
//! see [`CriticalSection::enter`], which keeps a later switch to per-project
//! locking local to this module.
//!
//! Readers of the suggestion cache never take this lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct CriticalSection {
    lock: Mutex<()>,
    entries: AtomicUsize,
}

/// Held for the duration of one logical cache transaction
pub struct CriticalGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    label: String,
}

impl CriticalSection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access. `label` only feeds the logs.
    pub async fn enter(&self, label: &str) -> CriticalGuard<'_> {
        let guard = self.lock.lock().await;
        let count = self.entries.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!("Critical section entered by '{}' (entry #{})", label, count);
        CriticalGuard {
            _guard: guard,
            label: label.to_string(),
        }
    }

    /// True while some task holds the section
    pub fn is_held(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

impl Drop for CriticalGuard<'_> {
    fn drop(&mut self) {
        log::debug!("Critical section released by '{}'", self.label);
    }
}
