//! Cooperative cancellation for background work
//!
//! A [`ProgressHandle`] is the one logical "progress" every background task
//! owns. Long running loops call [`ProgressHandle::check_cancelled`] at each
//! iteration and wait through [`ProgressHandle::delay`], which wakes up early
//! once the handle is cancelled. Nothing is interrupted preemptively.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

static NEXT_PROGRESS_ID: AtomicU64 = AtomicU64::new(1);

/// Returned from a suspension point once the owning progress was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Text and fraction last reported by a running task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressStatus {
    pub text: String,
    pub fraction: f64,
}

struct ProgressInner {
    id: u64,
    title: String,
    cancelled: AtomicBool,
    cancel_tx: broadcast::Sender<()>,
    status: Mutex<ProgressStatus>,
}

/// Cancellable progress handle shared between a task and whoever may cancel it
#[derive(Clone)]
pub struct ProgressHandle {
    inner: Arc<ProgressInner>,
}

impl ProgressHandle {
    pub fn new(title: impl Into<String>) -> Self {
        let (cancel_tx, _) = broadcast::channel(4);
        Self {
            inner: Arc::new(ProgressInner {
                id: NEXT_PROGRESS_ID.fetch_add(1, Ordering::Relaxed),
                title: title.into(),
                cancelled: AtomicBool::new(false),
                cancel_tx,
                status: Mutex::new(ProgressStatus::default()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn title(&self) -> &str {
        &self.inner.title
    }

    /// Request cancellation; observed at the task's next suspension point
    pub fn cancel(&self) {
        // Release pairs with the Acquire load in is_cancelled()
        if !self.inner.cancelled.swap(true, Ordering::Release) {
            log::debug!("Cancelling progress [{}] {}", self.inner.id, self.inner.title);
        }
        let _ = self.inner.cancel_tx.send(());
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    pub fn check_cancelled(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, returning early with `Err(Cancelled)` on cancellation
    pub async fn delay(&self, duration: Duration) -> Result<(), Cancelled> {
        let mut cancel_rx = self.inner.cancel_tx.subscribe();
        // a cancel issued before subscribe() would otherwise be missed
        self.check_cancelled()?;
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = cancel_rx.recv() => {}
        }
        self.check_cancelled()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        let text = text.into();
        log::trace!("[{}] {}", self.inner.id, text);
        if let Ok(mut status) = self.inner.status.lock() {
            status.text = text;
        }
    }

    pub fn set_fraction(&self, fraction: f64) {
        if let Ok(mut status) = self.inner.status.lock() {
            status.fraction = fraction.clamp(0.0, 1.0);
        }
    }

    pub fn status(&self) -> ProgressStatus {
        self.inner
            .status
            .lock()
            .map(|status| status.clone())
            .unwrap_or_default()
    }
}

impl PartialEq for ProgressHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ProgressHandle {}

impl Hash for ProgressHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for ProgressHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressHandle")
            .field("id", &self.inner.id)
            .field("title", &self.inner.title)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl fmt::Display for ProgressHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.inner.id, self.inner.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_new_progress_is_not_cancelled() {
        let progress = ProgressHandle::new("test");

        assert!(!progress.is_cancelled());
        assert!(progress.check_cancelled().is_ok());
    }

    #[test]
    fn test_cancel_is_visible_through_clones() {
        let progress = ProgressHandle::new("test");
        let clone = progress.clone();

        clone.cancel();

        assert!(progress.is_cancelled());
        assert_eq!(progress.check_cancelled(), Err(Cancelled));
        assert_eq!(progress, clone);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ProgressHandle::new("a");
        let b = ProgressHandle::new("b");
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_completes_when_not_cancelled() {
        let progress = ProgressHandle::new("test");
        let start = Instant::now();

        let result = progress.delay(Duration::from_millis(500)).await;

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_wakes_up_on_cancel() {
        let progress = ProgressHandle::new("test");
        let canceller = progress.clone();
        let start = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = progress.delay(Duration::from_secs(60)).await;

        assert_eq!(result, Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_delay_on_cancelled_handle_returns_immediately() {
        let progress = ProgressHandle::new("test");
        progress.cancel();

        let result = progress.delay(Duration::from_secs(3600)).await;
        assert_eq!(result, Err(Cancelled));
    }

    #[test]
    fn test_status_updates() {
        let progress = ProgressHandle::new("test");
        progress.set_text("Uploading files");
        progress.set_fraction(1.7);

        let status = progress.status();
        assert_eq!(status.text, "Uploading files");
        assert_eq!(status.fraction, 1.0);
    }
}
