//! Cancellable debounce timer.
//!
//! `schedule` arms the timer; scheduling again before it fires restarts the
//! window, so a burst of calls runs the action once. Only the waiting phase
//! is cancellable: once the window elapses the action runs on its own task.
//! Dropping the debouncer cancels any pending action.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Coalesces bursts of work into a single delayed run.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Arm (or re-arm) the timer to run `action` after the delay.
    ///
    /// Returns false when called outside a tokio runtime; nothing is
    /// scheduled in that case.
    pub fn schedule<F>(&self, action: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("No async runtime available, debounced action dropped");
            return false;
        };

        let delay = self.delay;
        let mut pending = self.pending();
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let spawner = runtime.clone();
        *pending = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            spawner.spawn(action);
        }));
        true
    }

    /// Whether an action is waiting for its window to elapse.
    pub fn is_pending(&self) -> bool {
        self.pending()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Cancel the pending action. Returns true if one was waiting.
    pub fn cancel(&self) -> bool {
        match self.pending().take() {
            Some(handle) => {
                let was_waiting = !handle.is_finished();
                handle.abort();
                was_waiting
            }
            None => false,
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}
