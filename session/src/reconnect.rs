//! Fixed-delay reconnect scheduling.
//!
//! At most one reconnect is pending at a time: scheduling again replaces
//! the pending timer. The scheduled task goes through the same guarded
//! `connect()` path as the first connect, so a reconnect can never run
//! alongside an attempt that is already in flight.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::*;
use tokio::task::JoinHandle;
use tokio::time;

/// Default delay between a transient close and the next connect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

pub struct ReconnectPolicy {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl ReconnectPolicy {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `task` once the fixed delay has elapsed, replacing any reconnect
    /// that is still waiting.
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            task.await;
        });

        if let Some(previous) = self.lock().replace(handle) {
            if !previous.is_finished() {
                debug!("Replacing pending reconnect");
            }
            previous.abort();
        }
    }

    /// Cancel the pending reconnect. Returns whether one was still waiting.
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl Drop for ReconnectPolicy {
    fn drop(&mut self) {
        self.cancel();
    }
}
