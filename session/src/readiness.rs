//! Readiness gate: lets senders wait, with a deadline, until the gateway
//! session is authenticated and open.
//!
//! Every pending caller is a waiter in a registry keyed by a gate-generated
//! id. A waiter leaves the registry exactly once, in one of four ways: the
//! session opens (resolved), a terminal close or shutdown rejects it, its
//! deadline elapses, or the caller drops the wait future. The last two are
//! handled by the waiter's `Drop`, so repeated timeouts never grow the set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::*;
use tokio::sync::oneshot;
use tokio::time;

use crate::error::{Error, ErrorKind};

type Outcome = Result<(), ErrorKind>;

#[derive(Default)]
struct GateState {
    open: bool,
    shut_down: bool,
    waiters: HashMap<u64, oneshot::Sender<Outcome>>,
}

#[derive(Default)]
struct Shared {
    /// Mirrors `GateState::open` for lock-free `is_ready` checks.
    ready: AtomicBool,
    next_id: AtomicU64,
    state: Mutex<GateState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle to the session's readiness gate.
///
/// Consumers may only observe and wait; opening and rejecting are reserved
/// to the session coordinator.
#[derive(Clone, Default)]
pub struct ReadinessGate {
    shared: Arc<Shared>,
}

enum Registration {
    Ready,
    Rejected(ErrorKind),
    Pending(Waiter),
}

/// A registered caller. Removes itself from the registry when dropped.
struct Waiter {
    id: u64,
    outcome: oneshot::Receiver<Outcome>,
    shared: Arc<Shared>,
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.shared.lock().waiters.remove(&self.id);
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking snapshot of whether the session is open.
    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Acquire)
    }

    /// Number of callers currently waiting.
    pub fn pending_waiters(&self) -> usize {
        self.shared.lock().waiters.len()
    }

    /// Wait until the session opens, for at most `timeout`.
    ///
    /// Resolves immediately if the session is already open. Fails with
    /// `ReadinessTimeout` when the deadline elapses, `TerminalAuth` when the
    /// session is logged out meanwhile, and `Shutdown` once the gate is torn
    /// down.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<(), Error> {
        let mut waiter = match self.register() {
            Registration::Ready => return Ok(()),
            Registration::Rejected(kind) => return Err(rejection(kind)),
            Registration::Pending(waiter) => waiter,
        };

        match time::timeout(timeout, &mut waiter.outcome).await {
            Ok(Ok(outcome)) => outcome.map_err(rejection),
            Ok(Err(_)) => Err(rejection(ErrorKind::Shutdown)),
            // The coordinator may have resolved us right at the deadline.
            Err(_) => match waiter.outcome.try_recv() {
                Ok(outcome) => outcome.map_err(rejection),
                Err(_) => {
                    debug!("Readiness wait timed out after {timeout:?}");
                    Err(Error::new(
                        ErrorKind::ReadinessTimeout,
                        &format!("session not ready after {timeout:?}"),
                    ))
                }
            },
        }
    }

    fn register(&self) -> Registration {
        let mut state = self.shared.lock();
        if state.shut_down {
            return Registration::Rejected(ErrorKind::Shutdown);
        }
        if state.open {
            return Registration::Ready;
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, outcome) = oneshot::channel();
        state.waiters.insert(id, sender);

        Registration::Pending(Waiter {
            id,
            outcome,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Mark the session open and resolve every pending waiter once.
    /// Returns how many waiters were released.
    pub(crate) fn mark_open(&self) -> usize {
        let mut state = self.shared.lock();
        state.open = true;
        self.shared.ready.store(true, Ordering::Release);
        Self::settle(&mut state, Ok(()))
    }

    /// Mark the session not ready. Pending waiters keep waiting.
    pub(crate) fn mark_not_ready(&self) {
        let mut state = self.shared.lock();
        state.open = false;
        self.shared.ready.store(false, Ordering::Release);
    }

    /// Reject every pending waiter with `kind`. Later callers wait normally.
    pub(crate) fn reject_all(&self, kind: ErrorKind) -> usize {
        let mut state = self.shared.lock();
        state.open = false;
        self.shared.ready.store(false, Ordering::Release);
        Self::settle(&mut state, Err(kind))
    }

    /// Reject every pending waiter and all future callers with `Shutdown`.
    pub(crate) fn shutdown(&self) -> usize {
        let mut state = self.shared.lock();
        state.open = false;
        state.shut_down = true;
        self.shared.ready.store(false, Ordering::Release);
        Self::settle(&mut state, Err(ErrorKind::Shutdown))
    }

    fn settle(state: &mut GateState, outcome: Outcome) -> usize {
        let mut settled = 0;
        for (_, sender) in state.waiters.drain() {
            // A closed receiver belongs to a caller that is already leaving.
            if sender.send(outcome.clone()).is_ok() {
                settled += 1;
            }
        }
        settled
    }
}

fn rejection(kind: ErrorKind) -> Error {
    let message = match kind {
        ErrorKind::TerminalAuth => "session was logged out while waiting",
        ErrorKind::Shutdown => "session is shutting down",
        _ => "session is not ready",
    };
    Error::new(kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task;

    const TIMEOUT: Duration = Duration::from_millis(15000);

    #[tokio::test]
    async fn test_resolves_immediately_when_open() {
        let gate = ReadinessGate::new();
        gate.mark_open();

        assert!(gate.is_ready());
        gate.wait_until_ready(Duration::ZERO).await.unwrap();
        assert_eq!(gate.pending_waiters(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_releases_all_pending_waiters() {
        let gate = ReadinessGate::new();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.wait_until_ready(TIMEOUT).await })
            })
            .collect();

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gate.pending_waiters(), 3);
        assert!(!gate.is_ready());

        assert_eq!(gate.mark_open(), 3);
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(gate.pending_waiters(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_reject_and_do_not_accumulate() {
        let gate = ReadinessGate::new();

        for _ in 0..10 {
            let started = time::Instant::now();
            let err = gate
                .wait_until_ready(Duration::from_millis(500))
                .await
                .unwrap_err();
            assert_eq!(err.error_kind, ErrorKind::ReadinessTimeout);
            assert!(started.elapsed() >= Duration::from_millis(500));
            assert_eq!(gate.pending_waiters(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_close_rejects_waiters_immediately() {
        let gate = ReadinessGate::new();
        let waiting = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_until_ready(TIMEOUT).await })
        };
        time::sleep(Duration::from_millis(10)).await;

        let started = time::Instant::now();
        assert_eq!(gate.reject_all(ErrorKind::TerminalAuth), 1);
        let err = waiting.await.unwrap().unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::TerminalAuth);
        assert!(started.elapsed() < Duration::from_millis(1));
        assert_eq!(gate.pending_waiters(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_after_terminal_close_still_wait_for_their_deadline() {
        let gate = ReadinessGate::new();
        gate.reject_all(ErrorKind::TerminalAuth);

        let err = gate
            .wait_until_ready(Duration::from_millis(300))
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::ReadinessTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_rejects_pending_and_future_waiters() {
        let gate = ReadinessGate::new();
        let waiting = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_until_ready(TIMEOUT).await })
        };
        time::sleep(Duration::from_millis(10)).await;

        gate.shutdown();
        assert_eq!(
            waiting.await.unwrap().unwrap_err().error_kind,
            ErrorKind::Shutdown
        );
        assert_eq!(
            gate.wait_until_ready(TIMEOUT).await.unwrap_err().error_kind,
            ErrorKind::Shutdown
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_wait_removes_its_waiter() {
        let gate = ReadinessGate::new();
        let waiting = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_until_ready(TIMEOUT).await })
        };
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gate.pending_waiters(), 1);

        waiting.abort();
        let _ = waiting.await;
        task::yield_now().await;
        assert_eq!(gate.pending_waiters(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_not_ready_keeps_waiters() {
        let gate = ReadinessGate::new();
        gate.mark_open();
        gate.mark_not_ready();
        assert!(!gate.is_ready());

        let waiting = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_until_ready(TIMEOUT).await })
        };
        time::sleep(Duration::from_millis(10)).await;
        gate.mark_not_ready();
        assert_eq!(gate.pending_waiters(), 1);

        gate.mark_open();
        waiting.await.unwrap().unwrap();
    }
}
