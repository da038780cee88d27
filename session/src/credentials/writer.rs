//! Debounced credential writer.
//!
//! The gateway rotates key material in bursts. Each update (re)arms a single
//! trailing timer; only when the timer fires without a newer update is the
//! latest snapshot handed to `CredentialStore::save`.

use std::sync::Arc;
use std::time::Duration;

use log::*;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use super::{CredentialSnapshot, CredentialStore};

/// What happens to a snapshot still waiting on the timer at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Save the pending snapshot once before stopping.
    Flush,
    /// Drop the pending snapshot; the previously saved one stays on disk.
    Discard,
}

enum Command {
    Update(CredentialSnapshot),
    Shutdown {
        policy: FlushPolicy,
        done: oneshot::Sender<()>,
    },
}

/// Handle to the background writer task.
pub struct CredentialWriter {
    commands: mpsc::UnboundedSender<Command>,
}

impl CredentialWriter {
    /// Spawn the writer task on the current Tokio runtime.
    pub fn spawn(store: Arc<dyn CredentialStore>, delay: Duration) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run(store, delay, receiver));
        Self { commands }
    }

    /// Queue a snapshot. Never blocks.
    pub fn submit(&self, snapshot: CredentialSnapshot) {
        if self.commands.send(Command::Update(snapshot)).is_err() {
            debug!("Credential writer stopped, dropping snapshot");
        }
    }

    /// Stop the writer, applying `policy` to any pending snapshot, and wait
    /// for the task to finish.
    pub async fn shutdown(&self, policy: FlushPolicy) {
        let (done, finished) = oneshot::channel();
        if self
            .commands
            .send(Command::Shutdown { policy, done })
            .is_err()
        {
            return;
        }
        let _ = finished.await;
    }
}

async fn run(
    store: Arc<dyn CredentialStore>,
    delay: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: Option<CredentialSnapshot> = None;
    let timer = time::sleep(delay);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Update(snapshot)) => {
                    if let Some(replaced) = pending.replace(snapshot) {
                        trace!("Coalescing credential snapshot v{}", replaced.version);
                    }
                    timer.as_mut().reset(Instant::now() + delay);
                }
                Some(Command::Shutdown { policy, done }) => {
                    match (policy, pending.take()) {
                        (FlushPolicy::Flush, Some(snapshot)) => persist(store.as_ref(), snapshot).await,
                        (FlushPolicy::Discard, Some(snapshot)) => {
                            info!("Discarding unsaved credential snapshot v{} at shutdown", snapshot.version);
                        }
                        (_, None) => {}
                    }
                    let _ = done.send(());
                    return;
                }
                None => {
                    if pending.is_some() {
                        warn!("Credential writer handle dropped with an unsaved snapshot");
                    }
                    return;
                }
            },
            () = &mut timer, if pending.is_some() => {
                if let Some(snapshot) = pending.take() {
                    persist(store.as_ref(), snapshot).await;
                }
            }
        }
    }
}

/// Save failures are logged and swallowed; the next update retries naturally.
async fn persist(store: &dyn CredentialStore, snapshot: CredentialSnapshot) {
    let version = snapshot.version;
    match store.save(snapshot).await {
        Ok(()) => debug!("Persisted credential snapshot v{version}"),
        Err(e) => error!("Failed to persist credential snapshot v{version}: {e}"),
    }
}
