//! Periodic removal of expired idempotency keys.
//!
//! The reaper runs as a Tokio task owned by the process lifecycle and is
//! stopped through its [`ReaperHandle`]. The claim protocol never depends on
//! when, or whether, a sweep runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::ports::{IdempotencyKeyStore, IdempotencyKeyStoreError};

/// Retention and cadence for idempotency key sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaperConfig {
    /// Keys older than this are deleted.
    pub ttl: Duration,
    /// Time between sweeps.
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Deletes idempotency keys past their retention window.
pub struct IdempotencyReaper {
    keys: Arc<dyn IdempotencyKeyStore>,
    config: ReaperConfig,
}

impl IdempotencyReaper {
    /// Create a reaper over `keys`.
    #[must_use]
    pub fn new(keys: Arc<dyn IdempotencyKeyStore>, config: ReaperConfig) -> Self {
        Self { keys, config }
    }

    /// Run a single sweep and return the number of deleted keys.
    ///
    /// # Errors
    ///
    /// Propagates the store error; the periodic task logs it and carries on.
    pub async fn sweep(&self) -> Result<u64, IdempotencyKeyStoreError> {
        let deleted = self.keys.cleanup_expired(self.config.ttl).await?;
        if deleted > 0 {
            info!(deleted, "removed expired idempotency keys");
        } else {
            debug!("no expired idempotency keys");
        }
        Ok(deleted)
    }

    /// Start sweeping every `interval`, beginning immediately.
    #[must_use]
    pub fn spawn(self) -> ReaperHandle {
        let (shutdown, mut signal) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = self.sweep().await {
                            warn!(error = %err, "idempotency key sweep failed");
                        }
                    }
                    changed = signal.changed() => {
                        if changed.is_err() || *signal.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("idempotency reaper stopped");
        });
        ReaperHandle { shutdown, task }
    }
}

/// Owner of a running reaper task.
pub struct ReaperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signal the task to stop and wait for it to finish its current sweep.
    pub async fn shutdown(self) {
        if self.shutdown.send(true).is_err() {
            debug!("idempotency reaper already exited before shutdown");
        }
        if let Err(err) = self.task.await {
            warn!(error = %err, "idempotency reaper task ended abnormally");
        }
    }
}
