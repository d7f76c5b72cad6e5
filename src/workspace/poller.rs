//! Workspace progress poller.
//!
//! Re-reads one workspace's progression on a fixed interval and publishes the
//! latest value on a watch channel. It follows the same generation discipline
//! as the insight sync engine: disposing bumps the generation and anything
//! that resolves afterwards is dropped.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::ProgressConfig;
use crate::core::WorkspaceProgression;
use crate::error::{FoundryError, Result};
use crate::workspace::store::WorkspaceStore;

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Value read and published (whether or not it changed).
    Updated { changed: bool },
    /// Read failed; last value kept.
    Failed,
    /// Previous read still in flight.
    Skipped,
    /// Poller disposed while the read was out.
    Stale,
    /// Poller already disposed.
    Disposed,
}

struct Inner {
    generation: u64,
    in_flight: bool,
    disposed: bool,
    failures: u64,
    timer: Option<JoinHandle<()>>,
}

struct Shared<W> {
    workspace_id: String,
    store: W,
    interval: Duration,
    timeout: Duration,
    inner: Mutex<Inner>,
    publisher: watch::Sender<Option<WorkspaceProgression>>,
}

impl<W: WorkspaceStore + 'static> Shared<W> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn poll(&self) -> PollOutcome {
        let generation = {
            let mut inner = self.lock();
            if inner.disposed {
                return PollOutcome::Disposed;
            }
            if inner.in_flight {
                return PollOutcome::Skipped;
            }
            inner.in_flight = true;
            inner.generation
        };

        let read = match tokio::time::timeout(
            self.timeout,
            self.store.get_progression(&self.workspace_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FoundryError::timeout(
                "get_progression",
                self.timeout.as_millis() as u64,
            )),
        };

        let mut inner = self.lock();
        if inner.generation != generation {
            return PollOutcome::Stale;
        }
        inner.in_flight = false;

        match read {
            Ok(progression) => {
                let changed = self.publisher.send_if_modified(|current| {
                    if *current == progression {
                        false
                    } else {
                        *current = progression;
                        true
                    }
                });
                if changed {
                    tracing::debug!(workspace = %self.workspace_id, "progression changed");
                }
                PollOutcome::Updated { changed }
            }
            Err(e) => {
                inner.failures += 1;
                if e.is_transient() {
                    tracing::warn!(workspace = %self.workspace_id, error = %e, "progress read failed, keeping last value");
                } else {
                    tracing::error!(workspace = %self.workspace_id, error = %e, "progress record unreadable, keeping last value");
                }
                PollOutcome::Failed
            }
        }
    }
}

/// Polls one workspace's progression while something is watching it.
///
/// Dropping the poller disposes it.
pub struct ProgressPoller<W: WorkspaceStore + 'static> {
    shared: Arc<Shared<W>>,
}

impl<W: WorkspaceStore + 'static> ProgressPoller<W> {
    pub fn new(
        workspace_id: impl Into<String>,
        store: W,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        let (publisher, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                workspace_id: workspace_id.into(),
                store,
                interval,
                timeout,
                inner: Mutex::new(Inner {
                    generation: 0,
                    in_flight: false,
                    disposed: false,
                    failures: 0,
                    timer: None,
                }),
                publisher,
            }),
        }
    }

    /// Poller using the configured interval; reads share the sync timeout.
    pub fn from_config(
        workspace_id: impl Into<String>,
        store: W,
        progress: &ProgressConfig,
        request_timeout: Duration,
    ) -> Self {
        Self::new(
            workspace_id,
            store,
            Duration::from_millis(progress.poll_interval_ms),
            request_timeout,
        )
    }

    pub fn workspace_id(&self) -> &str {
        &self.shared.workspace_id
    }

    /// Latest published progression.
    pub fn latest(&self) -> Option<WorkspaceProgression> {
        self.shared.publisher.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<WorkspaceProgression>> {
        self.shared.publisher.subscribe()
    }

    /// Number of failed reads so far.
    pub fn failures(&self) -> u64 {
        self.shared.lock().failures
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.lock().disposed
    }

    /// Start the timer. Read now, then on every interval.
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| FoundryError::invalid_state(format!("no async runtime: {}", e)))?;

        let mut inner = self.shared.lock();
        if inner.disposed {
            return Err(FoundryError::invalid_state(format!(
                "progress poller for {} is disposed",
                self.shared.workspace_id
            )));
        }
        if inner.timer.is_none() {
            let shared = Arc::clone(&self.shared);
            let period = shared.interval;
            inner.timer = Some(runtime.spawn(async move {
                let mut timer = tokio::time::interval(period);
                timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    timer.tick().await;
                    if shared.poll().await == PollOutcome::Disposed {
                        break;
                    }
                }
            }));
        }
        Ok(())
    }

    /// Read once now.
    pub async fn poll(&self) -> PollOutcome {
        self.shared.poll().await
    }

    /// Stop polling. Reads still in flight are discarded when they land.
    pub fn dispose(&self) {
        let mut inner = self.shared.lock();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.generation += 1;
        inner.in_flight = false;
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        tracing::debug!(workspace = %self.shared.workspace_id, "progress poller disposed");
    }
}

impl<W: WorkspaceStore + 'static> Drop for ProgressPoller<W> {
    fn drop(&mut self) {
        self.dispose();
    }
}
