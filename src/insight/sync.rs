//! Insight sync engine.
//!
//! A [`SyncSession`] keeps one insight stream (one subject and kind) in step
//! with the backend while the owning screen is mounted:
//!
//! ```text
//! Idle -> Polling <-> { Ready, AwaitingCompute } -> Disposed
//! ```
//!
//! Each tick fetches one envelope. A payload moves the session to `Ready`. No
//! payload moves it to `AwaitingCompute`, and if that same response reports
//! an empty queue the session asks the backend to compute, once for that
//! cycle. Polling carries on after `Ready` so server-side recomputation shows
//! up without a remount.
//!
//! Every fetch and trigger remembers the session generation it was launched
//! under. Disposal and restart bump the generation, so anything that resolves
//! afterwards is dropped instead of applied.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SyncConfig;
use crate::error::{FoundryError, Result};
use crate::insight::store::InsightStore;
use crate::insight::types::InsightSubjectKey;

/// Visible state of a sync session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    /// Created, not started.
    Idle,
    /// Started, no response applied yet.
    Polling,
    /// Payload available.
    Ready { payload: serde_json::Value },
    /// Backend has no payload yet; `queue_depth` jobs are ahead.
    AwaitingCompute { queue_depth: u32 },
    /// Screen unmounted; no further changes.
    Disposed,
}

impl SyncState {
    pub fn name(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Polling => "polling",
            SyncState::Ready { .. } => "ready",
            SyncState::AwaitingCompute { .. } => "awaiting_compute",
            SyncState::Disposed => "disposed",
        }
    }

    /// Payload, when ready.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            SyncState::Ready { payload } => Some(payload),
            _ => None,
        }
    }

    /// Human-readable progress line for the screen.
    pub fn describe(&self) -> String {
        match self {
            SyncState::Idle => "not started".to_string(),
            SyncState::Polling => "loading".to_string(),
            SyncState::Ready { .. } => "ready".to_string(),
            SyncState::AwaitingCompute { queue_depth: 0 } => "computing".to_string(),
            SyncState::AwaitingCompute { queue_depth: 1 } => "computing (1 job ahead)".to_string(),
            SyncState::AwaitingCompute { queue_depth } => {
                format!("computing ({} jobs ahead)", queue_depth)
            }
            SyncState::Disposed => "stopped".to_string(),
        }
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Fetches launched.
    pub fetches: u64,
    /// Fetches that failed or timed out.
    pub fetch_failures: u64,
    /// Compute triggers sent.
    pub triggers: u64,
    /// Compute triggers that failed or timed out.
    pub trigger_failures: u64,
    /// Responses dropped because the generation moved on.
    pub discarded: u64,
    /// Ticks skipped because a fetch was still in flight.
    pub skipped_ticks: u64,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Payload received and published.
    Ready,
    /// No payload; `triggered` says whether a compute trigger was sent.
    AwaitingCompute { queue_depth: u32, triggered: bool },
    /// Fetch failed; last published state kept.
    Failed,
    /// Previous fetch still in flight.
    Skipped,
    /// Session was disposed or restarted while the request was out.
    Stale,
    /// Session already disposed; nothing sent.
    Disposed,
}

/// Timing knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }
}

struct Inner {
    state: SyncState,
    generation: u64,
    in_flight: bool,
    stats: SyncStats,
    timer: Option<JoinHandle<()>>,
}

struct Shared<S> {
    key: InsightSubjectKey,
    store: S,
    options: SyncOptions,
    inner: Mutex<Inner>,
    publisher: watch::Sender<SyncState>,
}

impl<S: InsightStore + 'static> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, inner: &mut Inner, state: SyncState) {
        inner.state = state.clone();
        self.publisher.send_replace(state);
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let limit = self.options.request_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(FoundryError::timeout(operation, limit.as_millis() as u64)),
        }
    }

    async fn tick(&self) -> TickOutcome {
        let generation = {
            let mut inner = self.lock();
            if matches!(inner.state, SyncState::Disposed) {
                return TickOutcome::Disposed;
            }
            if matches!(inner.state, SyncState::Idle) {
                self.publish(&mut inner, SyncState::Polling);
            }
            if inner.in_flight {
                inner.stats.skipped_ticks += 1;
                tracing::trace!(subject = %self.key, "fetch still in flight, skipping tick");
                return TickOutcome::Skipped;
            }
            inner.in_flight = true;
            inner.stats.fetches += 1;
            inner.generation
        };

        let fetched = self
            .bounded("fetch_insight", self.store.fetch_insight(&self.key))
            .await;

        {
            let mut inner = self.lock();
            if inner.generation != generation {
                inner.stats.discarded += 1;
                tracing::debug!(subject = %self.key, generation, "discarding stale fetch");
                return TickOutcome::Stale;
            }

            let envelope = match fetched {
                Ok(envelope) => envelope,
                Err(e) => {
                    inner.in_flight = false;
                    inner.stats.fetch_failures += 1;
                    if e.is_transient() {
                        tracing::warn!(subject = %self.key, error = %e, "insight fetch failed, keeping last state");
                    } else {
                        tracing::error!(subject = %self.key, error = %e, "insight fetch rejected, keeping last state");
                    }
                    return TickOutcome::Failed;
                }
            };

            // Payload and queue depth come from the same response.
            let queue_depth = envelope.queue_depth;
            match envelope.payload {
                Some(payload) => {
                    inner.in_flight = false;
                    self.publish(&mut inner, SyncState::Ready { payload });
                    return TickOutcome::Ready;
                }
                None => {
                    self.publish(&mut inner, SyncState::AwaitingCompute { queue_depth });
                    if queue_depth > 0 {
                        inner.in_flight = false;
                        return TickOutcome::AwaitingCompute {
                            queue_depth,
                            triggered: false,
                        };
                    }
                    inner.stats.triggers += 1;
                }
            }
        }

        tracing::debug!(subject = %self.key, "queue empty and no payload, triggering compute");
        let triggered = self
            .bounded("trigger_compute", self.store.trigger_compute(&self.key))
            .await;

        let mut inner = self.lock();
        if inner.generation != generation {
            inner.stats.discarded += 1;
            return TickOutcome::Stale;
        }
        inner.in_flight = false;
        if let Err(e) = triggered {
            inner.stats.trigger_failures += 1;
            if e.is_transient() {
                tracing::warn!(subject = %self.key, error = %e, "compute trigger failed, will retry next cycle");
            } else {
                tracing::error!(subject = %self.key, error = %e, "compute trigger rejected, will retry next cycle");
            }
        }
        TickOutcome::AwaitingCompute {
            queue_depth: 0,
            triggered: true,
        }
    }
}

/// One insight stream kept in sync while its screen is mounted.
///
/// Dropping the session disposes it.
pub struct SyncSession<S: InsightStore + 'static> {
    shared: Arc<Shared<S>>,
}

impl<S: InsightStore + 'static> SyncSession<S> {
    /// Create an idle session.
    pub fn new(key: InsightSubjectKey, store: S, options: SyncOptions) -> Self {
        let (publisher, _) = watch::channel(SyncState::Idle);
        Self {
            shared: Arc::new(Shared {
                key,
                store,
                options,
                inner: Mutex::new(Inner {
                    state: SyncState::Idle,
                    generation: 0,
                    in_flight: false,
                    stats: SyncStats::default(),
                    timer: None,
                }),
                publisher,
            }),
        }
    }

    pub fn key(&self) -> &InsightSubjectKey {
        &self.shared.key
    }

    pub fn state(&self) -> SyncState {
        self.shared.lock().state.clone()
    }

    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    pub fn stats(&self) -> SyncStats {
        self.shared.lock().stats
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.shared.lock().state, SyncState::Disposed)
    }

    /// Receive every published state.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.shared.publisher.subscribe()
    }

    /// Start polling: fetch now, then on every interval.
    ///
    /// Starting an already running session does nothing. A disposed session
    /// cannot be started again.
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| FoundryError::invalid_state(format!("no async runtime: {}", e)))?;

        let mut inner = self.shared.lock();
        if matches!(inner.state, SyncState::Disposed) {
            return Err(FoundryError::invalid_state(format!(
                "session {} is disposed",
                self.shared.key
            )));
        }
        if matches!(inner.state, SyncState::Idle) {
            self.shared.publish(&mut inner, SyncState::Polling);
        }
        if inner.timer.is_none() {
            inner.timer = Some(self.spawn_timer(&runtime));
            tracing::debug!(subject = %self.shared.key, "sync session started");
        }
        Ok(())
    }

    /// Drop everything in flight and start over under a new generation.
    ///
    /// A disposed session stays disposed.
    pub fn restart(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| FoundryError::invalid_state(format!("no async runtime: {}", e)))?;

        let mut inner = self.shared.lock();
        if matches!(inner.state, SyncState::Disposed) {
            return Err(FoundryError::invalid_state(format!(
                "session {} is disposed",
                self.shared.key
            )));
        }
        inner.generation += 1;
        inner.in_flight = false;
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        self.shared.publish(&mut inner, SyncState::Polling);
        inner.timer = Some(self.spawn_timer(&runtime));
        tracing::debug!(subject = %self.shared.key, generation = inner.generation, "sync session restarted");
        Ok(())
    }

    /// Run one polling cycle now.
    pub async fn tick(&self) -> TickOutcome {
        self.shared.tick().await
    }

    /// Stop the session immediately.
    ///
    /// The generation is bumped and the timer cancelled before this returns;
    /// responses still in flight will be discarded when they arrive.
    pub fn dispose(&self) {
        let mut inner = self.shared.lock();
        if matches!(inner.state, SyncState::Disposed) {
            return;
        }
        inner.generation += 1;
        inner.in_flight = false;
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        self.shared.publish(&mut inner, SyncState::Disposed);
        tracing::debug!(subject = %self.shared.key, "sync session disposed");
    }

    fn spawn_timer(&self, runtime: &tokio::runtime::Handle) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let period = shared.options.poll_interval;
        runtime.spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                timer.tick().await;
                if shared.tick().await == TickOutcome::Disposed {
                    break;
                }
            }
        })
    }
}

impl<S: InsightStore + 'static> Drop for SyncSession<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<S: InsightStore + 'static> std::fmt::Debug for SyncSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("SyncSession")
            .field("key", &self.shared.key)
            .field("state", &inner.state.name())
            .field("generation", &inner.generation)
            .field("in_flight", &inner.in_flight)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::memory::MemoryInsightStore;
    use crate::insight::types::{InsightEnvelope, InsightKind};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn key() -> InsightSubjectKey {
        InsightSubjectKey::new("ws-1", InsightKind::FounderAlignment)
    }

    fn options() -> SyncOptions {
        SyncOptions {
            poll_interval: Duration::from_millis(5000),
            request_timeout: Duration::from_millis(10_000),
        }
    }

    fn session(store: &Arc<MemoryInsightStore>) -> SyncSession<Arc<MemoryInsightStore>> {
        SyncSession::new(key(), Arc::clone(store), options())
    }

    /// Holds the first fetch until released, then answers it with
    /// `gated_response` (or the inner store when unset).
    struct GatedStore {
        inner: MemoryInsightStore,
        gate_next: AtomicBool,
        gated_response: Mutex<Option<InsightEnvelope>>,
        release: Notify,
        fetches_started: AtomicUsize,
    }

    impl GatedStore {
        fn new() -> Self {
            Self {
                inner: MemoryInsightStore::new(),
                gate_next: AtomicBool::new(true),
                gated_response: Mutex::new(None),
                release: Notify::new(),
                fetches_started: AtomicUsize::new(0),
            }
        }

        fn answer_gated_with(&self, envelope: InsightEnvelope) {
            *self.gated_response.lock().unwrap() = Some(envelope);
        }
    }

    #[async_trait]
    impl InsightStore for GatedStore {
        async fn fetch_insight(&self, key: &InsightSubjectKey) -> Result<InsightEnvelope> {
            self.fetches_started.fetch_add(1, Ordering::SeqCst);
            if self.gate_next.swap(false, Ordering::SeqCst) {
                self.release.notified().await;
                let gated = self.gated_response.lock().unwrap().take();
                if let Some(envelope) = gated {
                    return Ok(envelope);
                }
            }
            self.inner.fetch_insight(key).await
        }

        async fn trigger_compute(&self, key: &InsightSubjectKey) -> Result<()> {
            self.inner.trigger_compute(key).await
        }
    }

    async fn wait_for_fetch(store: &GatedStore) {
        while store.fetches_started.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_new_session_is_idle() {
        let store = Arc::new(MemoryInsightStore::new());
        let session = session(&store);
        assert_eq!(session.state(), SyncState::Idle);
        assert_eq!(session.generation(), 0);
    }

    #[tokio::test]
    async fn test_queue_then_ready_scenario() {
        let store = Arc::new(MemoryInsightStore::new());
        store.push_response(&key(), InsightEnvelope::pending(0));
        store.push_response(&key(), InsightEnvelope::pending(2));
        store.set_standing(&key(), InsightEnvelope::ready(json!({"score": 87})));
        let session = session(&store);

        assert_eq!(
            session.tick().await,
            TickOutcome::AwaitingCompute {
                queue_depth: 0,
                triggered: true
            }
        );
        assert_eq!(store.trigger_count(&key()), 1);

        assert_eq!(
            session.tick().await,
            TickOutcome::AwaitingCompute {
                queue_depth: 2,
                triggered: false
            }
        );
        assert_eq!(session.state(), SyncState::AwaitingCompute { queue_depth: 2 });
        assert_eq!(store.trigger_count(&key()), 1);

        assert_eq!(session.tick().await, TickOutcome::Ready);
        assert_eq!(
            session.state(),
            SyncState::Ready {
                payload: json!({"score": 87})
            }
        );

        // Still polling after ready, and no compute requested.
        assert_eq!(session.tick().await, TickOutcome::Ready);
        assert_eq!(store.fetch_count(&key()), 4);
        assert_eq!(store.trigger_count(&key()), 1);
    }

    #[tokio::test]
    async fn test_one_trigger_per_empty_cycle() {
        let store = Arc::new(MemoryInsightStore::new());
        store.set_standing(&key(), InsightEnvelope::pending(0));
        let session = session(&store);

        for _ in 0..7 {
            session.tick().await;
        }

        assert_eq!(store.trigger_count(&key()), 7);
        assert_eq!(session.stats().triggers, 7);
    }

    #[tokio::test]
    async fn test_busy_queue_never_triggers() {
        let store = Arc::new(MemoryInsightStore::new());
        store.set_standing(&key(), InsightEnvelope::pending(5));
        let session = session(&store);

        for _ in 0..4 {
            session.tick().await;
        }

        assert_eq!(store.trigger_count(&key()), 0);
        assert_eq!(session.state(), SyncState::AwaitingCompute { queue_depth: 5 });
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_last_state() {
        let store = Arc::new(MemoryInsightStore::new());
        store.push_response(&key(), InsightEnvelope::ready(json!({"score": 40})));
        store.push_failure(&key(), "connection reset");
        let session = session(&store);

        session.tick().await;
        assert_eq!(session.tick().await, TickOutcome::Failed);

        assert_eq!(
            session.state(),
            SyncState::Ready {
                payload: json!({"score": 40})
            }
        );
        assert_eq!(session.stats().fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_never_triggers() {
        let store = Arc::new(MemoryInsightStore::new());
        store.push_failure(&key(), "boom");
        let session = session(&store);

        assert_eq!(session.tick().await, TickOutcome::Failed);
        assert_eq!(store.trigger_count(&key()), 0);
        assert_eq!(session.state(), SyncState::Polling);
    }

    #[tokio::test]
    async fn test_trigger_failure_is_swallowed_and_retried() {
        let store = Arc::new(MemoryInsightStore::new());
        store.set_standing(&key(), InsightEnvelope::pending(0));
        store.fail_triggers(&key(), true);
        let session = session(&store);

        session.tick().await;
        session.tick().await;

        assert_eq!(store.trigger_count(&key()), 2);
        assert_eq!(session.stats().trigger_failures, 2);
        assert_eq!(session.state(), SyncState::AwaitingCompute { queue_depth: 0 });
    }

    #[tokio::test]
    async fn test_dispose_discards_late_response() {
        let store = Arc::new(GatedStore::new());
        store.answer_gated_with(InsightEnvelope::ready(json!({"late": true})));
        let session = Arc::new(SyncSession::new(key(), Arc::clone(&store), options()));

        let ticking = Arc::clone(&session);
        let handle = tokio::spawn(async move { ticking.tick().await });
        wait_for_fetch(&store).await;

        session.dispose();
        store.release.notify_one();

        assert_eq!(handle.await.unwrap(), TickOutcome::Stale);
        assert_eq!(session.state(), SyncState::Disposed);
        assert_eq!(session.stats().discarded, 1);
        assert_eq!(store.inner.trigger_count(&key()), 0);
    }

    #[tokio::test]
    async fn test_restart_discards_previous_generation() {
        let store = Arc::new(GatedStore::new());
        store.answer_gated_with(InsightEnvelope::ready(json!({"old": true})));
        store.inner.set_standing(&key(), InsightEnvelope::pending(3));
        let session = Arc::new(SyncSession::new(key(), Arc::clone(&store), options()));

        let ticking = Arc::clone(&session);
        let handle = tokio::spawn(async move { ticking.tick().await });
        wait_for_fetch(&store).await;

        session.restart().unwrap();
        assert_eq!(session.generation(), 1);
        store.release.notify_one();

        assert_eq!(handle.await.unwrap(), TickOutcome::Stale);
        assert!(session.state().payload().is_none());
        session.dispose();
    }

    #[tokio::test]
    async fn test_restart_after_dispose_is_rejected() {
        let store = Arc::new(MemoryInsightStore::new());
        store.set_standing(&key(), InsightEnvelope::pending(2));
        let session = session(&store);
        session.start().unwrap();
        session.dispose();

        let err = session.restart().unwrap_err();
        assert!(matches!(err, FoundryError::InvalidState { .. }));
        assert_eq!(err.to_string(), session.start().unwrap_err().to_string());
        assert_eq!(session.state(), SyncState::Disposed);
        assert_eq!(session.tick().await, TickOutcome::Disposed);
        assert_eq!(store.trigger_count(&key()), 0);
    }

    /// Answers every fetch with a payload that cannot be decoded.
    struct CorruptStore {
        triggers: AtomicUsize,
    }

    #[async_trait]
    impl InsightStore for CorruptStore {
        async fn fetch_insight(&self, _key: &InsightSubjectKey) -> Result<InsightEnvelope> {
            Err(FoundryError::serde("expected value at line 1 column 1"))
        }

        async fn trigger_compute(&self, _key: &InsightSubjectKey) -> Result<()> {
            self.triggers.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_rejected_fetch_is_counted_like_transient_failure() {
        let store = Arc::new(CorruptStore {
            triggers: AtomicUsize::new(0),
        });
        let session = SyncSession::new(key(), Arc::clone(&store), options());

        assert_eq!(session.tick().await, TickOutcome::Failed);
        assert_eq!(session.tick().await, TickOutcome::Failed);

        assert_eq!(session.state(), SyncState::Polling);
        assert_eq!(session.stats().fetch_failures, 2);
        assert_eq!(store.triggers.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let store = Arc::new(GatedStore::new());
        let session = Arc::new(SyncSession::new(key(), Arc::clone(&store), options()));

        let ticking = Arc::clone(&session);
        let handle = tokio::spawn(async move { ticking.tick().await });
        wait_for_fetch(&store).await;

        assert_eq!(session.tick().await, TickOutcome::Skipped);
        assert_eq!(session.stats().skipped_ticks, 1);

        store.release.notify_one();
        handle.await.unwrap();
        assert_eq!(store.fetches_started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tick_after_dispose_sends_nothing() {
        let store = Arc::new(MemoryInsightStore::new());
        let session = session(&store);
        session.dispose();

        assert_eq!(session.tick().await, TickOutcome::Disposed);
        assert_eq!(store.fetch_count(&key()), 0);
        assert!(session.start().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_counts_as_failure() {
        let store = Arc::new(GatedStore::new());
        let session = SyncSession::new(
            key(),
            Arc::clone(&store),
            SyncOptions {
                poll_interval: Duration::from_millis(5000),
                request_timeout: Duration::from_millis(50),
            },
        );

        assert_eq!(session.tick().await, TickOutcome::Failed);
        assert_eq!(session.stats().fetch_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_keeps_polling_after_ready() {
        let store = Arc::new(MemoryInsightStore::new());
        store.set_standing(&key(), InsightEnvelope::ready(json!({"score": 90})));
        let session = session(&store);

        session.start().unwrap();
        tokio::time::sleep(Duration::from_millis(15_100)).await;

        assert!(store.fetch_count(&key()) >= 3);
        assert!(session.state().payload().is_some());

        session.dispose();
        let after_dispose = store.fetch_count(&key());
        tokio::time::sleep(Duration::from_millis(20_000)).await;
        assert_eq!(store.fetch_count(&key()), after_dispose);
    }

    #[tokio::test]
    async fn test_drop_disposes() {
        let store = Arc::new(MemoryInsightStore::new());
        let session = session(&store);
        let receiver = session.subscribe();
        session.start().unwrap();

        drop(session);

        assert_eq!(*receiver.borrow(), SyncState::Disposed);
    }

    #[tokio::test]
    async fn test_subscribers_see_published_states() {
        let store = Arc::new(MemoryInsightStore::new());
        store.set_standing(&key(), InsightEnvelope::pending(4));
        let session = session(&store);
        let mut receiver = session.subscribe();

        session.tick().await;

        assert!(receiver.has_changed().unwrap());
        assert_eq!(
            *receiver.borrow_and_update(),
            SyncState::AwaitingCompute { queue_depth: 4 }
        );
    }

    #[test]
    fn test_start_without_runtime_is_error() {
        let store = Arc::new(MemoryInsightStore::new());
        let session = session(&store);
        assert!(session.start().is_err());
    }

    #[test]
    fn test_describe_queue_depth() {
        assert_eq!(
            SyncState::AwaitingCompute { queue_depth: 3 }.describe(),
            "computing (3 jobs ahead)"
        );
        assert_eq!(
            SyncState::AwaitingCompute { queue_depth: 1 }.describe(),
            "computing (1 job ahead)"
        );
    }

    #[test]
    fn test_options_from_config() {
        let options = SyncOptions::from(&SyncConfig::default());
        assert_eq!(options.poll_interval, Duration::from_secs(5));
        assert_eq!(options.request_timeout, Duration::from_secs(10));
    }
}
