//! Insight store / compute API contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::insight::types::{InsightEnvelope, InsightSubjectKey};

/// Backend that serves computed insights and accepts compute requests.
///
/// The job system behind it is opaque: a trigger only asks for a computation
/// to be enqueued, and results show up in later fetches.
#[async_trait]
pub trait InsightStore: Send + Sync {
    /// Read the current insight and queue depth for a subject.
    ///
    /// Read-only and idempotent.
    async fn fetch_insight(&self, key: &InsightSubjectKey) -> Result<InsightEnvelope>;

    /// Ask the backend to enqueue a computation for a subject.
    ///
    /// Safe to call when a job is already queued; the backend tolerates
    /// duplicates even though the sync engine avoids sending them.
    async fn trigger_compute(&self, key: &InsightSubjectKey) -> Result<()>;
}

/// Blanket implementation so `Arc<T>` and `Arc<dyn InsightStore>` can be
/// handed to a sync session while the caller keeps a handle.
#[async_trait]
impl<T: InsightStore + ?Sized> InsightStore for Arc<T> {
    async fn fetch_insight(&self, key: &InsightSubjectKey) -> Result<InsightEnvelope> {
        (**self).fetch_insight(key).await
    }

    async fn trigger_compute(&self, key: &InsightSubjectKey) -> Result<()> {
        (**self).trigger_compute(key).await
    }
}
