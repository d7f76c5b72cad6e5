//! In-memory insight store.
//!
//! Serves a standing envelope per subject, optionally preceded by a queue of
//! one-shot scripted responses. Records every fetch and trigger so tests can
//! assert on exactly what a sync session sent.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{FoundryError, Result};
use crate::insight::store::InsightStore;
use crate::insight::types::{InsightEnvelope, InsightSubjectKey};

#[derive(Debug, Clone)]
enum Scripted {
    Respond(InsightEnvelope),
    Fail(String),
}

#[derive(Debug, Default)]
struct Subject {
    standing: Option<InsightEnvelope>,
    scripted: VecDeque<Scripted>,
    fail_triggers: bool,
    fetches: usize,
    triggers: usize,
}

/// In-memory insight store.
#[derive(Debug, Default)]
pub struct MemoryInsightStore {
    subjects: Mutex<HashMap<InsightSubjectKey, Subject>>,
}

impl MemoryInsightStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_subject<R>(&self, key: &InsightSubjectKey, f: impl FnOnce(&mut Subject) -> R) -> R {
        let mut subjects = self
            .subjects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(subjects.entry(key.clone()).or_default())
    }

    /// Set the envelope returned once scripted responses run out.
    ///
    /// Without a standing envelope, a subject reports no payload and an
    /// empty queue.
    pub fn set_standing(&self, key: &InsightSubjectKey, envelope: InsightEnvelope) {
        self.with_subject(key, |s| s.standing = Some(envelope));
    }

    /// Queue a one-shot response.
    pub fn push_response(&self, key: &InsightSubjectKey, envelope: InsightEnvelope) {
        self.with_subject(key, |s| s.scripted.push_back(Scripted::Respond(envelope)));
    }

    /// Queue a one-shot fetch failure.
    pub fn push_failure(&self, key: &InsightSubjectKey, message: impl Into<String>) {
        let message = message.into();
        self.with_subject(key, |s| s.scripted.push_back(Scripted::Fail(message)));
    }

    /// Make compute triggers for a subject fail (they are still counted).
    pub fn fail_triggers(&self, key: &InsightSubjectKey, fail: bool) {
        self.with_subject(key, |s| s.fail_triggers = fail);
    }

    /// Number of fetches served for a subject.
    pub fn fetch_count(&self, key: &InsightSubjectKey) -> usize {
        self.with_subject(key, |s| s.fetches)
    }

    /// Number of compute triggers received for a subject.
    pub fn trigger_count(&self, key: &InsightSubjectKey) -> usize {
        self.with_subject(key, |s| s.triggers)
    }
}

#[async_trait]
impl InsightStore for MemoryInsightStore {
    async fn fetch_insight(&self, key: &InsightSubjectKey) -> Result<InsightEnvelope> {
        self.with_subject(key, |s| {
            s.fetches += 1;
            match s.scripted.pop_front() {
                Some(Scripted::Respond(envelope)) => Ok(envelope),
                Some(Scripted::Fail(message)) => Err(FoundryError::fetch(message)),
                None => Ok(s
                    .standing
                    .clone()
                    .unwrap_or_else(|| InsightEnvelope::pending(0))),
            }
        })
    }

    async fn trigger_compute(&self, key: &InsightSubjectKey) -> Result<()> {
        self.with_subject(key, |s| {
            s.triggers += 1;
            if s.fail_triggers {
                Err(FoundryError::trigger(format!("compute rejected for {}", key)))
            } else {
                Ok(())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::types::InsightKind;
    use serde_json::json;

    fn key() -> InsightSubjectKey {
        InsightSubjectKey::new("ws-1", InsightKind::Dashboard)
    }

    #[tokio::test]
    async fn test_unknown_subject_is_pending_with_empty_queue() {
        let store = MemoryInsightStore::new();
        let envelope = store.fetch_insight(&key()).await.unwrap();
        assert_eq!(envelope, InsightEnvelope::pending(0));
        assert_eq!(store.fetch_count(&key()), 1);
    }

    #[tokio::test]
    async fn test_scripted_responses_come_before_standing() {
        let store = MemoryInsightStore::new();
        store.set_standing(&key(), InsightEnvelope::ready(json!({"mrr": 10})));
        store.push_response(&key(), InsightEnvelope::pending(3));
        store.push_failure(&key(), "boom");

        assert_eq!(
            store.fetch_insight(&key()).await.unwrap(),
            InsightEnvelope::pending(3)
        );
        assert!(store.fetch_insight(&key()).await.is_err());
        assert!(store.fetch_insight(&key()).await.unwrap().is_ready());
        assert!(store.fetch_insight(&key()).await.unwrap().is_ready());
    }

    #[tokio::test]
    async fn test_triggers_are_counted_even_when_failing() {
        let store = MemoryInsightStore::new();
        store.trigger_compute(&key()).await.unwrap();
        store.fail_triggers(&key(), true);
        assert!(store.trigger_compute(&key()).await.is_err());
        assert_eq!(store.trigger_count(&key()), 2);
    }

    #[tokio::test]
    async fn test_subjects_are_independent() {
        let store = MemoryInsightStore::new();
        let other = InsightSubjectKey::new("ws-2", InsightKind::Dashboard);
        store.trigger_compute(&key()).await.unwrap();
        assert_eq!(store.trigger_count(&other), 0);
    }
}
