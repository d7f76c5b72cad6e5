//! Server-computed insights.
//!
//! Insights (dashboards, founder alignment, idea analysis, investor readiness)
//! are computed asynchronously by a backend job system. This module defines
//! the store contract, two implementations of it, and the sync engine that
//! keeps a mounted screen up to date.

pub mod file;
pub mod memory;
pub mod store;
pub mod sync;
pub mod types;

pub use file::{FileInsightStore, TriggerRecord};
pub use memory::MemoryInsightStore;
pub use store::InsightStore;
pub use sync::{SyncOptions, SyncSession, SyncState, SyncStats, TickOutcome};
pub use types::{InsightEnvelope, InsightKind, InsightSubjectKey};
