//! Foundry - access gating and insight sync for founder workspaces
//!
//! Foundry decides which screens of a founder workspace are reachable from
//! the workspace's onboarding progression, and keeps server-computed insights
//! (dashboards, founder alignment, idea analysis, investor readiness) in step
//! with the backend jobs that compute them.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod insight;
pub mod shell;
pub mod storage;
pub mod workspace;

pub use config::Config;
pub use core::{
    classify, AccessPolicy, AccessRule, AccessTier, EventBus, NavigationEvent, NavigationGate,
    NavigationOutcome, NavigationState, ProgressionEvent, RuleTarget, ScreenDescriptor,
    ScreenGroup, ScreenId, Stage, Subscription, WorkspaceProgression,
};
pub use error::{FailOpen, FoundryError, Result};
pub use insight::{
    FileInsightStore, InsightEnvelope, InsightKind, InsightStore, InsightSubjectKey,
    MemoryInsightStore, SyncOptions, SyncSession, SyncState, SyncStats,
};
pub use shell::Shell;
pub use storage::{FileKvStore, KvStore, KvStoreExt, MemoryKvStore};
pub use workspace::{KvWorkspaceStore, ProgressPoller, WorkspaceStore};

// CLI commands
pub use cli::{
    AccessCommand, InitCommand, InsightCommand, KvCommand, NavigateCommand, WatchCommand,
    WorkspaceCommand,
};
