//! Workspace progression storage and polling.

pub mod poller;
pub mod store;

pub use poller::{PollOutcome, ProgressPoller};
pub use store::{progression_key, KvWorkspaceStore, WorkspaceStore};
