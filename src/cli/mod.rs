//! CLI commands for Foundry.
//!
//! This module provides CLI commands for Foundry, organized into:
//! - **Access commands**: access, navigate, watch (gate and insight sessions)
//! - **Data commands**: workspace, kv, insight (stores)
//! - **Utility commands**: init

// Access commands
pub mod access;
pub mod navigate;
pub mod watch;

// Data commands
pub mod insight_cmd;
pub mod kv;
pub mod workspace_cmd;

// Utility commands
pub mod init;

pub use access::AccessCommand;
pub use init::InitCommand;
pub use insight_cmd::InsightCommand;
pub use kv::KvCommand;
pub use navigate::NavigateCommand;
pub use watch::WatchCommand;
pub use workspace_cmd::WorkspaceCommand;
