//! Unified error types for Foundry with fail-open handling.
//!
//! Nothing in Foundry is fatal. Storage and network failures are logged and
//! replaced by a safe value (the last known state, a caller fallback, or
//! "still loading"), so the errors here mostly travel as far as the component
//! that decides what to keep displaying.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Foundry operations.
#[derive(Error, Debug)]
pub enum FoundryError {
    /// I/O errors from file-backed stores.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML parsing/serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// State machine violations (invalid transitions or rule definitions).
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// Reading an insight or a progression failed.
    #[error("fetch failed: {message}")]
    Fetch { message: String },

    /// Asking the backend to enqueue a computation failed.
    #[error("compute trigger failed: {message}")]
    Trigger { message: String },

    /// A collaborator call did not finish within its deadline.
    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    /// A raw screen id that is not part of the screen enumeration.
    #[error("unknown screen: {screen_id}")]
    UnknownScreen { screen_id: String },

    /// Workspace not found in storage.
    #[error("workspace not found: {workspace_id}")]
    WorkspaceNotFound { workspace_id: String },
}

/// A specialized Result type for Foundry operations.
pub type Result<T> = std::result::Result<T, FoundryError>;

impl FoundryError {
    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a fetch error.
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }

    /// Create a compute trigger error.
    pub fn trigger(message: impl Into<String>) -> Self {
        Self::Trigger {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, millis: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            millis,
        }
    }

    /// Create an unknown screen error.
    pub fn unknown_screen(screen_id: impl Into<String>) -> Self {
        Self::UnknownScreen {
            screen_id: screen_id.into(),
        }
    }

    /// Create a workspace not found error.
    pub fn workspace_not_found(workspace_id: impl Into<String>) -> Self {
        Self::WorkspaceNotFound {
            workspace_id: workspace_id.into(),
        }
    }

    /// Whether the failure is transient and the operation should simply be
    /// retried on the next scheduled tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Trigger { .. } | Self::Timeout { .. } | Self::Storage { .. }
        )
    }
}

impl From<io::Error> for FoundryError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for FoundryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Trait for fail-open error handling.
///
/// Log the error and carry on with a safe value instead of propagating.
pub trait FailOpen<T> {
    /// Handle an error by logging a warning and returning the default value.
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default;

    /// Handle an error by logging a warning and returning the provided fallback.
    fn fail_open_with(self, context: &str, fallback: T) -> T;
}

impl<T> FailOpen<T> for Result<T> {
    fn fail_open_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using default)", context, err);
                T::default()
            }
        }
    }

    fn fail_open_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (fail-open: using fallback)", context, err);
                fallback
            }
        }
    }
}

/// Exit codes for the Foundry CLI.
pub mod exit_codes {
    /// Command completed.
    pub const OK: i32 = 0;

    /// Command failed (bad input, storage failure).
    pub const ERROR: i32 = 1;

    /// Navigation target was locked for the current progression.
    pub const DENIED: i32 = 2;

    /// The process panicked.
    pub const CRASH: i32 = 3;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = FoundryError::storage(
            "/tmp/kv/answer.json",
            io::Error::new(io::ErrorKind::NotFound, "file not found"),
        );
        assert!(err.to_string().contains("storage error"));
        assert!(err.to_string().contains("/tmp/kv/answer.json"));
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FoundryError::fetch("connection reset");
        assert_eq!(err.to_string(), "fetch failed: connection reset");
    }

    #[test]
    fn test_trigger_error_display() {
        let err = FoundryError::trigger("503");
        assert_eq!(err.to_string(), "compute trigger failed: 503");
    }

    #[test]
    fn test_timeout_error_display() {
        let err = FoundryError::timeout("fetch_insight", 250);
        assert_eq!(err.to_string(), "fetch_insight timed out after 250ms");
    }

    #[test]
    fn test_unknown_screen_display() {
        let err = FoundryError::unknown_screen("secret_lab");
        assert_eq!(err.to_string(), "unknown screen: secret_lab");
    }

    #[test]
    fn test_workspace_not_found_display() {
        let err = FoundryError::workspace_not_found("ws-1");
        assert_eq!(err.to_string(), "workspace not found: ws-1");
    }

    #[test]
    fn test_is_transient() {
        assert!(FoundryError::fetch("x").is_transient());
        assert!(FoundryError::trigger("x").is_transient());
        assert!(FoundryError::timeout("x", 1).is_transient());
        let disk = io::Error::other("disk full");
        assert!(FoundryError::storage("/tmp/kv", disk).is_transient());
        assert!(!FoundryError::serde("x").is_transient());
        assert!(!FoundryError::config("x").is_transient());
        assert!(!FoundryError::unknown_screen("x").is_transient());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: FoundryError = io_err.into();
        assert!(matches!(err, FoundryError::Storage { .. }));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: FoundryError = json_err.into();
        assert!(matches!(err, FoundryError::Serde { .. }));
    }

    #[test]
    fn test_fail_open_default() {
        let result: Result<Vec<String>> = Err(FoundryError::fetch("test"));
        let value = result.fail_open_default("test context");
        assert!(value.is_empty());
    }

    #[test]
    fn test_fail_open_with() {
        let result: Result<u32> = Err(FoundryError::fetch("test"));
        assert_eq!(result.fail_open_with("test context", 42), 42);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_codes::OK, 0);
        assert_eq!(exit_codes::ERROR, 1);
        assert_eq!(exit_codes::DENIED, 2);
        assert_eq!(exit_codes::CRASH, 3);
    }

    #[test]
    fn test_fail_open_success() {
        let result: Result<u32> = Ok(100);
        assert_eq!(result.fail_open_default("test context"), 100);
    }
}
