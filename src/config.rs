//! Configuration loading for Foundry.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.foundry/config.toml`)
//! 3. User config (`~/.foundry/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. The system runs with sensible defaults
//! when no config exists.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FailOpen, FoundryError, Result};

/// Main configuration struct for Foundry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Insight sync cadence and timeouts.
    pub sync: SyncConfig,
    /// Workspace progress polling.
    pub progress: ProgressConfig,
    /// Per-screen access table overrides.
    pub access: AccessConfig,
    /// Workspace selection.
    pub workspace: WorkspaceConfig,
}

/// Smallest accepted interval or timeout, in milliseconds.
pub const MIN_INTERVAL_MS: u64 = 100;

/// Insight sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Delay between insight polls.
    pub poll_interval_ms: u64,
    /// Upper bound on each fetch or trigger call.
    pub request_timeout_ms: u64,
}

impl SyncConfig {
    pub fn is_valid_interval(value: u64) -> bool {
        value >= MIN_INTERVAL_MS
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            request_timeout_ms: 10_000,
        }
    }
}

/// Workspace progress polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProgressConfig {
    pub poll_interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

/// Access table overrides, keyed by screen id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccessConfig {
    pub overrides: HashMap<String, AccessOverride>,
}

/// Replacement rule for one screen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_from: Option<u32>,
    pub accessible_from: u32,
}

/// Workspace selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Workspace used when a command doesn't name one.
    pub default_workspace: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            default_workspace: "default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with full precedence chain.
    ///
    /// Precedence (highest to lowest):
    /// 1. Environment variables
    /// 2. Project config (`.foundry/config.toml` at the project root)
    /// 3. User config (`~/.foundry/config.toml`)
    /// 4. Defaults
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Load user config from `~/.foundry/config.toml`.
    fn load_user_config() -> Option<Config> {
        let home = foundry_home()?;
        let config_path = home.join("config.toml");
        Self::load_optional(&config_path)
    }

    /// Load project config from `.foundry/config.toml`.
    fn load_project_config(cwd: &Path) -> Option<Config> {
        let config_path = project_foundry_dir(cwd).join("config.toml");
        Self::load_optional(&config_path)
    }

    /// A missing file is silent; an unreadable or malformed one is logged.
    fn load_optional(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        match Self::load_from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring config file");
                None
            }
        }
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| FoundryError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| FoundryError::config(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Some(ms) = env_interval("FOUNDRY_POLL_INTERVAL_MS", self.sync.poll_interval_ms) {
            self.sync.poll_interval_ms = ms;
        }
        if let Some(ms) = env_interval("FOUNDRY_REQUEST_TIMEOUT_MS", self.sync.request_timeout_ms)
        {
            self.sync.request_timeout_ms = ms;
        }
        if let Some(ms) =
            env_interval("FOUNDRY_PROGRESS_INTERVAL_MS", self.progress.poll_interval_ms)
        {
            self.progress.poll_interval_ms = ms;
        }
        if let Ok(val) = env::var("FOUNDRY_WORKSPACE") {
            if val.trim().is_empty() {
                tracing::warn!(
                    "FOUNDRY_WORKSPACE is empty, keeping '{}'",
                    self.workspace.default_workspace
                );
            } else {
                self.workspace.default_workspace = val;
            }
        }
    }

    /// Merge another config into this one.
    ///
    /// The `other` config takes precedence field by field: every value in
    /// `other` that differs from the default replaces the value in `self`.
    /// Access overrides merge additively per screen.
    ///
    /// # Limitation
    ///
    /// A layer cannot set a value back to its default to undo a non-default
    /// value from a lower layer, since "unset" and "explicitly default" look
    /// the same after deserialization.
    fn merge(mut self, other: Config) -> Self {
        let default_sync = SyncConfig::default();
        if other.sync.poll_interval_ms != default_sync.poll_interval_ms {
            self.sync.poll_interval_ms = other.sync.poll_interval_ms;
        }
        if other.sync.request_timeout_ms != default_sync.request_timeout_ms {
            self.sync.request_timeout_ms = other.sync.request_timeout_ms;
        }

        if other.progress.poll_interval_ms != ProgressConfig::default().poll_interval_ms {
            self.progress.poll_interval_ms = other.progress.poll_interval_ms;
        }

        for (screen, rule) in other.access.overrides {
            self.access.overrides.insert(screen, rule);
        }

        if other.workspace.default_workspace != WorkspaceConfig::default().default_workspace {
            self.workspace.default_workspace = other.workspace.default_workspace;
        }

        self
    }

    /// Clamp intervals that came from files to the accepted minimum.
    ///
    /// Env values are validated as they are read; file values only here.
    pub fn validated(mut self) -> Self {
        for (name, value) in [
            ("sync.poll_interval_ms", &mut self.sync.poll_interval_ms),
            ("sync.request_timeout_ms", &mut self.sync.request_timeout_ms),
            ("progress.poll_interval_ms", &mut self.progress.poll_interval_ms),
        ] {
            if !SyncConfig::is_valid_interval(*value) {
                tracing::warn!(
                    field = name,
                    value = *value,
                    minimum = MIN_INTERVAL_MS,
                    "interval below minimum, clamping"
                );
                *value = MIN_INTERVAL_MS;
            }
        }
        self
    }

    /// Load config with fail-open behavior.
    ///
    /// If loading fails for any reason, returns defaults.
    pub fn load_fail_open() -> Self {
        let result: Result<Self> = Ok(Self::load().validated());
        result.fail_open_default("loading config")
    }

    /// Save configuration to the project config file.
    ///
    /// Writes `.foundry/config.toml` under `cwd`, creating the directory if
    /// needed. Uses atomic write (write to temp file, then rename).
    pub fn save_project(&self, cwd: &Path) -> Result<()> {
        let foundry_dir = cwd.join(".foundry");

        if !foundry_dir.exists() {
            fs::create_dir_all(&foundry_dir).map_err(|e| FoundryError::storage(&foundry_dir, e))?;
        }

        let config_path = foundry_dir.join("config.toml");

        let content =
            toml::to_string_pretty(self).map_err(|e| FoundryError::config(e.to_string()))?;

        let temp_path = foundry_dir.join(".config.toml.tmp");
        fs::write(&temp_path, &content).map_err(|e| FoundryError::storage(&temp_path, e))?;

        let file = fs::File::open(&temp_path).map_err(|e| FoundryError::storage(&temp_path, e))?;
        file.sync_all()
            .map_err(|e| FoundryError::storage(&temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &config_path)
            .map_err(|e| FoundryError::storage(&config_path, e))?;

        Ok(())
    }
}

/// Read a millisecond interval from the environment.
///
/// Returns `None` when the variable is unset or invalid; invalid values are
/// logged and the current value is kept.
fn env_interval(var: &str, current: u64) -> Option<u64> {
    let val = env::var(var).ok()?;
    match val.trim().parse::<u64>() {
        Ok(ms) if SyncConfig::is_valid_interval(ms) => Some(ms),
        Ok(ms) => {
            tracing::warn!(
                "Invalid {} value '{}'. Must be >= {}. Keeping '{}'.",
                var,
                ms,
                MIN_INTERVAL_MS,
                current
            );
            None
        }
        Err(_) => {
            tracing::warn!(
                "Invalid {} value '{}'. Expected milliseconds. Keeping '{}'.",
                var,
                val,
                current
            );
            None
        }
    }
}

/// Get the Foundry home directory.
///
/// Returns `$FOUNDRY_HOME` if set, otherwise `~/.foundry`.
///
/// # Validation
///
/// If `FOUNDRY_HOME` is set, it must be non-empty. Relative paths are
/// canonicalized when they exist. Invalid values are ignored and we fall
/// back to the default.
pub fn foundry_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("FOUNDRY_HOME") {
        if home.is_empty() {
            tracing::warn!("FOUNDRY_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("FOUNDRY_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".foundry"));
    }

    // Containerized/minimal environments without HOME
    let fallback_path = fallback_foundry_home();
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback_path.display()
    );
    Some(fallback_path)
}

#[cfg(unix)]
fn fallback_foundry_home() -> PathBuf {
    use std::os::unix::fs::MetadataExt;
    let uid = std::fs::metadata("/").map(|m| m.uid()).unwrap_or(0);
    PathBuf::from(format!("/tmp/foundry-{}", uid))
}

#[cfg(not(unix))]
fn fallback_foundry_home() -> PathBuf {
    std::env::temp_dir().join("foundry")
}

/// Find the project root for a given working directory.
///
/// Walks up from `cwd` looking for an existing `.foundry/` directory; the
/// first ancestor holding one is the root. Otherwise `cwd` itself is used.
pub fn find_project_root(cwd: &Path) -> PathBuf {
    cwd.ancestors()
        .find(|ancestor| ancestor.join(".foundry").is_dir())
        .unwrap_or(cwd)
        .to_path_buf()
}

/// Get the key-value store directory.
///
/// Returns `<foundry_home>/kv/`.
pub fn kv_dir() -> Option<PathBuf> {
    foundry_home().map(|h| h.join("kv"))
}

/// Get the insight envelope directory.
///
/// Returns `<foundry_home>/insights/`.
pub fn insights_dir() -> Option<PathBuf> {
    foundry_home().map(|h| h.join("insights"))
}

/// Get the project `.foundry/` directory for a working directory.
pub fn project_foundry_dir(cwd: &Path) -> PathBuf {
    find_project_root(cwd).join(".foundry")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn clear_env() {
        for var in [
            "FOUNDRY_POLL_INTERVAL_MS",
            "FOUNDRY_REQUEST_TIMEOUT_MS",
            "FOUNDRY_PROGRESS_INTERVAL_MS",
            "FOUNDRY_WORKSPACE",
        ] {
            env::remove_var(var);
        }
    }

    /// Point FOUNDRY_HOME at an empty dir so the real user config can't leak in.
    fn isolated_home() -> TempDir {
        let home = TempDir::new().unwrap();
        env::set_var("FOUNDRY_HOME", home.path());
        home
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.sync.poll_interval_ms, 5000);
        assert_eq!(config.sync.request_timeout_ms, 10_000);
        assert_eq!(config.progress.poll_interval_ms, 1000);
        assert!(config.access.overrides.is_empty());
        assert_eq!(config.workspace.default_workspace, "default");
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");

        let toml_content = r#"
[sync]
poll_interval_ms = 2500

[access.overrides.dashboard]
partial_from = 0
accessible_from = 2
"#;
        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();

        assert_eq!(config.sync.poll_interval_ms, 2500);
        assert_eq!(
            config.access.overrides["dashboard"],
            AccessOverride {
                partial_from: Some(0),
                accessible_from: 2,
            }
        );

        // Other fields should be defaults
        assert_eq!(config.sync.request_timeout_ms, 10_000);
        assert_eq!(config.progress.poll_interval_ms, 1000);
    }

    #[test]
    fn test_load_from_file_missing() {
        let result = Config::load_from_file(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");

        fs::write(&config_path, "this is not valid toml [[[").unwrap();

        let result = Config::load_from_file(&config_path);
        assert!(matches!(result, Err(FoundryError::Config { .. })));
    }

    #[test]
    #[serial]
    fn test_project_config_over_user_config() {
        clear_env();
        let home = isolated_home();
        fs::write(
            home.path().join("config.toml"),
            "[sync]\npoll_interval_ms = 3000\nrequest_timeout_ms = 4000\n",
        )
        .unwrap();

        let project = TempDir::new().unwrap();
        let foundry_dir = project.path().join(".foundry");
        fs::create_dir_all(&foundry_dir).unwrap();
        fs::write(
            foundry_dir.join("config.toml"),
            "[sync]\npoll_interval_ms = 700\n",
        )
        .unwrap();

        let config = Config::load_from_cwd(project.path());

        assert_eq!(config.sync.poll_interval_ms, 700);
        assert_eq!(config.sync.request_timeout_ms, 4000);

        env::remove_var("FOUNDRY_HOME");
    }

    #[test]
    #[serial]
    fn test_project_config_found_from_subdirectory() {
        clear_env();
        let _home = isolated_home();
        let project = TempDir::new().unwrap();
        let foundry_dir = project.path().join(".foundry");
        fs::create_dir_all(&foundry_dir).unwrap();
        fs::write(
            foundry_dir.join("config.toml"),
            "[workspace]\ndefault_workspace = \"acme\"\n",
        )
        .unwrap();
        let nested = project.path().join("docs").join("pitch");
        fs::create_dir_all(&nested).unwrap();

        let config = Config::load_from_cwd(&nested);
        assert_eq!(config.workspace.default_workspace, "acme");

        env::remove_var("FOUNDRY_HOME");
    }

    #[test]
    #[serial]
    fn test_env_var_precedence() {
        clear_env();
        let _home = isolated_home();
        let project = TempDir::new().unwrap();
        let foundry_dir = project.path().join(".foundry");
        fs::create_dir_all(&foundry_dir).unwrap();
        fs::write(
            foundry_dir.join("config.toml"),
            "[sync]\npoll_interval_ms = 700\n",
        )
        .unwrap();

        env::set_var("FOUNDRY_POLL_INTERVAL_MS", "900");
        env::set_var("FOUNDRY_REQUEST_TIMEOUT_MS", "1500");
        env::set_var("FOUNDRY_PROGRESS_INTERVAL_MS", "250");
        env::set_var("FOUNDRY_WORKSPACE", "ws-env");

        let config = Config::load_from_cwd(project.path());

        assert_eq!(config.sync.poll_interval_ms, 900);
        assert_eq!(config.sync.request_timeout_ms, 1500);
        assert_eq!(config.progress.poll_interval_ms, 250);
        assert_eq!(config.workspace.default_workspace, "ws-env");

        clear_env();
        env::remove_var("FOUNDRY_HOME");
    }

    #[test]
    #[serial]
    fn test_env_var_invalid_values_ignored() {
        clear_env();
        let _home = isolated_home();
        let project = TempDir::new().unwrap();

        env::set_var("FOUNDRY_POLL_INTERVAL_MS", "fast");
        env::set_var("FOUNDRY_REQUEST_TIMEOUT_MS", "5");
        env::set_var("FOUNDRY_WORKSPACE", "  ");

        let config = Config::load_from_cwd(project.path());

        assert_eq!(config.sync.poll_interval_ms, 5000);
        assert_eq!(config.sync.request_timeout_ms, 10_000);
        assert_eq!(config.workspace.default_workspace, "default");

        clear_env();
        env::remove_var("FOUNDRY_HOME");
    }

    #[test]
    fn test_merge_field_by_field() {
        let mut base = Config::default();
        base.sync.request_timeout_ms = 2000;
        base.access.overrides.insert(
            "dashboard".to_string(),
            AccessOverride {
                partial_from: None,
                accessible_from: 1,
            },
        );

        let mut other = Config::default();
        other.sync.poll_interval_ms = 800;
        other.access.overrides.insert(
            "team_members".to_string(),
            AccessOverride {
                partial_from: None,
                accessible_from: 3,
            },
        );

        let merged = base.merge(other);

        assert_eq!(merged.sync.poll_interval_ms, 800);
        assert_eq!(merged.sync.request_timeout_ms, 2000);
        assert_eq!(merged.access.overrides.len(), 2);
    }

    #[test]
    fn test_validated_clamps_small_intervals() {
        let mut config = Config::default();
        config.sync.poll_interval_ms = 10;
        config.progress.poll_interval_ms = 0;

        let config = config.validated();

        assert_eq!(config.sync.poll_interval_ms, MIN_INTERVAL_MS);
        assert_eq!(config.progress.poll_interval_ms, MIN_INTERVAL_MS);
        assert_eq!(config.sync.request_timeout_ms, 10_000);
    }

    #[test]
    #[serial]
    fn test_foundry_home_with_env() {
        let dir = TempDir::new().unwrap();
        env::set_var("FOUNDRY_HOME", dir.path().to_str().unwrap());

        let home = foundry_home().unwrap();
        assert_eq!(home, dir.path());

        env::remove_var("FOUNDRY_HOME");
    }

    #[test]
    #[serial]
    fn test_foundry_home_empty_env() {
        env::set_var("FOUNDRY_HOME", "");

        let home = foundry_home();
        assert!(home.is_some());
        assert!(home.unwrap().to_string_lossy().contains("foundry"));

        env::remove_var("FOUNDRY_HOME");
    }

    #[test]
    #[serial]
    fn test_data_dirs() {
        let dir = TempDir::new().unwrap();
        env::set_var("FOUNDRY_HOME", dir.path().to_str().unwrap());

        assert_eq!(kv_dir().unwrap(), dir.path().join("kv"));
        assert_eq!(insights_dir().unwrap(), dir.path().join("insights"));

        env::remove_var("FOUNDRY_HOME");
    }

    #[test]
    fn test_find_project_root_falls_back_to_cwd() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), nested);
    }

    #[test]
    fn test_find_project_root_in_parent() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".foundry")).unwrap();
        let nested = dir.path().join("src");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), dir.path());
        assert_eq!(project_foundry_dir(&nested), dir.path().join(".foundry"));
    }

    #[test]
    #[serial]
    fn test_load_fail_open() {
        clear_env();
        let _home = isolated_home();
        let config = Config::load_fail_open();
        assert_eq!(config.progress.poll_interval_ms, 1000);
        env::remove_var("FOUNDRY_HOME");
    }

    #[test]
    fn test_save_project_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.sync.poll_interval_ms = 1234;
        config.access.overrides.insert(
            "investor_readiness".to_string(),
            AccessOverride {
                partial_from: Some(4),
                accessible_from: 5,
            },
        );

        config.save_project(dir.path()).unwrap();

        let path = dir.path().join(".foundry").join("config.toml");
        assert!(path.exists());
        assert!(!dir.path().join(".foundry").join(".config.toml.tmp").exists());
        assert_eq!(Config::load_from_file(&path).unwrap(), config);
    }
}
