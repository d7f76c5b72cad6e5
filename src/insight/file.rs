//! File-backed insight store.
//!
//! Envelopes live at `<dir>/<kind>/<subject>.json`; a missing file means no
//! payload and an empty queue. Compute triggers are appended as JSON lines to
//! `<dir>/triggers.jsonl`, where an external worker can pick them up.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::insights_dir;
use crate::error::{FoundryError, Result};
use crate::insight::store::InsightStore;
use crate::insight::types::{InsightEnvelope, InsightKind, InsightSubjectKey};

/// One line of the trigger log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub ts: DateTime<Utc>,
    pub kind: InsightKind,
    pub subject_id: String,
}

/// File-backed insight store.
#[derive(Debug, Clone)]
pub struct FileInsightStore {
    dir: PathBuf,
}

impl FileInsightStore {
    /// Store rooted at `<foundry_home>/insights/`.
    pub fn new() -> Result<Self> {
        let dir = insights_dir().ok_or_else(|| {
            FoundryError::config("Could not determine insights directory (no home directory)")
        })?;
        Ok(Self::with_dir(dir))
    }

    /// Store rooted at a custom directory. Directories are created lazily.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the trigger log.
    pub fn trigger_log_path(&self) -> PathBuf {
        self.dir.join("triggers.jsonl")
    }

    fn envelope_path(&self, key: &InsightSubjectKey) -> Result<PathBuf> {
        validate_subject_id(&key.subject_id)?;
        Ok(self
            .dir
            .join(key.kind.as_str())
            .join(format!("{}.json", key.subject_id)))
    }

    /// Write an envelope for a subject (temp file + rename).
    ///
    /// This is the backend side of the contract; the CLI uses it to publish
    /// results by hand.
    pub async fn write_envelope(
        &self,
        key: &InsightSubjectKey,
        envelope: &InsightEnvelope,
    ) -> Result<()> {
        let path = self.envelope_path(key)?;
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.dir.clone());
        fs::create_dir_all(&parent)
            .await
            .map_err(|e| FoundryError::storage(&parent, e))?;

        let json = serde_json::to_string_pretty(envelope)?;
        let temp_path = parent.join(format!(".{}.json.tmp", key.subject_id));
        fs::write(&temp_path, json.as_bytes())
            .await
            .map_err(|e| FoundryError::storage(&temp_path, e))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| FoundryError::storage(&path, e))?;
        Ok(())
    }

    /// Read back every trigger record, skipping malformed lines.
    pub async fn read_triggers(&self) -> Result<Vec<TriggerRecord>> {
        let path = self.trigger_log_path();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FoundryError::storage(&path, e)),
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed trigger record");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl InsightStore for FileInsightStore {
    async fn fetch_insight(&self, key: &InsightSubjectKey) -> Result<InsightEnvelope> {
        let path = self.envelope_path(key)?;
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(InsightEnvelope::pending(0));
            }
            Err(e) => {
                return Err(FoundryError::fetch(format!(
                    "reading {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            FoundryError::fetch(format!("malformed envelope {}: {}", path.display(), e))
        })
    }

    async fn trigger_compute(&self, key: &InsightSubjectKey) -> Result<()> {
        validate_subject_id(&key.subject_id)?;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| FoundryError::trigger(format!("{}: {}", self.dir.display(), e)))?;

        let record = TriggerRecord {
            ts: Utc::now(),
            kind: key.kind,
            subject_id: key.subject_id.clone(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let path = self.trigger_log_path();
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| FoundryError::trigger(format!("{}: {}", path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| FoundryError::trigger(format!("{}: {}", path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| FoundryError::trigger(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(subject = %key, "compute trigger recorded");
        Ok(())
    }
}

/// Subject ids become file names; only a conservative character set is
/// allowed.
fn validate_subject_id(subject_id: &str) -> Result<()> {
    let valid = !subject_id.is_empty()
        && !subject_id.starts_with('.')
        && subject_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(FoundryError::invalid_state(format!(
            "invalid subject id '{}'",
            subject_id
        )))
    }
}
