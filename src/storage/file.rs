//! File-based key-value storage for Foundry.
//!
//! Each key is stored as a JSON file in `~/.foundry/kv/`.
//! Atomic writes are achieved via temp file + rename pattern.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::kv_dir;
use crate::error::{FoundryError, Result};
use crate::storage::KvStore;

/// File-based key-value storage.
///
/// Keys map to `<dir>/<key>.json`. Keys are restricted to a conservative
/// character set so they can never escape the directory.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    /// Directory where value files are stored.
    dir: PathBuf,
}

impl FileKvStore {
    /// Create a new file store with the default directory.
    ///
    /// Uses `~/.foundry/kv/` or `$FOUNDRY_HOME/kv/`.
    pub fn new() -> Result<Self> {
        let dir = kv_dir().ok_or_else(|| {
            FoundryError::config("Could not determine kv directory (no home directory)")
        })?;
        Self::with_dir(dir)
    }

    /// Create a new file store with a custom directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| FoundryError::storage(&dir, e))?;
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn value_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{}.json.tmp", key))
    }
}

impl KvStore for FileKvStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let path = self.value_path(key)?;

        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FoundryError::storage(&path, e)),
        }
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let final_path = self.value_path(key)?;
        let temp_path = self.temp_path(key);

        {
            let mut file =
                fs::File::create(&temp_path).map_err(|e| FoundryError::storage(&temp_path, e))?;
            file.write_all(value.as_bytes())
                .map_err(|e| FoundryError::storage(&temp_path, e))?;
            file.sync_all()
                .map_err(|e| FoundryError::storage(&temp_path, e))?;
        }

        // Atomic on POSIX
        fs::rename(&temp_path, &final_path).map_err(|e| FoundryError::storage(&final_path, e))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.value_path(key)?;

        if path.exists() {
            fs::remove_file(&path).map_err(|e| FoundryError::storage(&path, e))?;
        }

        let temp_path = self.temp_path(key);
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }

        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| FoundryError::storage(&self.dir, e))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FoundryError::storage(&self.dir, e))?;
            let path = entry.path();

            // Skip non-JSON files and temp files
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }
            keys.push(stem);
        }

        keys.sort();
        Ok(keys)
    }
}

/// Keys become file names.
fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(FoundryError::invalid_state(format!(
            "invalid storage key '{}'",
            key
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::tests::test_kv_store_contract;
    use crate::storage::KvStoreExt;
    use tempfile::TempDir;

    fn create_test_store() -> (FileKvStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileKvStore::with_dir(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn test_file_kv_store_contract() {
        let (store, _dir) = create_test_store();
        test_kv_store_contract(&store);
    }

    #[test]
    fn test_with_dir_creates_directory() {
        let dir = TempDir::new().unwrap();
        let kv_path = dir.path().join("kv");

        assert!(!kv_path.exists());

        let _store = FileKvStore::with_dir(&kv_path).unwrap();

        assert!(kv_path.exists());
    }

    #[test]
    fn test_value_file_layout() {
        let (store, dir) = create_test_store();
        store.set("workspace.ws-1.progression", &3).unwrap();

        let path = dir.path().join("workspace.ws-1.progression.json");
        assert!(path.exists());
        assert_eq!(fs::read_to_string(path).unwrap(), "3");
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let (store, dir) = create_test_store();
        store.set("k", &"v").unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_keys_skip_foreign_files() {
        let (store, dir) = create_test_store();
        store.set("a", &1).unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join(".b.json.tmp"), "{}").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_persistence_across_instances() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileKvStore::with_dir(dir.path()).unwrap();
            store.set("stage", &"validation").unwrap();
        }
        let store = FileKvStore::with_dir(dir.path()).unwrap();
        assert_eq!(store.get("stage", String::new()), "validation");
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let (store, _dir) = create_test_store();
        for key in ["", "../escape", ".hidden", "a/b", "sp ace"] {
            assert!(store.set_raw(key, "1").is_err(), "key {:?}", key);
            assert!(store.get_raw(key).is_err(), "key {:?}", key);
        }
    }

    #[test]
    fn test_get_with_invalid_key_falls_back() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.get("../escape", 5), 5);
    }
}
