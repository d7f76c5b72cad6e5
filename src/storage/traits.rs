//! Key-value storage traits for Foundry.
//!
//! [`KvStore`] is the object-safe raw contract (strings in, strings out).
//! [`KvStoreExt`] layers the typed JSON API on top: `get` never fails and
//! falls back to the caller's value on a missing key or malformed content.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Raw key-value storage backend.
pub trait KvStore: Send + Sync {
    /// Read the raw JSON text stored under `key`.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    fn get_raw(&self, key: &str) -> Result<Option<String>>;

    /// Store raw JSON text under `key`, replacing any previous value.
    fn set_raw(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key.
    ///
    /// Returns `Ok(())` even if the key doesn't exist.
    fn remove(&self, key: &str) -> Result<()>;

    /// List stored keys in lexical order.
    fn keys(&self) -> Result<Vec<String>>;

    /// Check if a key exists.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get_raw(key)?.is_some())
    }
}

/// Blanket implementation of KvStore for Arc-wrapped stores.
impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        (**self).get_raw(key)
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_raw(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

/// Typed JSON access over any [`KvStore`].
pub trait KvStoreExt: KvStore {
    /// Read and decode the value under `key`.
    ///
    /// Never fails: a missing key, an unreadable store or content that does
    /// not decode as `T` all yield `fallback`.
    fn get<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let raw = match self.get_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return fallback,
            Err(e) => {
                tracing::warn!(key, error = %e, "kv read failed (fail-open: using fallback)");
                return fallback;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "kv value malformed (fail-open: using fallback)");
                fallback
            }
        }
    }

    /// Encode and store a value.
    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set_raw(key, &raw)
    }

    /// Store a value if there is one; `None` leaves the key untouched.
    fn set_if_present<T: Serialize>(&self, key: &str, value: Option<&T>) -> Result<()> {
        match value {
            Some(value) => self.set(key, value),
            None => Ok(()),
        }
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}
