//! KV command for Foundry.
//!
//! Direct access to the key-value store: read, write, remove and list keys.

use serde::Serialize;
use serde_json::Value;

use crate::storage::{KvStore, KvStoreExt};

/// What to do with the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvAction {
    Get { key: String },
    /// `value` is JSON text; anything that doesn't parse is stored as a string.
    Set { key: String, value: String },
    Remove { key: String },
    List,
}

/// Options for the kv command.
#[derive(Debug, Clone, Default)]
pub struct KvOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the kv command.
#[derive(Debug, Clone, Serialize)]
pub struct KvOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KvOutput {
    fn with_key(key: &str) -> Self {
        Self {
            success: true,
            key: Some(key.to_string()),
            value: None,
            keys: Vec::new(),
            error: None,
        }
    }

    fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// The kv command implementation.
pub struct KvCommand<K: KvStore> {
    store: K,
}

impl<K: KvStore> KvCommand<K> {
    pub fn new(store: K) -> Self {
        Self { store }
    }

    pub fn run(&self, action: &KvAction) -> KvOutput {
        match action {
            KvAction::Get { key } => {
                let mut output = KvOutput::with_key(key);
                output.value = self.store.get::<Option<Value>>(key, None);
                if output.value.is_none() {
                    output = output.failed(format!("no value for '{}'", key));
                }
                output
            }
            KvAction::Set { key, value } => {
                let parsed = serde_json::from_str::<Value>(value)
                    .unwrap_or_else(|_| Value::String(value.clone()));
                let mut output = KvOutput::with_key(key);
                match self.store.set(key, &parsed) {
                    Ok(()) => output.value = Some(parsed),
                    Err(e) => output = output.failed(e.to_string()),
                }
                output
            }
            KvAction::Remove { key } => match self.store.remove(key) {
                Ok(()) => KvOutput::with_key(key),
                Err(e) => KvOutput::with_key(key).failed(e.to_string()),
            },
            KvAction::List => {
                let mut output = KvOutput {
                    success: true,
                    key: None,
                    value: None,
                    keys: Vec::new(),
                    error: None,
                };
                match self.store.keys() {
                    Ok(keys) => output.keys = keys,
                    Err(e) => output = output.failed(e.to_string()),
                }
                output
            }
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &KvOutput, options: &KvOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        if let Some(error) = &output.error {
            return format!("Error: {}\n", error);
        }
        if let Some(value) = &output.value {
            return format!(
                "{}\n",
                serde_json::to_string_pretty(value).unwrap_or_default()
            );
        }
        if output.key.is_some() {
            return String::new();
        }
        output.keys.iter().map(|k| format!("{}\n", k)).collect()
    }
}
