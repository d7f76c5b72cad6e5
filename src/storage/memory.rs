//! In-memory key-value storage.
//!
//! Thread-safe implementation of [`KvStore`] used in tests and as the
//! fallback when no home directory is available.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::Result;
use crate::storage::KvStore;

/// In-memory key-value store.
///
/// Values are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKvStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Remove every key.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

impl KvStore for MemoryKvStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().unwrap();
        Ok(entries.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().unwrap().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::tests::test_kv_store_contract;
    use crate::storage::KvStoreExt;

    #[test]
    fn test_memory_store_contract() {
        let store = MemoryKvStore::new();
        test_kv_store_contract(&store);
    }

    #[test]
    fn test_len_and_clear() {
        let store = MemoryKvStore::new();
        assert!(store.is_empty());

        store.set("a", &1).unwrap();
        store.set("b", &2).unwrap();
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_overwrites() {
        let store = MemoryKvStore::new();
        store.set("step", &1).unwrap();
        store.set("step", &4).unwrap();
        assert_eq!(store.get("step", 0), 4);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemoryKvStore::new());
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.set(&format!("k{}", i), &i).unwrap();
                    assert_eq!(store.get(&format!("k{}", i), -1), i);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 10);
    }

    mod proptests {
        use super::*;
        use crate::storage::traits::tests::assert_json_roundtrip;
        use proptest::prelude::*;
        use serde_json::Value;

        fn arb_json() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::from),
                any::<i64>().prop_map(Value::from),
                any::<u64>().prop_map(Value::from),
                any::<f64>()
                    .prop_filter("JSON has no NaN or infinity", |f| f.is_finite())
                    .prop_map(Value::from),
                ".*".prop_map(Value::from),
            ];
            leaf.prop_recursive(3, 32, 4, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                    prop::collection::btree_map(".*", inner, 0..4)
                        .prop_map(|map| Value::Object(map.into_iter().collect())),
                ]
            })
        }

        proptest! {
            #[test]
            fn prop_roundtrip_strings_and_numbers(
                key in "[a-z][a-z0-9_.]{0,16}",
                text in ".*",
                number in any::<i64>(),
            ) {
                let store = MemoryKvStore::new();
                store.set(&key, &(text.clone(), number)).unwrap();
                let got: (String, i64) = store.get(&key, (String::new(), 0));
                prop_assert_eq!(got, (text, number));
            }

            #[test]
            fn prop_roundtrip_json_values(
                key in "[a-z][a-z0-9_.]{0,16}",
                value in arb_json(),
            ) {
                let store = MemoryKvStore::new();
                assert_json_roundtrip(&store, &key, &value);
                store.remove(&key).unwrap();
                test_kv_store_contract(&store);
            }

            #[test]
            fn prop_roundtrip_floats_bit_exact(
                number in any::<f64>().prop_filter("finite", |f| f.is_finite()),
            ) {
                let store = MemoryKvStore::new();
                store.set("ratio", &number).unwrap();
                let got: f64 = store.get("ratio", f64::NAN);
                prop_assert_eq!(got.to_bits(), number.to_bits());
            }
        }
    }
}
