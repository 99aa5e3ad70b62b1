//! durable per-browser key/value storage
//!
//! plain strings, no expiry, no encryption. the browser host backs this with
//! `window.localStorage`.

use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

/// connected account address
pub const KEY_PUBLIC_KEY: &str = "publicKey";
/// signature of the last confirmed transfer
pub const KEY_SIGNATURE: &str = "signature";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable")]
    Unavailable,
    #[error("write failed: {0}")]
    Write(String),
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// in-memory store
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let store = Self::new();
        {
            let mut map = store.entries.write();
            for (k, v) in entries {
                map.insert(k.to_string(), v.to_string());
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::with_entries([(KEY_PUBLIC_KEY, "abc")]);
        assert_eq!(store.get(KEY_PUBLIC_KEY).unwrap().as_deref(), Some("abc"));
        assert_eq!(store.get(KEY_SIGNATURE).unwrap(), None);

        store.set(KEY_SIGNATURE, "sig").unwrap();
        assert_eq!(store.len(), 2);

        store.remove(KEY_PUBLIC_KEY).unwrap();
        store.remove(KEY_PUBLIC_KEY).unwrap();
        assert_eq!(store.len(), 1);
    }
}
