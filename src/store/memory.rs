//! In-memory object store.

use super::{ObjectStore, StoreError, StoredObject, Version};
use crate::fieldpath::OwnershipLedger;
use crate::value::Value;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// A `HashMap`-backed store, suitable for tests, tools and embedding.
///
/// The lock is held only for the synchronous body of each call, so every
/// put's version check and write happen atomically.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    last_version: AtomicU64,
}

impl InMemoryStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        InMemoryStore::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Returns the keys of all stored objects, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn next_version(&self) -> Version {
        Version::new(self.last_version.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: key.to_string() })
    }

    async fn put(
        &self,
        key: &str,
        value: Value,
        ledger: OwnershipLedger,
        expected: Option<Version>,
    ) -> Result<Version, StoreError> {
        let mut objects = self.objects.write();
        let actual = objects.get(key).map(|o| o.version);
        if actual != expected {
            return Err(StoreError::VersionConflict {
                key: key.to_string(),
                expected,
                actual,
            });
        }

        let version = self.next_version();
        trace!(key, %version, "stored object");
        objects.insert(
            key.to_string(),
            StoredObject {
                value,
                version,
                ledger,
            },
        );
        Ok(version)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { key: key.to_string() })
    }
}
