//! Object store contract.
//!
//! The coordinator only needs three operations from a store: read an object
//! with its version, write it back if the version is still the expected one,
//! and delete it. Anything that can honor that compare-and-swap contract can
//! back the engine.

mod memory;

pub use memory::InMemoryStore;

use crate::fieldpath::OwnershipLedger;
use crate::value::Value;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Version is an opaque compare-and-swap token. It is only ever compared for
/// equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    pub fn new(token: u64) -> Self {
        Version(token)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// StoredObject is one object as the store holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub value: Value,
    pub version: Version,
    pub ledger: OwnershipLedger,
}

/// Errors a store can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("object {key} not found")]
    NotFound { key: String },

    /// The object changed since it was read.
    #[error("version conflict on {key}: expected {expected:?}, found {actual:?}")]
    VersionConflict {
        key: String,
        expected: Option<Version>,
        actual: Option<Version>,
    },

    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

/// ObjectStore persists objects with their ledgers under optimistic
/// concurrency.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads an object, or `StoreError::NotFound`.
    async fn get(&self, key: &str) -> Result<StoredObject, StoreError>;

    /// Writes an object if its current version is `expected`.
    ///
    /// `expected == None` means the object must not exist yet. On success the
    /// new version is returned; at most one put per expected version succeeds.
    async fn put(
        &self,
        key: &str,
        value: Value,
        ledger: OwnershipLedger,
        expected: Option<Version>,
    ) -> Result<Version, StoreError>;

    /// Deletes an object together with its ledger.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        (**self).get(key).await
    }

    async fn put(
        &self,
        key: &str,
        value: Value,
        ledger: OwnershipLedger,
        expected: Option<Version>,
    ) -> Result<Version, StoreError> {
        (**self).put(key, value, ledger, expected).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}
