//! Coordinator module - read, merge and conditionally write objects.
//!
//! The coordinator is the only component that talks to an [`ObjectStore`]. It
//! reads the current object, lets the [`MergeEngine`] compute the next state
//! and writes it back under the version it read. Losing a race to another
//! writer restarts the cycle from a fresh read.

mod config;
mod error;


pub use config::*;
pub use error::*;

use crate::fieldpath::OwnershipLedger;
use crate::merge::{ApplyError, MergeEngine, Merged};
use crate::store::{ObjectStore, StoreError, StoredObject};
use crate::value::{Map, Value};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A declarative write: `manager` wants the object at `key` to contain
/// `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplyRequest {
    pub key: String,
    pub manager: String,
    pub payload: Value,
    /// Take over conflicting fields instead of failing.
    #[serde(default)]
    pub force: bool,
}

impl ApplyRequest {
    pub fn new(key: impl Into<String>, manager: impl Into<String>, payload: Value) -> Self {
        ApplyRequest {
            key: key.into(),
            manager: manager.into(),
            payload,
            force: false,
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// An imperative write replacing the whole object value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRequest {
    pub key: String,
    pub manager: String,
    pub value: Value,
}

impl UpdateRequest {
    pub fn new(key: impl Into<String>, manager: impl Into<String>, value: Value) -> Self {
        UpdateRequest {
            key: key.into(),
            manager: manager.into(),
            value,
        }
    }
}

/// ApplyCoordinator runs apply and update requests against a store.
///
/// It keeps no per-key state; concurrent calls are safe as long as the store
/// honors its compare-and-swap contract.
#[derive(Debug)]
pub struct ApplyCoordinator<S> {
    store: S,
    engine: MergeEngine,
    config: CoordinatorConfig,
}

impl<S: ObjectStore> ApplyCoordinator<S> {
    pub fn new(store: S, config: CoordinatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(ApplyCoordinator {
            engine: MergeEngine::new(config.structure()),
            store,
            config,
        })
    }

    /// Creates a coordinator with the default configuration.
    pub fn with_defaults(store: S) -> Self {
        let config = CoordinatorConfig::default();
        ApplyCoordinator {
            engine: MergeEngine::new(config.structure()),
            store,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Applies a declarative payload, creating the object if needed.
    pub async fn apply(
        &self,
        request: &ApplyRequest,
        cancel: &CancellationToken,
    ) -> Result<StoredObject, CoordinatorError> {
        self.engine.validate(&request.manager, &request.payload)?;
        self.commit(&request.key, &request.manager, cancel, |live, ledger| {
            self.engine
                .apply(live, ledger, &request.manager, &request.payload, request.force)
        })
        .await
    }

    /// Replaces the object value, creating the object if needed.
    pub async fn update(
        &self,
        request: &UpdateRequest,
        cancel: &CancellationToken,
    ) -> Result<StoredObject, CoordinatorError> {
        self.engine.validate(&request.manager, &request.value)?;
        self.commit(&request.key, &request.manager, cancel, |live, ledger| {
            self.engine.update(live, ledger, &request.manager, &request.value)
        })
        .await
    }

    pub async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<StoredObject, CoordinatorError> {
        self.guarded(cancel, self.store.get(key)).await
    }

    /// Deletes an object and its ledger.
    pub async fn delete(&self, key: &str, cancel: &CancellationToken) -> Result<(), CoordinatorError> {
        self.guarded(cancel, self.store.delete(key)).await?;
        info!(key, "deleted object");
        Ok(())
    }

    async fn commit<F>(
        &self,
        key: &str,
        manager: &str,
        cancel: &CancellationToken,
        compute: F,
    ) -> Result<StoredObject, CoordinatorError>
    where
        F: Fn(&Value, &OwnershipLedger) -> Result<Merged, ApplyError>,
    {
        let empty_value = Value::Map(Map::new());
        let empty_ledger = OwnershipLedger::new();
        let attempts = self.config.max_attempts;

        for attempt in 1..=attempts {
            let current = match self.guarded(cancel, self.store.get(key)).await {
                Ok(object) => Some(object),
                Err(CoordinatorError::NotFound { .. }) => None,
                Err(err) => return Err(err),
            };
            let expected = current.as_ref().map(|o| o.version);

            let (live, ledger) = current
                .as_ref()
                .map_or((&empty_value, &empty_ledger), |o| (&o.value, &o.ledger));
            let merged = compute(live, ledger)?;

            if let Some(existing) = current {
                if existing.value == merged.value && existing.ledger == merged.ledger {
                    debug!(key, manager, version = %existing.version, "nothing changed, skipping write");
                    return Ok(existing);
                }
            }

            let put = self
                .store
                .put(key, merged.value.clone(), merged.ledger.clone(), expected);
            match self.guarded(cancel, put).await {
                Ok(version) => {
                    info!(key, manager, %version, attempt, "committed object");
                    return Ok(StoredObject {
                        value: merged.value,
                        version,
                        ledger: merged.ledger,
                    });
                }
                Err(CoordinatorError::Store(StoreError::VersionConflict { .. })) => {
                    debug!(key, manager, attempt, "lost a version race, retrying");
                }
                Err(err) => return Err(err),
            }
        }

        warn!(key, manager, attempts, "retries exhausted");
        Err(CoordinatorError::RetryExhausted {
            key: key.to_string(),
            attempts,
        })
    }

    /// Races a store call against the cancellation token and the configured
    /// timeout.
    async fn guarded<T, F>(&self, cancel: &CancellationToken, call: F) -> Result<T, CoordinatorError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let timeout = self.config.timeout();
        let call = async move {
            match timeout {
                Some(after) => match tokio::time::timeout(after, call).await {
                    Ok(result) => result.map_err(CoordinatorError::from),
                    Err(_) => Err(CoordinatorError::TimedOut { after }),
                },
                None => call.await.map_err(CoordinatorError::from),
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CoordinatorError::Cancelled),
            result = call => result,
        }
    }
}
