use crate::merge::{ApplyError, Conflicts};
use crate::store::StoreError;
use crate::value::PayloadError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the [`ApplyCoordinator`](super::ApplyCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// Fields are owned by other managers with different values. Never
    /// retried; the caller resolves it, typically by forcing.
    #[error("{0}")]
    Conflict(Conflicts),

    #[error("gave up on {key} after {attempts} attempts lost to concurrent writers")]
    RetryExhausted { key: String, attempts: u32 },

    #[error("object {key} not found")]
    NotFound { key: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("store call timed out after {after:?}")]
    TimedOut { after: Duration },

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    #[error("field manager name must not be empty")]
    MissingManager,

    /// The stored object cannot be keyed with this coordinator's list keys.
    #[error("stored object does not fit the list keys: {0}")]
    InvalidStoredObject(PayloadError),

    #[error(transparent)]
    Store(StoreError),
}

impl CoordinatorError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoordinatorError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoordinatorError::NotFound { .. })
    }

    /// Returns the conflicts of a rejected apply.
    pub fn conflicts(&self) -> Option<&Conflicts> {
        match self {
            CoordinatorError::Conflict(conflicts) => Some(conflicts),
            _ => None,
        }
    }
}

impl From<ApplyError> for CoordinatorError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::Conflicts(conflicts) => CoordinatorError::Conflict(conflicts),
            ApplyError::InvalidPayload(err) => CoordinatorError::InvalidPayload(err),
            ApplyError::MissingManager => CoordinatorError::MissingManager,
            ApplyError::InvalidLiveObject(err) => CoordinatorError::InvalidStoredObject(err),
        }
    }
}

impl From<StoreError> for CoordinatorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { key } => CoordinatorError::NotFound { key },
            other => CoordinatorError::Store(other),
        }
    }
}
