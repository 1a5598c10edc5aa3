//! # Managed Fields
//!
//! Declarative multi-writer field ownership and conflict resolution.
//!
//! Several independent writers ("field managers") declare the parts of a
//! shared, schemaless JSON-like object they care about. The library records
//! which manager owns which field, merges each declaration into the stored
//! object, detects writes that would clobber another manager's fields and
//! resolves them on request by transferring ownership.
//!
//! ## Modules
//!
//! - [`value`] - In-memory representation of YAML/JSON objects and the list-keying rules
//! - [`fieldpath`] - Field paths, path sets and the per-object ownership ledger
//! - [`merge`] - The merge engine: apply, update and conflict detection
//! - [`store`] - The object store contract and an in-memory implementation
//! - [`coordinator`] - The read-merge-write loop with retries, cancellation and timeouts

pub mod coordinator;
pub mod fieldpath;
pub mod merge;
pub mod store;
pub mod value;

pub use coordinator::{ApplyCoordinator, ApplyRequest, CoordinatorConfig, CoordinatorError, UpdateRequest};
pub use fieldpath::{ManagedEntry, Operation, OwnershipLedger, Path, PathElement, Set as FieldPathSet};
pub use merge::{ApplyError, Conflict, Conflicts, MergeEngine, Merged};
pub use store::{InMemoryStore, ObjectStore, StoreError, StoredObject, Version};
pub use value::{Structure, Value};
