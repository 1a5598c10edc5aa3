//! Field path module - Represents and manages field paths in nested structures.
//!
//! This module also holds the ownership ledger that tracks which manager owns
//! which fields of one object.

mod path;
mod serialize;
mod set;

pub use path::*;
pub use serialize::*;
pub use set::*;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

static EMPTY_SET: Lazy<Set> = Lazy::new(Set::new);

/// The kind of write that produced a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Declarative apply: the entry is exactly the fields of the last payload.
    Apply,
    /// Imperative update: the entry accumulates the fields the manager changed.
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Apply => f.write_str("Apply"),
            Operation::Update => f.write_str("Update"),
        }
    }
}

/// ManagedEntry records the fields one manager owns in one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedEntry {
    pub manager: String,
    pub operation: Operation,
    pub fields: Set,
    /// Logical clock of the object's ledger at the time the entry was written.
    pub stamp: u64,
}

/// OwnershipLedger is the ordered list of managed entries of one object.
///
/// There is at most one entry per manager and no entry with an empty field
/// set. Every mutation returns a new ledger; entries are replaced or removed
/// as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnershipLedger {
    entries: Vec<ManagedEntry>,
}

impl OwnershipLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        OwnershipLedger::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedEntry> {
        self.entries.iter()
    }

    /// Returns manager names in ledger order.
    pub fn managers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.manager.as_str())
    }

    /// Looks up the entry of a manager.
    pub fn entry_for(&self, manager: &str) -> Option<&ManagedEntry> {
        self.entries.iter().find(|e| e.manager == manager)
    }

    /// Returns the fields a manager owns, or the empty set.
    pub fn owned_by(&self, manager: &str) -> &Set {
        self.entry_for(manager).map_or(&*EMPTY_SET, |e| &e.fields)
    }

    /// Returns a ledger where `manager` owns exactly `fields` through `operation`.
    ///
    /// An empty `fields` drops the entry. Rewriting an entry with the same
    /// fields and operation leaves the ledger untouched, stamp included.
    pub fn replace(&self, manager: &str, fields: Set, operation: Operation) -> OwnershipLedger {
        if fields.is_empty() {
            return self.remove(manager);
        }
        if let Some(existing) = self.entry_for(manager) {
            if existing.operation == operation && existing.fields == fields {
                return self.clone();
            }
        }

        let entry = ManagedEntry {
            manager: manager.to_string(),
            operation,
            fields,
            stamp: self.next_stamp(),
        };
        let mut entries = self.entries.clone();
        match entries.iter_mut().find(|e| e.manager == manager) {
            Some(slot) => *slot = entry,
            None => entries.push(entry),
        }
        OwnershipLedger { entries }
    }

    /// Returns a ledger without the manager's entry.
    pub fn remove(&self, manager: &str) -> OwnershipLedger {
        OwnershipLedger {
            entries: self
                .entries
                .iter()
                .filter(|e| e.manager != manager)
                .cloned()
                .collect(),
        }
    }

    /// Returns a ledger where `manager` no longer owns `stolen` or anything
    /// beneath it. The entry keeps its operation and stamp, and is dropped if
    /// nothing is left.
    pub fn evict(&self, manager: &str, stolen: &Set) -> OwnershipLedger {
        let Some(entry) = self.entry_for(manager) else {
            return self.clone();
        };
        let remaining = entry.fields.without_descendants_of(stolen);
        if remaining.is_empty() {
            return self.remove(manager);
        }

        let entries = self
            .entries
            .iter()
            .map(|e| {
                if e.manager == manager {
                    ManagedEntry {
                        fields: remaining.clone(),
                        ..e.clone()
                    }
                } else {
                    e.clone()
                }
            })
            .collect();
        OwnershipLedger { entries }
    }

    /// Returns every manager whose entry lists the path.
    pub fn owners_of(&self, path: &Path) -> BTreeSet<&str> {
        self.entries
            .iter()
            .filter(|e| e.fields.has(path))
            .map(|e| e.manager.as_str())
            .collect()
    }

    fn next_stamp(&self) -> u64 {
        self.entries.iter().map(|e| e.stamp).max().map_or(1, |s| s + 1)
    }
}

impl fmt::Display for OwnershipLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{} ({}, stamp {}):", entry.manager, entry.operation, entry.stamp)?;
            for path in entry.fields.paths() {
                writeln!(f, "  {}", path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fields(paths: &[&[&str]]) -> Set {
        paths
            .iter()
            .map(|names| Path::from_field_names(names.iter().copied()))
            .collect()
    }

    #[test]
    fn test_replace_inserts_and_replaces() {
        let ledger = OwnershipLedger::new();
        assert!(ledger.entry_for("manager1").is_none());

        let ledger = ledger.replace("manager1", fields(&[&["a"]]), Operation::Apply);
        let ledger = ledger.replace("manager2", fields(&[&["b"]]), Operation::Apply);
        assert_eq!(ledger.managers().collect::<Vec<_>>(), vec!["manager1", "manager2"]);

        let ledger = ledger.replace("manager1", fields(&[&["c"]]), Operation::Apply);
        assert_eq!(ledger.len(), 2);
        // Replacing keeps the entry's position.
        assert_eq!(ledger.managers().collect::<Vec<_>>(), vec!["manager1", "manager2"]);
        let entry = ledger.entry_for("manager1").unwrap();
        assert_eq!(entry.fields, fields(&[&["c"]]));
        assert_eq!(entry.stamp, 3);
        assert_eq!(entry.operation, Operation::Apply);
    }

    #[test]
    fn test_identical_replace_is_a_noop() {
        let ledger = OwnershipLedger::new().replace("m", fields(&[&["a"]]), Operation::Apply);
        let again = ledger.replace("m", fields(&[&["a"]]), Operation::Apply);
        assert_eq!(again, ledger);

        let as_update = ledger.replace("m", fields(&[&["a"]]), Operation::Update);
        assert_ne!(as_update, ledger);
        assert_eq!(as_update.entry_for("m").unwrap().operation, Operation::Update);
    }

    #[test]
    fn test_empty_fields_drop_the_entry() {
        let ledger = OwnershipLedger::new().replace("m", fields(&[&["a"]]), Operation::Apply);
        let ledger = ledger.replace("m", Set::new(), Operation::Apply);
        assert!(ledger.is_empty());
        assert!(ledger.owned_by("m").is_empty());
    }

    #[test]
    fn test_owners_of_is_derived_from_entries() {
        let ledger = OwnershipLedger::new()
            .replace("manager1", fields(&[&["username"], &["password"]]), Operation::Apply)
            .replace("manager2", fields(&[&["username"], &["key"]]), Operation::Apply);

        let owners = ledger.owners_of(&Path::from_field_names(["username"]));
        assert_eq!(owners.into_iter().collect::<Vec<_>>(), vec!["manager1", "manager2"]);
        assert!(ledger.owners_of(&Path::from_field_names(["missing"])).is_empty());

        let ledger = ledger.remove("manager1");
        let owners = ledger.owners_of(&Path::from_field_names(["username"]));
        assert_eq!(owners.into_iter().collect::<Vec<_>>(), vec!["manager2"]);
    }

    #[test]
    fn test_evict_removes_descendants_and_keeps_stamp() {
        let ledger = OwnershipLedger::new().replace(
            "manager1",
            fields(&[&["data"], &["data", "x"], &["data", "x", "y"], &["other"]]),
            Operation::Apply,
        );
        let stamp = ledger.entry_for("manager1").unwrap().stamp;

        let evicted = ledger.evict("manager1", &fields(&[&["data", "x"]]));
        let entry = evicted.entry_for("manager1").unwrap();
        assert_eq!(entry.fields, fields(&[&["data"], &["other"]]));
        assert_eq!(entry.stamp, stamp);

        let emptied = ledger.evict("manager1", &fields(&[&["data"], &["other"]]));
        assert!(emptied.is_empty());

        assert_eq!(ledger.evict("nobody", &fields(&[&["data"]])), ledger);
    }

    #[test]
    fn test_ledger_serde_round_trip() {
        let ledger = OwnershipLedger::new()
            .replace("manager1", fields(&[&["stringData"], &["stringData", "username"]]), Operation::Apply)
            .replace("kubectl", fields(&[&["type"]]), Operation::Update);

        let json = serde_json::to_string(&ledger).unwrap();
        assert!(json.contains(r#""operation":"Update""#));
        assert!(json.contains(r#""f:stringData":{".":{},"f:username":{}}"#));

        let back: OwnershipLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ledger);
        assert_eq!(back.owned_by("manager1").len(), 2);
    }
}
