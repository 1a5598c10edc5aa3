//! The merge engine: ownership-aware apply and update of field trees.

use super::{Conflict, Conflicts};
use crate::fieldpath::{Operation, OwnershipLedger, Set};
use crate::value::{PayloadError, Structure, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// ApplyError represents an error computing an apply or update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("apply conflicts with other field managers: {0}")]
    Conflicts(Conflicts),

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    #[error("field manager name must not be empty")]
    MissingManager,

    /// The stored value cannot be keyed with this engine's list keys.
    #[error("stored object does not fit the list keys: {0}")]
    InvalidLiveObject(PayloadError),
}

/// The outcome of a successful merge: the object's next value and ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub value: Value,
    pub ledger: OwnershipLedger,
}

/// MergeEngine computes new object states from immutable snapshots.
///
/// It never touches storage; the coordinator feeds it whatever it read and
/// writes back whatever it returns.
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    structure: Structure,
}

impl MergeEngine {
    /// Creates an engine keyed by the given list structure.
    pub fn new(structure: Structure) -> Self {
        MergeEngine { structure }
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    /// Checks a request without looking at any stored state and returns the
    /// fields the payload claims.
    pub fn validate(&self, manager: &str, payload: &Value) -> Result<Set, ApplyError> {
        if manager.is_empty() {
            return Err(ApplyError::MissingManager);
        }
        Ok(self.structure.to_field_set(payload)?)
    }

    /// Finds every field of `incoming` that another manager owns with a
    /// different value than `payload` asserts.
    pub fn conflicts(
        &self,
        live: &Value,
        ledger: &OwnershipLedger,
        manager: &str,
        payload: &Value,
        incoming: &Set,
    ) -> Conflicts {
        let mut conflicts = Conflicts::new();
        incoming.iterate(|path| {
            let contested: Vec<&str> = ledger
                .owners_of(path)
                .into_iter()
                .filter(|owner| *owner != manager)
                .collect();
            if contested.is_empty() {
                return;
            }
            let Some(proposed) = self.structure.lookup(payload, path) else {
                return;
            };
            if self.structure.node_matches(self.structure.lookup(live, path), proposed) {
                return;
            }
            for owner in contested {
                conflicts.add(Conflict::new(owner, path.clone()));
            }
        });
        conflicts
    }

    /// Applies `payload` on behalf of `manager`.
    ///
    /// The manager ends up owning exactly the fields of the payload. Fields it
    /// owned before and left out are relinquished, and deleted from the value
    /// when nobody else owns them. Without `force`, fields another manager owns
    /// with a different value abort the whole apply; with `force` they are
    /// taken over.
    pub fn apply(
        &self,
        live: &Value,
        ledger: &OwnershipLedger,
        manager: &str,
        payload: &Value,
        force: bool,
    ) -> Result<Merged, ApplyError> {
        let incoming = self.validate(manager, payload)?;
        let prior = ledger.owned_by(manager);

        let conflicts = self.conflicts(live, ledger, manager, payload, &incoming);
        if !conflicts.is_empty() && !force {
            debug!(manager, conflicts = conflicts.len(), "apply rejected");
            return Err(ApplyError::Conflicts(conflicts));
        }

        let mut next = ledger.clone();
        for (owner, stolen) in conflicts.by_owner() {
            warn!(manager, from = owner, fields = stolen.len(), "forcing ownership takeover");
            next = next.evict(owner, &stolen);
        }

        let merged = self.structure.merge(live, payload);
        let relinquished = prior.difference(&incoming);
        let next = next.replace(manager, incoming, Operation::Apply);

        let mut orphaned = Set::new();
        relinquished.iterate(|path| {
            if next.owners_of(path).is_empty() {
                orphaned.insert(path);
            }
        });
        if !orphaned.is_empty() {
            debug!(manager, fields = orphaned.len(), "deleting relinquished fields");
        }

        Ok(Merged {
            value: self.structure.remove_items(&merged, &orphaned),
            ledger: next,
        })
    }

    /// Replaces the whole value on behalf of `manager`.
    ///
    /// Updates never conflict: the manager takes ownership of every field it
    /// adds or changes, and removed fields leave every entry.
    pub fn update(
        &self,
        live: &Value,
        ledger: &OwnershipLedger,
        manager: &str,
        new_value: &Value,
    ) -> Result<Merged, ApplyError> {
        if manager.is_empty() {
            return Err(ApplyError::MissingManager);
        }
        self.structure
            .to_field_set(live)
            .map_err(ApplyError::InvalidLiveObject)?;
        let comparison = self.structure.compare(live, new_value)?;
        if comparison.is_same() {
            return Ok(Merged {
                value: live.clone(),
                ledger: ledger.clone(),
            });
        }

        let taken = comparison.modified.union(&comparison.removed);
        let mut next = ledger.clone();
        for owner in ledger.managers().filter(|owner| *owner != manager) {
            next = next.evict(owner, &taken);
        }

        let owned = ledger
            .owned_by(manager)
            .union(&comparison.changed().ancestor_closure())
            .without_descendants_of(&comparison.removed);
        let next = next.replace(manager, owned, Operation::Update);

        Ok(Merged {
            value: new_value.clone(),
            ledger: next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldpath::Path;
    use crate::value::from_yaml;
    use pretty_assertions::assert_eq;

    fn yaml(s: &str) -> Value {
        from_yaml(s).unwrap()
    }

    #[test]
    fn test_validate() {
        let engine = MergeEngine::default();
        assert_eq!(engine.validate("", &yaml("a: 1")), Err(ApplyError::MissingManager));
        assert!(matches!(
            engine.validate("m", &Value::Int(1)),
            Err(ApplyError::InvalidPayload(PayloadError::NotAnObject { .. }))
        ));
        assert_eq!(engine.validate("m", &yaml("a: 1")).unwrap().len(), 1);
    }

    #[test]
    fn test_apply_on_empty_object() {
        let engine = MergeEngine::default();
        let merged = engine
            .apply(&yaml("{}"), &OwnershipLedger::new(), "manager1", &yaml("data: {a: 1}"), false)
            .unwrap();

        assert_eq!(merged.value, yaml("data: {a: 1}"));
        let entry = merged.ledger.entry_for("manager1").unwrap();
        assert_eq!(entry.operation, Operation::Apply);
        assert_eq!(
            entry.fields.paths(),
            vec![Path::from_field_names(["data"]), Path::from_field_names(["data", "a"])]
        );
    }

    #[test]
    fn test_update_takes_changed_fields_and_drops_removed() {
        let engine = MergeEngine::default();
        let start = engine
            .apply(&yaml("{}"), &OwnershipLedger::new(), "applier", &yaml("data: {a: 1, b: 2}"), false)
            .unwrap();

        let updated = engine
            .update(&start.value, &start.ledger, "editor", &yaml("data: {a: 10, c: 3}"))
            .unwrap();
        assert_eq!(updated.value, yaml("data: {a: 10, c: 3}"));

        let applier = updated.ledger.entry_for("applier").unwrap();
        assert_eq!(applier.fields.paths(), vec![Path::from_field_names(["data"])]);

        let editor = updated.ledger.entry_for("editor").unwrap();
        assert_eq!(editor.operation, Operation::Update);
        assert_eq!(
            editor.fields.paths(),
            vec![
                Path::from_field_names(["data"]),
                Path::from_field_names(["data", "a"]),
                Path::from_field_names(["data", "c"]),
            ]
        );
    }

    #[test]
    fn test_update_rejects_live_value_keyed_differently() {
        let by_name = MergeEngine::default();
        let start = by_name
            .apply(&yaml("{}"), &OwnershipLedger::new(), "applier", &yaml("ports: [{name: a}]"), false)
            .unwrap();

        let by_id = MergeEngine::new(Structure::new(vec!["id".into()]));
        let err = by_id.update(&start.value, &start.ledger, "editor", &yaml("{}")).unwrap_err();
        assert!(matches!(
            err,
            ApplyError::InvalidLiveObject(PayloadError::UnkeyedListElement { .. })
        ));
    }

    #[test]
    fn test_update_without_changes_keeps_ledger() {
        let engine = MergeEngine::default();
        let start = engine
            .apply(&yaml("{}"), &OwnershipLedger::new(), "applier", &yaml("a: 1"), false)
            .unwrap();
        let same = engine.update(&start.value, &start.ledger, "editor", &yaml("a: 1")).unwrap();
        assert_eq!(same, start);
    }
}
