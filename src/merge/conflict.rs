//! Conflict types for merge operations.

use crate::fieldpath::{Path, Set};
use std::collections::BTreeMap;
use std::fmt;

/// Conflict records that another manager owns a field with a different value
/// than the one a request asserts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Conflict {
    /// The path to the conflicting field.
    pub path: Path,
    /// The manager that currently owns the field.
    pub owner: String,
}

impl Conflict {
    /// Creates a new conflict.
    pub fn new(owner: impl Into<String>, path: Path) -> Self {
        Conflict {
            path,
            owner: owner.into(),
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conflict with \"{}\": {}", self.owner, self.path)
    }
}

impl std::error::Error for Conflict {}

/// Conflicts is the list of every conflict found for one request, ordered by
/// path and then owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conflicts {
    conflicts: Vec<Conflict>,
}

impl Conflicts {
    /// Creates a new empty Conflicts collection.
    pub fn new() -> Self {
        Conflicts::default()
    }

    /// Adds a conflict, keeping the collection sorted and free of duplicates.
    pub fn add(&mut self, conflict: Conflict) {
        if let Err(pos) = self.conflicts.binary_search(&conflict) {
            self.conflicts.insert(pos, conflict);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter()
    }

    /// Groups conflicting paths by the manager that owns them.
    pub fn by_owner(&self) -> BTreeMap<&str, Set> {
        let mut grouped: BTreeMap<&str, Set> = BTreeMap::new();
        for conflict in &self.conflicts {
            grouped
                .entry(conflict.owner.as_str())
                .or_default()
                .insert(&conflict.path);
        }
        grouped
    }
}

impl FromIterator<Conflict> for Conflicts {
    fn from_iter<T: IntoIterator<Item = Conflict>>(iter: T) -> Self {
        let mut conflicts = Conflicts::new();
        for conflict in iter {
            conflicts.add(conflict);
        }
        conflicts
    }
}

impl IntoIterator for Conflicts {
    type Item = Conflict;
    type IntoIter = std::vec::IntoIter<Conflict>;

    fn into_iter(self) -> Self::IntoIter {
        self.conflicts.into_iter()
    }
}

impl fmt::Display for Conflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.conflicts.as_slice() {
            [single] => write!(f, "{}", single),
            many => {
                write!(f, "{} conflicts:", many.len())?;
                for conflict in many {
                    write!(f, "\n- {}", conflict)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Conflicts {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_display() {
        let conflict = Conflict::new("manager1", Path::from_field_names(["stringData", "username"]));
        assert_eq!(
            conflict.to_string(),
            r#"conflict with "manager1": .stringData.username"#
        );
    }

    #[test]
    fn test_conflicts_are_sorted_and_deduplicated() {
        let conflicts: Conflicts = [
            Conflict::new("b", Path::from_field_names(["x"])),
            Conflict::new("a", Path::from_field_names(["y"])),
            Conflict::new("a", Path::from_field_names(["x"])),
            Conflict::new("b", Path::from_field_names(["x"])),
        ]
        .into_iter()
        .collect();

        assert_eq!(conflicts.len(), 3);
        let order: Vec<(String, String)> = conflicts
            .iter()
            .map(|c| (c.path.to_string(), c.owner.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                (".x".to_string(), "a".to_string()),
                (".x".to_string(), "b".to_string()),
                (".y".to_string(), "a".to_string()),
            ]
        );
        assert!(conflicts.to_string().starts_with("3 conflicts:\n- "));
    }

    #[test]
    fn test_by_owner() {
        let conflicts: Conflicts = [
            Conflict::new("a", Path::from_field_names(["x"])),
            Conflict::new("a", Path::from_field_names(["y"])),
            Conflict::new("b", Path::from_field_names(["x"])),
        ]
        .into_iter()
        .collect();

        let grouped = conflicts.by_owner();
        assert_eq!(grouped["a"].len(), 2);
        assert_eq!(grouped["b"].paths(), vec![Path::from_field_names(["x"])]);
    }
}
