//! Comparison result types.

use super::{PayloadError, Structure, Value};
use crate::fieldpath::Set;
use std::fmt;

/// Comparison holds the result of comparing two field trees.
///
/// No path appears in more than one of the three sets. If all of them are
/// empty the trees were equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    /// Paths in the left-hand side but not the right-hand side.
    pub removed: Set,
    /// Paths in both whose nodes differ.
    pub modified: Set,
    /// Paths in the right-hand side but not the left-hand side.
    pub added: Set,
}

impl Comparison {
    /// Returns true if there are no changes.
    pub fn is_same(&self) -> bool {
        self.removed.is_empty() && self.modified.is_empty() && self.added.is_empty()
    }

    /// Paths whose content the right-hand side sets: added or modified.
    pub fn changed(&self) -> Set {
        self.added.union(&self.modified)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections = [
            ("Modified", &self.modified),
            ("Added", &self.added),
            ("Removed", &self.removed),
        ];
        let mut first = true;
        for (title, set) in sections {
            if set.is_empty() {
                continue;
            }
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "- {} Fields:", title)?;
            for path in set.paths() {
                write!(f, "\n  {}", path)?;
            }
        }
        Ok(())
    }
}

impl Structure {
    /// Compares a live value with its replacement.
    ///
    /// Both sides must be keyable under this structure.
    pub fn compare(&self, lhs: &Value, rhs: &Value) -> Result<Comparison, PayloadError> {
        let rhs_set = self.to_field_set(rhs)?;
        let lhs_set = self.to_field_set(lhs)?;

        let mut modified = Set::new();
        lhs_set.intersection(&rhs_set).iterate(|path| {
            if let Some(proposed) = self.lookup(rhs, path) {
                if !self.node_matches(self.lookup(lhs, path), proposed) {
                    modified.insert(path);
                }
            }
        });

        Ok(Comparison {
            removed: lhs_set.difference(&rhs_set),
            modified,
            added: rhs_set.difference(&lhs_set),
        })
    }
}
