//! Structural operations on field trees.
//!
//! Objects carry no schema. The only structural knowledge needed is how list
//! elements are identified, which is what [`Structure`] describes: a scalar
//! element is identified by its own value, a map element by the first of the
//! configured key fields it carries.

use super::{FieldList, Map, Value};
use crate::fieldpath::{Path, PathElement, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Reasons a payload cannot be turned into a field set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload root must be a map, got {kind}")]
    NotAnObject { kind: &'static str },

    #[error("list element at {path} has none of the key fields {keys:?}")]
    UnkeyedListElement { path: String, keys: Vec<String> },

    #[error("list at {path} directly contains another list")]
    NestedList { path: String },

    #[error("duplicate list element {element} at {path}")]
    DuplicateKey { path: String, element: String },
}

/// Structure describes how list elements are keyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    /// Candidate key fields for map elements, tried in order.
    pub list_keys: Vec<String>,
}

impl Default for Structure {
    fn default() -> Self {
        Structure {
            list_keys: vec!["name".to_string()],
        }
    }
}

impl Structure {
    pub fn new(list_keys: Vec<String>) -> Self {
        Structure { list_keys }
    }

    /// Derives the path element that identifies a list element.
    pub fn element_key(&self, list_path: &Path, item: &Value) -> Result<PathElement, PayloadError> {
        match item {
            Value::Map(map) => self
                .list_keys
                .iter()
                .find_map(|key| {
                    map.get(key)
                        .filter(|v| v.is_scalar())
                        .map(|v| PathElement::Key(FieldList::single(key.clone(), v.clone())))
                })
                .ok_or_else(|| PayloadError::UnkeyedListElement {
                    path: list_path.to_string(),
                    keys: self.list_keys.clone(),
                }),
            Value::List(_) => Err(PayloadError::NestedList {
                path: list_path.to_string(),
            }),
            scalar => Ok(PathElement::Value(scalar.clone())),
        }
    }

    /// Converts a payload to the set of every path it materializes.
    ///
    /// Each map entry, list element and leaf contributes its own path, so the
    /// result always contains the ancestors of its members.
    pub fn to_field_set(&self, value: &Value) -> Result<Set, PayloadError> {
        if !value.is_map() {
            return Err(PayloadError::NotAnObject { kind: value.kind() });
        }
        let mut set = Set::new();
        self.collect_field_set(value, &mut Path::new(), &mut set)?;
        Ok(set)
    }

    fn collect_field_set(&self, value: &Value, path: &mut Path, set: &mut Set) -> Result<(), PayloadError> {
        if !path.is_empty() {
            set.insert(path);
        }

        match value {
            Value::Map(map) => {
                for (name, child) in map.iter() {
                    path.push(PathElement::field_name(name.clone()));
                    self.collect_field_set(child, path, set)?;
                    path.pop();
                }
            }
            Value::List(items) => {
                let mut seen = HashSet::with_capacity(items.len());
                for item in items {
                    let pe = self.element_key(path, item)?;
                    if !seen.insert(pe.clone()) {
                        return Err(PayloadError::DuplicateKey {
                            path: path.to_string(),
                            element: pe.to_string(),
                        });
                    }
                    path.push(pe);
                    self.collect_field_set(item, path, set)?;
                    path.pop();
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Finds the node a path addresses.
    pub fn lookup<'v>(&self, value: &'v Value, path: &Path) -> Option<&'v Value> {
        let mut current = value;
        let mut walked = Path::new();
        for pe in path {
            current = self.child(current, &walked, pe)?;
            walked.push(pe.clone());
        }
        Some(current)
    }

    fn child<'v>(&self, parent: &'v Value, parent_path: &Path, pe: &PathElement) -> Option<&'v Value> {
        match (parent, pe) {
            (Value::Map(map), PathElement::FieldName(name)) => map.get(name),
            (Value::List(items), PathElement::Key(_) | PathElement::Value(_)) => items
                .iter()
                .find(|item| self.element_key(parent_path, item).ok().as_ref() == Some(pe)),
            _ => None,
        }
    }

    /// Returns true if the live node agrees with what the payload asserts.
    ///
    /// Leaves compare by structural equality. A map or list only asserts its
    /// own existence and kind; its contents are separate paths.
    pub fn node_matches(&self, live: Option<&Value>, proposed: &Value) -> bool {
        match (live, proposed) {
            (None, _) => false,
            (Some(Value::Map(_)), Value::Map(_)) => true,
            (Some(Value::List(_)), Value::List(_)) => true,
            (Some(live), proposed) => live == proposed,
        }
    }

    /// Merges a payload into a live value.
    ///
    /// Maps merge entry by entry and keyed lists element by element, new
    /// elements appended in payload order. Anything else takes the payload.
    pub fn merge(&self, live: &Value, payload: &Value) -> Value {
        self.merge_at(live, payload, &mut Path::new())
    }

    fn merge_at(&self, live: &Value, payload: &Value, path: &mut Path) -> Value {
        match (live, payload) {
            (Value::Map(lhs), Value::Map(rhs)) => {
                let mut merged = lhs.clone();
                for (name, rhs_child) in rhs.iter() {
                    let child = match lhs.get(name) {
                        Some(lhs_child) => {
                            path.push(PathElement::field_name(name.clone()));
                            let child = self.merge_at(lhs_child, rhs_child, path);
                            path.pop();
                            child
                        }
                        None => rhs_child.clone(),
                    };
                    merged.set(name.clone(), child);
                }
                Value::Map(merged)
            }
            (Value::List(lhs), Value::List(rhs)) => {
                let mut merged = lhs.clone();
                let lhs_keys: Vec<Option<PathElement>> =
                    lhs.iter().map(|item| self.element_key(path, item).ok()).collect();

                for rhs_item in rhs {
                    let key = self.element_key(path, rhs_item).ok();
                    let position = key
                        .as_ref()
                        .and_then(|k| lhs_keys.iter().position(|lk| lk.as_ref() == Some(k)));
                    match (position, key) {
                        (Some(i), Some(key)) => {
                            path.push(key);
                            merged[i] = self.merge_at(&lhs[i], rhs_item, path);
                            path.pop();
                        }
                        _ => merged.push(rhs_item.clone()),
                    }
                }
                Value::List(merged)
            }
            (_, payload) => payload.clone(),
        }
    }

    /// Returns a copy of the value without the given paths and their subtrees.
    pub fn remove_items(&self, value: &Value, items: &Set) -> Value {
        if items.is_empty() {
            return value.clone();
        }
        self.remove_items_at(value, items, &mut Path::new())
    }

    fn remove_items_at(&self, value: &Value, items: &Set, path: &mut Path) -> Value {
        match value {
            Value::Map(fields) => {
                let mut kept = Map::new();
                for (name, child) in fields.iter() {
                    path.push(PathElement::field_name(name.clone()));
                    if !items.has(path) {
                        kept.set(name.clone(), self.remove_items_at(child, items, path));
                    }
                    path.pop();
                }
                Value::Map(kept)
            }
            Value::List(elements) => {
                let mut kept = Vec::with_capacity(elements.len());
                for item in elements {
                    let Ok(pe) = self.element_key(path, item) else {
                        kept.push(item.clone());
                        continue;
                    };
                    path.push(pe);
                    if !items.has(path) {
                        kept.push(self.remove_items_at(item, items, path));
                    }
                    path.pop();
                }
                Value::List(kept)
            }
            scalar => scalar.clone(),
        }
    }
}
