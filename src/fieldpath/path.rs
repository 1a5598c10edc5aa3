//! Field paths.

use crate::value::{FieldList, Value};
use std::fmt;

/// PathElement addresses one child of a map or list node.
///
/// List elements are always addressed by a stable identity, never by
/// position. Elements order field names first, then keys, then values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathElement {
    /// A map entry.
    FieldName(String),
    /// A list element that is a map, identified by its key fields.
    Key(FieldList),
    /// A scalar list element, identified by itself.
    Value(Value),
}

impl PathElement {
    pub fn field_name(name: impl Into<String>) -> Self {
        PathElement::FieldName(name.into())
    }

    pub fn key(fields: FieldList) -> Self {
        PathElement::Key(fields)
    }

    pub fn value(v: Value) -> Self {
        PathElement::Value(v)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::FieldName(name) => write!(f, ".{}", name),
            PathElement::Key(key) => {
                let parts: Vec<String> = key
                    .iter()
                    .map(|field| format!("{}={}", field.name, field.value))
                    .collect();
                write!(f, "[{}]", parts.join(","))
            }
            PathElement::Value(v) => write!(f, "[={}]", v),
        }
    }
}

/// Path locates a node from the object root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    elements: Vec<PathElement>,
}

impl Path {
    pub fn new() -> Self {
        Path::default()
    }

    /// A path made only of field names, e.g. `["stringData", "username"]`.
    pub fn from_field_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().map(PathElement::field_name).collect()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn push(&mut self, element: PathElement) {
        self.elements.push(element);
    }

    pub fn pop(&mut self) -> Option<PathElement> {
        self.elements.pop()
    }

    /// Returns a copy of this path extended by `element`.
    pub fn with(&self, element: PathElement) -> Self {
        let mut child = self.clone();
        child.push(element);
        child
    }

    /// Every proper, non-empty prefix of this path, shortest first.
    pub fn ancestors(&self) -> impl Iterator<Item = Path> + '_ {
        (1..self.elements.len()).map(move |n| Path {
            elements: self.elements[..n].to_vec(),
        })
    }

    pub fn as_slice(&self) -> &[PathElement] {
        &self.elements
    }
}

impl FromIterator<PathElement> for Path {
    fn from_iter<T: IntoIterator<Item = PathElement>>(iter: T) -> Self {
        Path {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathElement;
    type IntoIter = std::slice::Iter<'a, PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.elements.iter().try_for_each(|element| write!(f, "{}", element))
    }
}
