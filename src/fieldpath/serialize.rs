//! Serialization for fieldpath types.
//!
//! Sets are written in the "fieldsV1" JSON form used by Kubernetes managed
//! fields: every path element becomes an object key with a type prefix, and a
//! `"."` entry marks a path that is a member in its own right while also having
//! members beneath it.

use super::path::PathElement;
use super::set::Set;
use crate::value::{Field, FieldList, Value};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error type for fieldpath serialization/deserialization.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SerializeError {
    pub message: String,
    unknown_prefix: bool,
}

impl SerializeError {
    pub fn new(message: impl Into<String>) -> Self {
        SerializeError {
            message: message.into(),
            unknown_prefix: false,
        }
    }

    fn unknown_prefix(prefix: &str) -> Self {
        SerializeError {
            message: format!("unknown path element type: {}", prefix),
            unknown_prefix: true,
        }
    }
}

const SELF_MARKER: &str = ".";

/// Serializes a PathElement to its string representation.
///
/// Format:
/// - FieldName: `f:name`
/// - Key: `k:{"name":"http"}`
/// - Value: `v:"json value"`
pub fn serialize_path_element(pe: &PathElement) -> Result<String, SerializeError> {
    match pe {
        PathElement::FieldName(name) => Ok(format!("f:{}", name)),
        PathElement::Key(fields) => {
            let obj: serde_json::Map<String, serde_json::Value> = fields
                .iter()
                .map(|field| Ok((field.name.clone(), to_json_value(&field.value)?)))
                .collect::<Result<_, SerializeError>>()?;
            Ok(format!("k:{}", serde_json::Value::Object(obj)))
        }
        PathElement::Value(v) => Ok(format!("v:{}", to_json_value(v)?)),
    }
}

/// Deserializes a PathElement from its string representation.
pub fn deserialize_path_element(s: &str) -> Result<PathElement, SerializeError> {
    let (prefix, content) = match (s.get(..2), s.get(2..)) {
        (Some(prefix), Some(content)) => (prefix, content),
        _ => return Err(SerializeError::new("key must be at least 2 characters long")),
    };

    match prefix {
        "f:" => Ok(PathElement::FieldName(content.to_string())),
        "v:" => Ok(PathElement::Value(parse_json(content)?)),
        "k:" => match parse_json(content)? {
            Value::Map(map) => {
                let fields = map
                    .fields
                    .into_iter()
                    .map(|(name, value)| Field { name, value })
                    .collect();
                Ok(PathElement::Key(FieldList::with_fields(fields)))
            }
            other => Err(SerializeError::new(format!(
                "expected JSON object for key, got {}",
                other.kind()
            ))),
        },
        _ => Err(SerializeError::unknown_prefix(prefix)),
    }
}

fn to_json_value(v: &Value) -> Result<serde_json::Value, SerializeError> {
    serde_json::to_value(v).map_err(|e| SerializeError::new(format!("JSON error: {}", e)))
}

fn parse_json(s: &str) -> Result<Value, SerializeError> {
    serde_json::from_str(s).map_err(|e| SerializeError::new(format!("JSON parse error: {}", e)))
}

type JsonObject = serde_json::Map<String, serde_json::Value>;

impl Set {
    /// Serializes the set to fieldsV1 JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, SerializeError> {
        serde_json::to_vec(&self.to_json_object()?)
            .map_err(|e| SerializeError::new(format!("JSON error: {}", e)))
    }

    /// Deserializes a set from fieldsV1 JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Set, SerializeError> {
        let json: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| SerializeError::new(format!("JSON parse error: {}", e)))?;
        match json {
            serde_json::Value::Object(obj) => Self::from_json_object(obj),
            _ => Err(SerializeError::new("expected JSON object")),
        }
    }

    fn to_json_object(&self) -> Result<JsonObject, SerializeError> {
        let mut result = JsonObject::new();

        for member in self.members.iter() {
            let mut entry = JsonObject::new();
            if let Some(child) = self.children.get(member) {
                entry.insert(SELF_MARKER.to_string(), serde_json::Value::Object(JsonObject::new()));
                entry.extend(child.to_json_object()?);
            }
            result.insert(serialize_path_element(member)?, serde_json::Value::Object(entry));
        }

        for (pe, child) in &self.children {
            if self.members.contains(pe) {
                continue;
            }
            result.insert(
                serialize_path_element(pe)?,
                serde_json::Value::Object(child.to_json_object()?),
            );
        }

        Ok(result)
    }

    fn from_json_object(obj: JsonObject) -> Result<Set, SerializeError> {
        let mut set = Set::new();

        for (key, value) in obj {
            if key == SELF_MARKER {
                continue;
            }

            let pe = match deserialize_path_element(&key) {
                Ok(pe) => pe,
                // Newer writers may add element kinds this reader does not know.
                Err(e) if e.unknown_prefix => continue,
                Err(e) => return Err(e),
            };

            let serde_json::Value::Object(child_obj) = value else {
                return Err(SerializeError::new(format!(
                    "expected object value for key: {}",
                    key
                )));
            };

            let is_member = child_obj.is_empty() || child_obj.contains_key(SELF_MARKER);
            let child_set = Self::from_json_object(child_obj)?;

            if is_member {
                set.members.insert(pe.clone());
            }
            if !child_set.is_empty() {
                set.children.insert(pe, child_set);
            }
        }

        Ok(set)
    }
}

impl Serialize for Set {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_object()
            .map_err(<S::Error as serde::ser::Error>::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Set {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let obj = JsonObject::deserialize(deserializer)?;
        Set::from_json_object(obj).map_err(de::Error::custom)
    }
}
