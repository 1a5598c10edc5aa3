//! Value module - In-memory representation of YAML/JSON objects.
//!
//! This module provides the field tree and the structural operations the
//! merge engine runs on it.

mod comparison;
mod structure;
mod value;

pub use comparison::*;
pub use structure::*;
pub use value::*;
