//! Merge module - Multi-manager apply and update operations.
//!
//! This module decides who owns what after a write and which writes conflict.

mod conflict;
mod engine;

#[cfg(test)]
mod merge_test;

pub use conflict::*;
pub use engine::*;
