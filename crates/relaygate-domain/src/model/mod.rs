//! Record model for the relay policy engine.
//!
//! This module contains:
//! - Identifier newtypes and the principal
//! - Record types (users, relays, membership edges, sensitive children)
//! - Collections, operations and ranks
//! - Expandable relations between collections

mod relation;
mod types;
#[cfg(test)]
mod types_proptest;

pub use relation::{Cardinality, Lookup, Relation};
pub use types::*;
