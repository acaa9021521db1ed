//! Relation expansion with per-node visibility masking.
//!
//! This module contains:
//! - Parsing of dotted expand paths into an [`ExpandTree`]
//! - The [`ExpandResolver`] that walks a tree against a snapshot
//! - The expanded output shape

mod config;
mod resolver;
mod tree;

#[cfg(test)]
mod tests;

pub use config::ExpandConfig;
pub use resolver::ExpandResolver;
pub use tree::{ExpandTree, ExpandedRecord, Expansion};
