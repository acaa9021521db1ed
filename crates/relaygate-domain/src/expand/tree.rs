//! Requested and resolved expand trees.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{DomainError, DomainResult};
use crate::model::Record;

/// A requested set of relation paths, merged into a tree.
///
/// `relay_roles_via_user,relay_roles_via_user.relay` becomes one
/// `relay_roles_via_user` node with a `relay` child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandTree {
    children: BTreeMap<String, ExpandTree>,
}

impl ExpandTree {
    /// An empty tree: expand nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses comma-separated, dot-joined relation paths.
    pub fn parse(input: &str, max_depth: u32) -> DomainResult<Self> {
        let mut tree = Self::empty();
        for raw in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let segments: Vec<&str> = raw.split('.').map(str::trim).collect();
            if segments.iter().any(|s| s.is_empty()) {
                return Err(DomainError::InvalidExpand {
                    message: format!("empty segment in '{raw}'"),
                });
            }
            if segments.len() > max_depth as usize {
                return Err(DomainError::ExpandDepthExceeded { max_depth });
            }
            tree.insert(&segments);
        }
        Ok(tree)
    }

    /// Builds a tree from pre-split paths.
    pub fn from_paths<I, P, S>(paths: I, max_depth: u32) -> DomainResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::empty();
        for path in paths {
            let segments: Vec<S> = path.into_iter().collect();
            let segments: Vec<&str> = segments.iter().map(|s| s.as_ref()).collect();
            if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
                return Err(DomainError::InvalidExpand {
                    message: "relation path segments cannot be empty".to_string(),
                });
            }
            if segments.len() > max_depth as usize {
                return Err(DomainError::ExpandDepthExceeded { max_depth });
            }
            tree.insert(&segments);
        }
        Ok(tree)
    }

    fn insert(&mut self, segments: &[&str]) {
        if let Some((head, rest)) = segments.split_first() {
            self.children
                .entry((*head).to_string())
                .or_default()
                .insert(rest);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Length of the longest path.
    pub fn depth(&self) -> u32 {
        self.children
            .values()
            .map(|child| 1 + child.depth())
            .max()
            .unwrap_or(0)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &ExpandTree)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A record with its permitted expansions attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedRecord {
    #[serde(flatten)]
    pub record: Record,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub expand: BTreeMap<String, Expansion>,
}

impl ExpandedRecord {
    /// Wraps a record with no expansions.
    pub fn bare(record: Record) -> Self {
        Self {
            record,
            expand: BTreeMap::new(),
        }
    }

    /// The expansion under `name`, if present.
    pub fn get(&self, name: &str) -> Option<&Expansion> {
        self.expand.get(name)
    }

    /// Follows a dotted path through single and list expansions, collecting
    /// every record reached.
    pub fn reach(&self, path: &str) -> Vec<&ExpandedRecord> {
        let mut frontier = vec![self];
        for segment in path.split('.') {
            frontier = frontier
                .into_iter()
                .filter_map(|node| node.get(segment))
                .flat_map(Expansion::records)
                .collect();
        }
        frontier
    }
}

/// A resolved relation: one record or a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Expansion {
    One(Box<ExpandedRecord>),
    Many(Vec<ExpandedRecord>),
}

impl Expansion {
    pub fn records(&self) -> Vec<&ExpandedRecord> {
        match self {
            Expansion::One(record) => vec![&**record],
            Expansion::Many(records) => records.iter().collect(),
        }
    }
}
