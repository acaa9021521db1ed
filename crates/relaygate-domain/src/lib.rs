//! relaygate-domain: Relay membership policy logic
//!
//! This crate contains the authorization core including:
//! - Record model and identifier types
//! - Membership graph built per request from a snapshot
//! - Static policy table and the evaluator that applies it
//! - Existence hiding for denied single-record operations
//! - Expand resolution with per-node masking
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              relaygate-domain                │
//! ├─────────────────────────────────────────────┤
//! │  model/      - Records, ids, relations      │
//! │  membership/ - Membership graph             │
//! │  policy/     - Table, evaluator, filters    │
//! │  expand/     - Expand trees and resolver    │
//! │  source      - Snapshot read interface      │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod expand;
pub mod membership;
pub mod model;
pub mod policy;
pub mod source;

// Re-export commonly used types at the crate root
pub use error::{DomainError, DomainResult};
pub use expand::{ExpandConfig, ExpandResolver, ExpandTree, ExpandedRecord, Expansion};
pub use membership::MembershipGraph;
pub use policy::{
    conceal, parse_filter, Decision, DenyReason, PolicyEvaluator, PolicyRequest, Predicate, Scope,
    Verdict,
};
pub use source::{membership_graph, RecordSource, Snapshot};
