//! Typed policy: table, evaluator, list predicates and existence hiding.
//!
//! # Flow
//!
//! ```text
//! PolicyRequest ──► PolicyEvaluator ──► Decision ──► conceal() ──► Verdict
//!                        │                               │
//!                  PolicyTable + MembershipGraph    get/update/delete denials
//!                                                   become NotFound
//! ```

mod conceal;
mod decision;
mod evaluator;
#[cfg(test)]
mod evaluator_proptest;
mod filter;
mod predicate;
mod table;

pub use conceal::{conceal, Verdict};
pub use decision::{Decision, DenyReason};
pub use evaluator::{PolicyEvaluator, PolicyRequest};
pub use filter::parse_filter;
pub use predicate::{Predicate, Scope};
pub use table::{PolicyTable, Rule};
