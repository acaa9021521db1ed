//! Existence hiding.
//!
//! A denied get/update/delete must be indistinguishable from a request for a
//! record that does not exist. Create denials are surfaced with their reason
//! since there is no existing record to hide. List decisions pass through:
//! scoping already makes unauthorized rows absent.
//!
//! This is the only place a denial reason is dropped, and it is logged here
//! before it is.

use tracing::debug;

use crate::model::Operation;

use super::decision::{Decision, DenyReason};
use super::predicate::Scope;

/// Outward-facing outcome of a policy decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Carry on with the operation.
    Proceed,
    /// Carry on with a list restricted to `Scope`.
    ProceedScoped(Scope),
    /// Respond exactly as for a missing record.
    NotFound,
    /// Respond with a distinct, non-existence-revealing denial.
    Forbidden(DenyReason),
}

/// Maps an evaluator decision to what the caller may observe.
pub fn conceal(operation: Operation, decision: Decision) -> Verdict {
    match decision {
        Decision::Allow => Verdict::Proceed,
        Decision::AllowWithScope(scope) => Verdict::ProceedScoped(scope),
        Decision::Deny(reason) if operation.is_single_record() => {
            debug!(%operation, %reason, "concealing denial as not-found");
            Verdict::NotFound
        }
        Decision::Deny(reason) => {
            debug!(%operation, %reason, "surfacing denial");
            Verdict::Forbidden(reason)
        }
    }
}
