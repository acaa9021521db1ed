//! Evaluator outcomes.

use std::fmt;

use serde::Serialize;

use super::predicate::Scope;

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    /// No membership edge ties the principal to the relay or resource.
    NotAMember,
    /// An edge exists but its rank is too low for the operation.
    InsufficientRank,
    /// The sensitive resource is not owned by the principal.
    NotSelf,
    /// The collection is not writable through this engine.
    ReadOnly,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::NotAMember => "not-a-member",
            DenyReason::InsufficientRank => "insufficient-rank",
            DenyReason::NotSelf => "not-self",
            DenyReason::ReadOnly => "read-only",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Result of evaluating one request against the policy table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The whole record (or the create) is allowed.
    Allow,
    /// A list is allowed, restricted to rows the scope admits.
    AllowWithScope(Scope),
    /// The request is denied.
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Deny(_))
    }
}
