//! Applies the policy table to one request.

use tracing::trace;

use crate::error::{DomainError, DomainResult};
use crate::membership::MembershipGraph;
use crate::model::{Collection, Operation, Principal, Record};

use super::decision::Decision;
use super::table::PolicyTable;

/// A request to evaluate.
///
/// `target` is the existing record for get/update/delete and the proposed
/// record for create. It is ignored for list.
#[derive(Debug, Clone, Copy)]
pub struct PolicyRequest<'a> {
    pub principal: &'a Principal,
    pub collection: Collection,
    pub operation: Operation,
    pub target: Option<&'a Record>,
}

impl<'a> PolicyRequest<'a> {
    pub fn list(principal: &'a Principal, collection: Collection) -> Self {
        Self {
            principal,
            collection,
            operation: Operation::List,
            target: None,
        }
    }

    pub fn on(principal: &'a Principal, operation: Operation, target: &'a Record) -> Self {
        Self {
            principal,
            collection: target.collection(),
            operation,
            target: Some(target),
        }
    }
}

/// Policy evaluator.
///
/// Decisions are pure functions of (principal, collection, operation, target,
/// membership graph); evaluating the same inputs twice yields the same result.
#[derive(Debug, Clone, Default)]
pub struct PolicyEvaluator {
    table: PolicyTable,
}

impl PolicyEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates a request.
    ///
    /// List operations always produce [`Decision::AllowWithScope`]; every
    /// other operation produces [`Decision::Allow`] or [`Decision::Deny`] for
    /// the whole record.
    pub fn evaluate(
        &self,
        request: &PolicyRequest<'_>,
        graph: &MembershipGraph,
    ) -> DomainResult<Decision> {
        let rule = self.table.rule(request.collection, request.operation);

        if request.operation == Operation::List {
            let scope = rule.scope(request.principal);
            trace!(
                principal = %request.principal,
                collection = %request.collection,
                ?scope,
                "list scoped"
            );
            return Ok(Decision::AllowWithScope(scope));
        }

        let target = request.target.ok_or(DomainError::MissingTarget {
            collection: request.collection,
            operation: request.operation,
        })?;
        if target.collection() != request.collection {
            return Err(DomainError::CollectionMismatch {
                expected: request.collection,
                actual: target.collection(),
            });
        }

        let decision = match rule.check(request.principal, target, graph) {
            Ok(()) => Decision::Allow,
            Err(reason) => Decision::Deny(reason),
        };
        trace!(
            principal = %request.principal,
            collection = %request.collection,
            operation = %request.operation,
            target = target.id(),
            ?decision,
            "evaluated"
        );
        Ok(decision)
    }

    /// Whether `principal` may read `record`. Used when masking expanded
    /// records.
    pub fn can_get(
        &self,
        principal: &Principal,
        record: &Record,
        graph: &MembershipGraph,
    ) -> bool {
        self.table
            .rule(record.collection(), Operation::Get)
            .check(principal, record, graph)
            .is_ok()
    }
}
