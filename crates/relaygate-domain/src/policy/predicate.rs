//! Row predicates handed to the external query layer.
//!
//! A list request never produces per-row denials. The evaluator returns a
//! [`Scope`], the caller conjoins it with any user filter into a
//! [`Predicate`], and the query layer evaluates that predicate against the
//! same snapshot it reads rows from.

use crate::membership::MembershipGraph;
use crate::model::{Rank, Record, UserId};

/// Authorization scope for a list operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every row.
    Everything,
    /// No row.
    Nothing,
    /// The user's own row and rows of users sharing a relay with it.
    SelfOrCoMembers(UserId),
    /// Rows owned by the user.
    OwnedBy(UserId),
    /// Rows whose relay the user holds at least `min` rank on.
    RelayRank { user: UserId, min: Rank },
}

impl Scope {
    /// Whether this scope admits `record` under `graph`.
    pub fn admits(&self, record: &Record, graph: &MembershipGraph) -> bool {
        match self {
            Scope::Everything => true,
            Scope::Nothing => false,
            Scope::SelfOrCoMembers(user) => match record.owner() {
                Some(owner) => owner == user || graph.shares_relay(user, owner),
                None => false,
            },
            Scope::OwnedBy(user) => record.owner() == Some(user),
            Scope::RelayRank { user, min } => record
                .relay_id()
                .and_then(|relay| graph.rank_of(user, relay))
                .is_some_and(|rank| rank >= *min),
        }
    }
}

/// A boolean predicate over records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Authorization scope.
    Scope(Scope),
    /// `field == value`.
    FieldEq { field: String, value: String },
    /// Conjunction; an empty conjunction is true.
    And(Vec<Predicate>),
}

impl Predicate {
    /// A predicate matching every record.
    pub fn always() -> Self {
        Predicate::And(Vec::new())
    }

    pub fn field_eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::FieldEq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Conjoins two predicates, flattening nested conjunctions.
    pub fn and(self, other: Predicate) -> Predicate {
        let mut terms = match self {
            Predicate::And(terms) => terms,
            single => vec![single],
        };
        match other {
            Predicate::And(more) => terms.extend(more),
            single => terms.push(single),
        }
        Predicate::And(terms)
    }

    /// Conjoins a scope with an optional user filter.
    pub fn scoped(scope: Scope, filter: Option<Predicate>) -> Predicate {
        let scoped = Predicate::Scope(scope);
        match filter {
            Some(filter) => scoped.and(filter),
            None => scoped,
        }
    }

    /// Evaluates the predicate against one record.
    pub fn matches(&self, record: &Record, graph: &MembershipGraph) -> bool {
        match self {
            Predicate::Scope(scope) => scope.admits(record, graph),
            Predicate::FieldEq { field, value } => record.field(field) == Some(value.as_str()),
            Predicate::And(terms) => terms.iter().all(|t| t.matches(record, graph)),
        }
    }

    /// Field names referenced by this predicate.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Predicate::Scope(_) => Vec::new(),
            Predicate::FieldEq { field, .. } => vec![field.as_str()],
            Predicate::And(terms) => terms.iter().flat_map(Predicate::fields).collect(),
        }
    }
}
