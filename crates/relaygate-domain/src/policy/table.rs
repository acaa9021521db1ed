//! Fixed (collection, operation) -> rule mapping.

use crate::membership::MembershipGraph;
use crate::model::{Collection, Operation, Principal, Rank, Record};

use super::decision::DenyReason;
use super::predicate::Scope;

/// A decision rule over (principal, target record, membership graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Any authenticated principal.
    Public,
    /// The target user is the principal or shares a relay with them.
    SelfOrCoMember,
    /// The target is owned by the principal.
    SelfOnly,
    /// The principal holds at least `Rank` on the target's relay.
    RelayRank(Rank),
    /// `owner` on the target's relay, or the target edge is the principal's own.
    RelayOwnerOrSelf,
    /// Not writable through this engine.
    ReadOnly,
}

impl Rule {
    /// Checks a single target record against this rule.
    pub fn check(
        &self,
        principal: &Principal,
        target: &Record,
        graph: &MembershipGraph,
    ) -> Result<(), DenyReason> {
        match self {
            Rule::Public => Ok(()),
            Rule::ReadOnly => Err(DenyReason::ReadOnly),
            Rule::SelfOnly => match target.owner() {
                Some(owner) if principal.is(owner) => Ok(()),
                _ => Err(DenyReason::NotSelf),
            },
            Rule::SelfOrCoMember => match target.owner() {
                Some(user) if principal.is(user) => Ok(()),
                Some(user) if graph.shares_relay(principal.user_id(), user) => Ok(()),
                _ => Err(DenyReason::NotAMember),
            },
            Rule::RelayRank(required) => check_rank(principal, target, graph, *required),
            Rule::RelayOwnerOrSelf => match target {
                Record::MembershipEdge(edge) if principal.is(&edge.user) => Ok(()),
                _ => check_rank(principal, target, graph, Rank::Owner),
            },
        }
    }

    /// Row-scoping predicate equivalent to this rule for list operations.
    pub fn scope(&self, principal: &Principal) -> Scope {
        let user = principal.user_id().clone();
        match self {
            Rule::Public => Scope::Everything,
            Rule::SelfOrCoMember => Scope::SelfOrCoMembers(user),
            Rule::SelfOnly => Scope::OwnedBy(user),
            Rule::RelayRank(min) => Scope::RelayRank { user, min: *min },
            Rule::RelayOwnerOrSelf | Rule::ReadOnly => Scope::Nothing,
        }
    }
}

fn check_rank(
    principal: &Principal,
    target: &Record,
    graph: &MembershipGraph,
    required: Rank,
) -> Result<(), DenyReason> {
    let Some(relay) = target.relay_id() else {
        return Err(DenyReason::NotAMember);
    };
    match graph.rank_of(principal.user_id(), relay) {
        None => Err(DenyReason::NotAMember),
        Some(rank) if rank < required => Err(DenyReason::InsufficientRank),
        Some(_) => Ok(()),
    }
}

/// The policy table. Stateless; the mapping is fixed at compile time.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyTable;

impl PolicyTable {
    pub fn new() -> Self {
        Self
    }

    /// Returns the rule governing `operation` on `collection`.
    pub fn rule(&self, collection: Collection, operation: Operation) -> Rule {
        use Collection as C;
        use Operation as O;

        match (collection, operation) {
            (C::User, O::List | O::Get) => Rule::SelfOrCoMember,
            (C::User, O::Update) => Rule::SelfOnly,
            (C::User, O::Create | O::Delete) => Rule::ReadOnly,

            (C::UserSettings | C::Credential | C::Subscription, _) => Rule::SelfOnly,

            (C::Relay, O::List | O::Get) => Rule::RelayRank(Rank::Member),
            (C::Relay, O::Create) => Rule::Public,
            (C::Relay, O::Update | O::Delete) => Rule::RelayRank(Rank::Owner),

            (C::MembershipEdge, O::List | O::Get) => Rule::RelayRank(Rank::Member),
            (C::MembershipEdge, O::Create | O::Update) => Rule::RelayRank(Rank::Owner),
            (C::MembershipEdge, O::Delete) => Rule::RelayOwnerOrSelf,

            (C::Role, O::List | O::Get) => Rule::Public,
            (C::Role, O::Create | O::Update | O::Delete) => Rule::ReadOnly,

            (C::Invitation, _) => Rule::RelayRank(Rank::Owner),
        }
    }
}
