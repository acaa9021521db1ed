//! Read interface the external data layer implements.
//!
//! Every request is served from one [`Snapshot`]: the membership graph, the
//! target fetch, list queries and expand hops all read the same consistent
//! state, so an edge revoked mid-request cannot open a window between the
//! authorization check and the data it authorizes.

use async_trait::async_trait;

use crate::error::DomainResult;
use crate::membership::MembershipGraph;
use crate::model::{Collection, MembershipEdge, Principal, Record, Relation, Role, UserId};
use crate::policy::Predicate;

/// A consistent, read-only view of the data layer.
#[async_trait]
pub trait Snapshot: Send + Sync {
    /// Monotonic version of the state this snapshot reflects.
    fn version(&self) -> u64;

    /// All roles (reference data).
    async fn roles(&self) -> DomainResult<Vec<Role>>;

    /// Every edge on any relay `user` holds an edge on, including the user's
    /// own edges. This is sufficient to answer every membership question the
    /// policy table asks about `user`.
    async fn membership_neighbourhood(&self, user: &UserId) -> DomainResult<Vec<MembershipEdge>>;

    /// Fetches one record by id.
    async fn fetch(&self, collection: Collection, id: &str) -> DomainResult<Option<Record>>;

    /// Follows `relation` from `parent`.
    async fn fetch_related(&self, parent: &Record, relation: Relation)
        -> DomainResult<Vec<Record>>;

    /// Returns the rows of `collection` matching `predicate`, evaluating
    /// scope terms against `graph`.
    async fn query(
        &self,
        collection: Collection,
        predicate: &Predicate,
        graph: &MembershipGraph,
    ) -> DomainResult<Vec<Record>>;
}

/// Source of snapshots.
#[async_trait]
pub trait RecordSource: Send + Sync {
    type Snapshot: Snapshot + 'static;

    /// Opens a consistent read snapshot.
    async fn snapshot(&self) -> DomainResult<Self::Snapshot>;
}

/// Builds the membership graph for `principal` from `snapshot`.
pub async fn membership_graph<S>(snapshot: &S, principal: &Principal) -> DomainResult<MembershipGraph>
where
    S: Snapshot + ?Sized,
{
    let roles = snapshot.roles().await?;
    let edges = snapshot
        .membership_neighbourhood(principal.user_id())
        .await?;
    MembershipGraph::build(&edges, &roles)
}
