//! Read-only view over active membership edges.
//!
//! A [`MembershipGraph`] is built from edges read out of one data-source
//! snapshot and is never mutated afterwards. Evaluating a request against a
//! graph built from the same snapshot that serves the data fetch closes the
//! gap between authorization check and use.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::error::{DomainError, DomainResult};
use crate::model::{MembershipEdge, Rank, RelayId, Role, RoleId, UserId};

/// Membership relation indexed by user and by relay.
#[derive(Debug, Clone, Default)]
pub struct MembershipGraph {
    by_user: HashMap<UserId, HashMap<RelayId, Rank>>,
    by_relay: HashMap<RelayId, HashMap<UserId, Rank>>,
}

impl MembershipGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from membership edges, resolving each edge's role to
    /// its rank.
    ///
    /// The store guarantees one edge per (relay, user) pair. If a snapshot
    /// nevertheless carries two, the higher rank wins and a warning is logged.
    pub fn build<'a>(
        edges: impl IntoIterator<Item = &'a MembershipEdge>,
        roles: impl IntoIterator<Item = &'a Role>,
    ) -> DomainResult<Self> {
        let ranks: HashMap<&RoleId, Rank> = roles.into_iter().map(|r| (&r.id, r.rank)).collect();
        let mut graph = Self::new();

        for edge in edges {
            let rank = *ranks
                .get(&edge.role)
                .ok_or_else(|| DomainError::UnknownRole {
                    edge_id: edge.id.to_string(),
                    role_id: edge.role.to_string(),
                })?;
            graph.insert(edge, rank);
        }

        Ok(graph)
    }

    fn insert(&mut self, edge: &MembershipEdge, rank: Rank) {
        let slot = self
            .by_user
            .entry(edge.user.clone())
            .or_default()
            .entry(edge.relay.clone())
            .or_insert(rank);
        if *slot != rank {
            warn!(
                relay = %edge.relay,
                user = %edge.user,
                "duplicate membership edge in snapshot; keeping highest rank"
            );
            *slot = (*slot).max(rank);
        }
        let effective = *slot;
        self.by_relay
            .entry(edge.relay.clone())
            .or_default()
            .insert(edge.user.clone(), effective);
    }

    /// All relays on which `user` holds any rank.
    pub fn relays_visible_to(&self, user: &UserId) -> HashSet<RelayId> {
        self.by_user
            .get(user)
            .map(|relays| relays.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The rank `user` holds on `relay`, if any.
    pub fn rank_of(&self, user: &UserId, relay: &RelayId) -> Option<Rank> {
        self.by_user
            .get(user)
            .and_then(|relays| relays.get(relay))
            .copied()
    }

    /// All users holding any rank on `relay`.
    pub fn co_members(&self, relay: &RelayId) -> HashSet<UserId> {
        self.by_relay
            .get(relay)
            .map(|users| users.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `a` and `b` hold ranks on at least one common relay.
    pub fn shares_relay(&self, a: &UserId, b: &UserId) -> bool {
        let Some(relays) = self.by_user.get(a) else {
            return false;
        };
        relays.keys().any(|relay| {
            self.by_relay
                .get(relay)
                .is_some_and(|users| users.contains_key(b))
        })
    }

    /// Number of relays on which `user` holds exactly `rank`.
    pub fn count_with_rank(&self, user: &UserId, rank: Rank) -> usize {
        self.by_user
            .get(user)
            .map(|relays| relays.values().filter(|r| **r == rank).count())
            .unwrap_or(0)
    }

    /// Number of users holding any rank on `relay`.
    pub fn member_count(&self, relay: &RelayId) -> usize {
        self.by_relay.get(relay).map_or(0, HashMap::len)
    }

    /// Number of users holding exactly `rank` on `relay`.
    pub fn holders_of(&self, relay: &RelayId, rank: Rank) -> usize {
        self.by_relay
            .get(relay)
            .map(|users| users.values().filter(|r| **r == rank).count())
            .unwrap_or(0)
    }
}
