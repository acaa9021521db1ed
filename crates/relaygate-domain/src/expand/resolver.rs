//! Expand resolver.
//!
//! Walks an [`ExpandTree`] from an already-authorized root record, fetching
//! each hop from the request's snapshot and attaching only the records the
//! principal may read. Masking runs post-order: a hop's children are resolved
//! first and then filtered, so a masked node is dropped together with its
//! resolved subtree and a denial deep in the tree never fails the response.
//!
//! Relations into sensitive collections are pruned before fetching unless the
//! parent record is owned by the principal: a credential reached through a
//! co-member's settings is never loaded, let alone returned.

use std::future::Future;
use std::pin::Pin;

use futures::future::try_join_all;
use tracing::{debug, trace};

use crate::error::{DomainError, DomainResult};
use crate::membership::MembershipGraph;
use crate::model::{Cardinality, Principal, Record, Relation};
use crate::policy::PolicyEvaluator;
use crate::source::Snapshot;

use super::config::ExpandConfig;
use super::tree::{ExpandTree, ExpandedRecord, Expansion};

/// Type alias for boxed futures used in recursive resolution.
type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Borrowed per-request state shared by every hop.
struct Walk<'a, S: ?Sized> {
    snapshot: &'a S,
    principal: &'a Principal,
    graph: &'a MembershipGraph,
}

/// Resolves expand requests with per-node masking.
#[derive(Debug, Clone, Default)]
pub struct ExpandResolver {
    evaluator: PolicyEvaluator,
    config: ExpandConfig,
}

impl ExpandResolver {
    pub fn new(config: ExpandConfig) -> Self {
        Self {
            evaluator: PolicyEvaluator::new(),
            config,
        }
    }

    pub fn config(&self) -> &ExpandConfig {
        &self.config
    }

    /// Expands `root`, which the caller has already authorized.
    ///
    /// `graph` must be built from `snapshot` for `principal`.
    pub async fn resolve<S>(
        &self,
        snapshot: &S,
        principal: &Principal,
        graph: &MembershipGraph,
        root: Record,
        tree: &ExpandTree,
    ) -> DomainResult<ExpandedRecord>
    where
        S: Snapshot + ?Sized,
    {
        self.check_depth(tree)?;
        let walk = Walk {
            snapshot,
            principal,
            graph,
        };
        self.resolve_node(&walk, root, tree, 0).await
    }

    /// Expands every record of a list result concurrently.
    pub async fn resolve_all<S>(
        &self,
        snapshot: &S,
        principal: &Principal,
        graph: &MembershipGraph,
        roots: Vec<Record>,
        tree: &ExpandTree,
    ) -> DomainResult<Vec<ExpandedRecord>>
    where
        S: Snapshot + ?Sized,
    {
        if tree.is_empty() {
            return Ok(roots.into_iter().map(ExpandedRecord::bare).collect());
        }
        self.check_depth(tree)?;
        let walk = Walk {
            snapshot,
            principal,
            graph,
        };
        try_join_all(
            roots
                .into_iter()
                .map(|root| self.resolve_node(&walk, root, tree, 0)),
        )
        .await
    }

    fn check_depth(&self, tree: &ExpandTree) -> DomainResult<()> {
        if tree.depth() > self.config.max_depth {
            return Err(DomainError::ExpandDepthExceeded {
                max_depth: self.config.max_depth,
            });
        }
        Ok(())
    }

    fn resolve_node<'a, S>(
        &'a self,
        walk: &'a Walk<'a, S>,
        record: Record,
        tree: &'a ExpandTree,
        depth: u32,
    ) -> BoxFuture<'a, DomainResult<ExpandedRecord>>
    where
        S: Snapshot + ?Sized,
    {
        Box::pin(async move {
            if tree.is_empty() {
                return Ok(ExpandedRecord::bare(record));
            }
            if depth >= self.config.max_depth {
                return Err(DomainError::ExpandDepthExceeded {
                    max_depth: self.config.max_depth,
                });
            }

            let source = record.collection();
            let mut hops = Vec::new();
            for (name, subtree) in tree.children() {
                let Some(relation) = Relation::parse(source, name) else {
                    debug!(%source, relation = name, "ignoring unknown expand relation");
                    continue;
                };
                if relation.is_sensitive() && !record.owner().is_some_and(|o| walk.principal.is(o))
                {
                    trace!(%relation, parent = record.id(), "pruned sensitive relation");
                    continue;
                }
                hops.push(self.resolve_hop(walk, &record, relation, subtree, depth));
            }
            let resolved = try_join_all(hops).await?;

            let mut expanded = ExpandedRecord::bare(record);
            for (relation, expansion) in resolved.into_iter().flatten() {
                expanded.expand.insert(relation.name().to_string(), expansion);
            }
            Ok(expanded)
        })
    }

    /// Follows one relation from `parent`. `None` when nothing visible is
    /// reached, in which case the key is omitted from the output.
    async fn resolve_hop<'a, S>(
        &'a self,
        walk: &'a Walk<'a, S>,
        parent: &Record,
        relation: Relation,
        subtree: &'a ExpandTree,
        depth: u32,
    ) -> DomainResult<Option<(Relation, Expansion)>>
    where
        S: Snapshot + ?Sized,
    {
        let related = walk.snapshot.fetch_related(parent, relation).await?;

        let resolved = try_join_all(
            related
                .into_iter()
                .map(|child| self.resolve_node(walk, child, subtree, depth + 1)),
        )
        .await?;
        let fetched = resolved.len();

        let mut children: Vec<ExpandedRecord> = resolved
            .into_iter()
            .filter(|child| {
                self.evaluator
                    .can_get(walk.principal, &child.record, walk.graph)
            })
            .collect();
        if children.len() < fetched {
            trace!(
                %relation,
                parent = parent.id(),
                masked = fetched - children.len(),
                "masked expanded records"
            );
        }

        let expansion = match relation.cardinality() {
            Cardinality::One if children.is_empty() => return Ok(None),
            Cardinality::One => Expansion::One(Box::new(children.swap_remove(0))),
            Cardinality::Many if children.is_empty() => return Ok(None),
            Cardinality::Many => Expansion::Many(children),
        };
        Ok(Some((relation, expansion)))
    }
}
