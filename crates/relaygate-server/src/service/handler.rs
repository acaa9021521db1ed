//! Policy service read path and shared write plumbing.

use std::sync::Arc;

use relaygate_domain::model::{
    Collection, Operation, Principal, Rank, Record, Relay, RelayId, Role, UserId,
};
use relaygate_domain::{
    conceal, membership_graph, parse_filter, ExpandConfig, ExpandResolver, ExpandTree,
    ExpandedRecord, MembershipGraph, PolicyEvaluator, PolicyRequest, Predicate, Snapshot,
    Verdict,
};
use relaygate_storage::{RecordStore, StorageError, WriteBatch};
use tracing::{debug, instrument};

use crate::config::ServerConfig;
use crate::error::{ServiceError, ServiceResult};

use super::types::ServiceConfig;

/// Serves every operation on the relay collections for an explicit principal.
///
/// Each attempt at a request reads one snapshot: the membership graph, the
/// target fetch, list queries and expand hops all see the same state. Writes
/// are committed against that snapshot's version and re-run from a fresh
/// snapshot when another write lands first.
pub struct PolicyService<S>
where
    S: RecordStore,
{
    pub(super) store: Arc<S>,
    pub(super) evaluator: PolicyEvaluator,
    pub(super) resolver: ExpandResolver,
    pub(super) config: ServiceConfig,
}

impl<S> PolicyService<S>
where
    S: RecordStore,
{
    /// Creates a service over `store`.
    pub fn new(store: Arc<S>, config: ServiceConfig) -> Self {
        let resolver =
            ExpandResolver::new(ExpandConfig::default().with_max_depth(config.max_expand_depth));
        Self {
            store,
            evaluator: PolicyEvaluator::new(),
            resolver,
            config,
        }
    }

    /// Creates a service from loaded server configuration.
    pub fn from_config(store: Arc<S>, config: &ServerConfig) -> Self {
        Self::new(store, ServiceConfig::from(config))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Lists the records of `collection` visible to `principal`.
    ///
    /// `filter` narrows the authorized rows; it never widens them. Denials
    /// never fail a list: rows outside the principal's scope are simply
    /// absent.
    #[instrument(skip_all, fields(principal = %principal, %collection))]
    pub async fn list(
        &self,
        principal: &Principal,
        collection: Collection,
        filter: Option<&str>,
        expand: Option<&str>,
    ) -> ServiceResult<Vec<ExpandedRecord>> {
        let filter = match filter {
            Some(input) => parse_filter(collection, input)?,
            None => None,
        };
        let tree = self.expand_tree(expand)?;
        let (snapshot, graph) = self.view(principal).await?;

        let request = PolicyRequest::list(principal, collection);
        let scope = match conceal(Operation::List, self.evaluator.evaluate(&request, &graph)?) {
            Verdict::ProceedScoped(scope) => scope,
            other => return Err(unexpected(Operation::List, &other)),
        };
        let rows = snapshot
            .query(collection, &Predicate::scoped(scope, filter), &graph)
            .await?;
        debug!(rows = rows.len(), "list resolved");

        Ok(self
            .resolver
            .resolve_all(&snapshot, principal, &graph, rows, &tree)
            .await?)
    }

    /// Fetches one record. A record the principal may not read is reported
    /// exactly as a missing one.
    #[instrument(skip_all, fields(principal = %principal, %collection, id = %id))]
    pub async fn get(
        &self,
        principal: &Principal,
        collection: Collection,
        id: &str,
        expand: Option<&str>,
    ) -> ServiceResult<ExpandedRecord> {
        let tree = self.expand_tree(expand)?;
        let (snapshot, graph) = self.view(principal).await?;
        let record = self
            .authorize_existing(&snapshot, &graph, principal, Operation::Get, collection, id)
            .await?;

        Ok(self
            .resolver
            .resolve(&snapshot, principal, &graph, record, &tree)
            .await?)
    }

    fn expand_tree(&self, expand: Option<&str>) -> ServiceResult<ExpandTree> {
        match expand {
            Some(input) => Ok(ExpandTree::parse(input, self.config.max_expand_depth)?),
            None => Ok(ExpandTree::empty()),
        }
    }

    /// Opens a snapshot and builds the principal's membership graph from it.
    pub(super) async fn view(
        &self,
        principal: &Principal,
    ) -> ServiceResult<(S::Snapshot, MembershipGraph)> {
        let snapshot = self.store.snapshot().await?;
        let graph = membership_graph(&snapshot, principal).await?;
        Ok((snapshot, graph))
    }

    /// Fetches `collection/id` and runs the single-record rule for
    /// `operation` on it. Missing and concealed records fail identically.
    pub(super) async fn authorize_existing(
        &self,
        snapshot: &S::Snapshot,
        graph: &MembershipGraph,
        principal: &Principal,
        operation: Operation,
        collection: Collection,
        id: &str,
    ) -> ServiceResult<Record> {
        let record = snapshot
            .fetch(collection, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(collection, id))?;

        let request = PolicyRequest::on(principal, operation, &record);
        match conceal(operation, self.evaluator.evaluate(&request, graph)?) {
            Verdict::Proceed => Ok(record),
            Verdict::NotFound => Err(ServiceError::not_found(collection, id)),
            Verdict::Forbidden(reason) => Err(ServiceError::Forbidden { reason }),
            other => Err(unexpected(operation, &other)),
        }
    }

    /// Runs the create rule on a proposed record.
    pub(super) fn authorize_create(
        &self,
        graph: &MembershipGraph,
        principal: &Principal,
        proposed: &Record,
    ) -> ServiceResult<()> {
        let request = PolicyRequest::on(principal, Operation::Create, proposed);
        match conceal(Operation::Create, self.evaluator.evaluate(&request, graph)?) {
            Verdict::Proceed => Ok(()),
            Verdict::Forbidden(reason) => Err(ServiceError::Forbidden { reason }),
            other => Err(unexpected(Operation::Create, &other)),
        }
    }

    /// Loads a relay the principal holds an edge on. Relays the principal
    /// cannot see are reported as missing.
    pub(super) async fn visible_relay(
        &self,
        snapshot: &S::Snapshot,
        graph: &MembershipGraph,
        principal: &Principal,
        relay_id: &RelayId,
    ) -> ServiceResult<Relay> {
        let not_found = || ServiceError::not_found(Collection::Relay, relay_id.as_str());
        match snapshot.fetch(Collection::Relay, relay_id.as_str()).await? {
            Some(Record::Relay(relay)) if graph.rank_of(principal.user_id(), &relay.id).is_some() => {
                Ok(relay)
            }
            Some(_) => {
                debug!(relay = %relay_id, "concealing relay from non-member");
                Err(not_found())
            }
            None => Err(not_found()),
        }
    }

    /// Number of relays `user` holds owner rank on, counted from `snapshot`.
    /// Works for any user, not just the principal whose graph was built.
    pub(super) async fn owned_relays(
        &self,
        snapshot: &S::Snapshot,
        roles: &[Role],
        user: &UserId,
    ) -> ServiceResult<usize> {
        let edges = snapshot.membership_neighbourhood(user).await?;
        let graph = MembershipGraph::build(&edges, roles)?;
        Ok(graph.count_with_rank(user, Rank::Owner))
    }

    /// Fails with `LimitExceeded` if `user` may not take owner rank on one
    /// more relay.
    pub(super) async fn check_owned_limit(
        &self,
        snapshot: &S::Snapshot,
        roles: &[Role],
        user: &UserId,
    ) -> ServiceResult<()> {
        let owned = self.owned_relays(snapshot, roles, user).await?;
        if owned >= self.config.max_owned_relays as usize {
            return Err(ServiceError::LimitExceeded {
                message: format!(
                    "user {user} already owns {owned} relays (max: {})",
                    self.config.max_owned_relays
                ),
            });
        }
        Ok(())
    }

    /// Commits `batch` against the snapshot version it was prepared from.
    /// Returns the new version, or `None` when another write landed first
    /// and the caller should retry from a fresh snapshot.
    #[instrument(skip(self, batch), fields(ops = batch.len()))]
    pub(super) async fn try_commit(
        &self,
        prepared_at: u64,
        batch: WriteBatch,
        attempt: u32,
    ) -> ServiceResult<Option<u64>> {
        match self.store.commit(Some(prepared_at), batch).await {
            Ok(version) => Ok(Some(version)),
            Err(StorageError::VersionConflict { expected, actual }) => {
                debug!(expected, actual, "write lost commit race, retrying");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub(super) fn retries_exhausted(&self) -> ServiceError {
        ServiceError::Conflict {
            message: format!(
                "write lost {} consecutive commit races",
                self.config.max_write_attempts
            ),
        }
    }
}

/// Looks up the role holding `rank`. Roles are reference data; a missing
/// one means the store was never seeded.
pub(super) fn role_with_rank(roles: &[Role], rank: Rank) -> ServiceResult<&Role> {
    roles
        .iter()
        .filter(|role| role.rank == rank)
        .min_by(|a, b| a.id.as_str().cmp(b.id.as_str()))
        .ok_or_else(|| ServiceError::Internal {
            message: format!("no role with rank {rank} is defined"),
        })
}

fn unexpected(operation: Operation, verdict: &Verdict) -> ServiceError {
    ServiceError::Internal {
        message: format!("unexpected verdict {verdict:?} for {operation}"),
    }
}
