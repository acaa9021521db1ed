//! In-memory record store.
//!
//! State lives in an immutable [`StoreState`] behind an `Arc`. A snapshot
//! clones the `Arc`, so readers keep a consistent view for as long as they
//! hold it. A commit builds the next state from a copy and swaps it in under
//! the write lock; a failing operation discards the copy, leaving the batch
//! unapplied.
//!
//! # Performance Characteristics
//!
//! - **Snapshot**: O(1) (Arc clone under a read lock)
//! - **Fetch by id**: O(log N) (BTreeMap lookup)
//! - **Query / neighbourhood**: O(N) in the collection size (linear scan)
//! - **Commit**: O(N) in the total record count (state copy)

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use relaygate_domain::model::{
    Collection, Lookup, MembershipEdge, Record, Relation, RelayId, Role, UserId,
};
use relaygate_domain::{DomainResult, MembershipGraph, Predicate, RecordSource, Snapshot};

use crate::error::{StorageError, StorageResult};
use crate::traits::{RecordStore, WriteBatch, WriteOp};

/// What happens to a referencing record when its target is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnDelete {
    Cascade,
    Restrict,
    Unset,
}

fn on_delete(referrer: Collection, field: &str) -> OnDelete {
    match (referrer, field) {
        (Collection::UserSettings, "openai_apikey" | "anthropic_apikey") => OnDelete::Unset,
        (Collection::Relay, "creator")
        | (Collection::MembershipEdge, "role")
        | (Collection::Invitation, "role") => OnDelete::Restrict,
        _ => OnDelete::Cascade,
    }
}

/// Outgoing references of a record as (field, target collection, target id).
fn references(record: &Record) -> Vec<(&'static str, Collection, &str)> {
    match record {
        Record::UserSettings(s) => {
            let mut refs = vec![("user", Collection::User, s.user.as_str())];
            if let Some(key) = &s.openai_apikey {
                refs.push(("openai_apikey", Collection::Credential, key.as_str()));
            }
            if let Some(key) = &s.anthropic_apikey {
                refs.push(("anthropic_apikey", Collection::Credential, key.as_str()));
            }
            refs
        }
        Record::Credential(c) => vec![("owner", Collection::User, c.owner.as_str())],
        Record::Subscription(s) => vec![("user", Collection::User, s.user.as_str())],
        Record::Relay(r) => vec![("creator", Collection::User, r.creator.as_str())],
        Record::MembershipEdge(e) => vec![
            ("relay", Collection::Relay, e.relay.as_str()),
            ("user", Collection::User, e.user.as_str()),
            ("role", Collection::Role, e.role.as_str()),
        ],
        Record::Invitation(i) => vec![
            ("relay", Collection::Relay, i.relay.as_str()),
            ("role", Collection::Role, i.role.as_str()),
        ],
        Record::User(_) | Record::Role(_) => Vec::new(),
    }
}

/// One immutable version of the store.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    version: u64,
    tables: HashMap<Collection, BTreeMap<String, Record>>,
    /// Unique index over membership edges: (relay, user) -> edge id.
    edge_pairs: HashMap<(RelayId, UserId), String>,
    /// Unique index over settings: user -> settings id.
    settings_by_user: HashMap<UserId, String>,
}

impl StoreState {
    fn rows(&self, collection: Collection) -> impl Iterator<Item = &Record> {
        self.tables
            .get(&collection)
            .into_iter()
            .flat_map(|table| table.values())
    }

    fn get(&self, collection: Collection, id: &str) -> Option<&Record> {
        self.tables.get(&collection).and_then(|table| table.get(id))
    }

    fn edges(&self) -> impl Iterator<Item = &MembershipEdge> {
        self.rows(Collection::MembershipEdge).filter_map(|r| match r {
            Record::MembershipEdge(edge) => Some(edge),
            _ => None,
        })
    }

    fn apply(&mut self, op: WriteOp) -> StorageResult<()> {
        match op {
            WriteOp::Put(record) => self.put(record),
            WriteOp::Delete { collection, id } => self.delete(collection, &id),
        }
    }

    fn put(&mut self, record: Record) -> StorageResult<()> {
        for (field, target, id) in references(&record) {
            if self.get(target, id).is_none() {
                return Err(StorageError::ForeignKeyViolation {
                    collection: record.collection(),
                    field,
                    id: id.to_string(),
                });
            }
        }

        match &record {
            Record::MembershipEdge(edge) => {
                let pair = (edge.relay.clone(), edge.user.clone());
                if let Some(existing) = self.edge_pairs.get(&pair) {
                    if existing != edge.id.as_str() {
                        return Err(StorageError::UniqueViolation {
                            collection: Collection::MembershipEdge,
                            key: format!("relay {} and user {}", edge.relay, edge.user),
                        });
                    }
                }
                let previous_pair = match self.get(Collection::MembershipEdge, edge.id.as_str()) {
                    Some(Record::MembershipEdge(previous)) => {
                        Some((previous.relay.clone(), previous.user.clone()))
                    }
                    _ => None,
                };
                if let Some(previous_pair) = previous_pair {
                    self.edge_pairs.remove(&previous_pair);
                }
                self.edge_pairs.insert(pair, edge.id.to_string());
            }
            Record::UserSettings(settings) => {
                if let Some(existing) = self.settings_by_user.get(&settings.user) {
                    if existing != settings.id.as_str() {
                        return Err(StorageError::UniqueViolation {
                            collection: Collection::UserSettings,
                            key: format!("user {}", settings.user),
                        });
                    }
                }
                let previous_user = match self.get(Collection::UserSettings, settings.id.as_str()) {
                    Some(Record::UserSettings(previous)) => Some(previous.user.clone()),
                    _ => None,
                };
                if let Some(previous_user) = previous_user {
                    self.settings_by_user.remove(&previous_user);
                }
                self.settings_by_user
                    .insert(settings.user.clone(), settings.id.to_string());
            }
            _ => {}
        }

        self.tables
            .entry(record.collection())
            .or_default()
            .insert(record.id().to_string(), record);
        Ok(())
    }

    fn delete(&mut self, collection: Collection, id: &str) -> StorageResult<()> {
        let removed = self
            .tables
            .get_mut(&collection)
            .and_then(|table| table.remove(id))
            .ok_or_else(|| StorageError::NotFound {
                collection,
                id: id.to_string(),
            })?;
        match &removed {
            Record::MembershipEdge(edge) => {
                self.edge_pairs
                    .remove(&(edge.relay.clone(), edge.user.clone()));
            }
            Record::UserSettings(settings) => {
                self.settings_by_user.remove(&settings.user);
            }
            _ => {}
        }

        for (referrer, field) in self.referrers(collection, id) {
            match on_delete(referrer.collection(), field) {
                OnDelete::Restrict => {
                    return Err(StorageError::ForeignKeyViolation {
                        collection: referrer.collection(),
                        field,
                        id: id.to_string(),
                    });
                }
                OnDelete::Cascade => {
                    // An earlier cascade may already have taken it.
                    if self.get(referrer.collection(), referrer.id()).is_some() {
                        debug!(
                            collection = %referrer.collection(),
                            id = referrer.id(),
                            "cascading delete"
                        );
                        self.delete(referrer.collection(), referrer.id())?;
                    }
                }
                OnDelete::Unset => {
                    let current = self
                        .tables
                        .get_mut(&Collection::UserSettings)
                        .and_then(|table| table.get_mut(referrer.id()));
                    if let Some(Record::UserSettings(settings)) = current {
                        match field {
                            "openai_apikey" => settings.openai_apikey = None,
                            _ => settings.anthropic_apikey = None,
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Records holding a reference to (collection, id), with the field.
    fn referrers(&self, collection: Collection, id: &str) -> Vec<(Record, &'static str)> {
        self.tables
            .values()
            .flat_map(|table| table.values())
            .flat_map(|record| {
                references(record)
                    .into_iter()
                    .filter(|(_, target, target_id)| *target == collection && *target_id == id)
                    .map(|(field, _, _)| (record.clone(), field))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// A consistent read view over one [`StoreState`].
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    state: Arc<StoreState>,
}

#[async_trait]
impl Snapshot for MemorySnapshot {
    fn version(&self) -> u64 {
        self.state.version
    }

    async fn roles(&self) -> DomainResult<Vec<Role>> {
        Ok(self
            .state
            .rows(Collection::Role)
            .filter_map(|r| match r {
                Record::Role(role) => Some(role.clone()),
                _ => None,
            })
            .collect())
    }

    async fn membership_neighbourhood(&self, user: &UserId) -> DomainResult<Vec<MembershipEdge>> {
        let relays: HashSet<&RelayId> = self
            .state
            .edges()
            .filter(|edge| &edge.user == user)
            .map(|edge| &edge.relay)
            .collect();
        Ok(self
            .state
            .edges()
            .filter(|edge| relays.contains(&edge.relay))
            .cloned()
            .collect())
    }

    async fn fetch(&self, collection: Collection, id: &str) -> DomainResult<Option<Record>> {
        Ok(self.state.get(collection, id).cloned())
    }

    async fn fetch_related(
        &self,
        parent: &Record,
        relation: Relation,
    ) -> DomainResult<Vec<Record>> {
        let target = relation.target();
        let related = match relation.lookup(parent) {
            Some(Lookup::Id(id)) => self.state.get(target, &id).cloned().into_iter().collect(),
            Some(Lookup::Field { field, value }) => self
                .state
                .rows(target)
                .filter(|r| r.field(field) == Some(value.as_str()))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(related)
    }

    async fn query(
        &self,
        collection: Collection,
        predicate: &Predicate,
        graph: &MembershipGraph,
    ) -> DomainResult<Vec<Record>> {
        Ok(self
            .state
            .rows(collection)
            .filter(|r| predicate.matches(r, graph))
            .cloned()
            .collect())
    }
}

/// In-memory implementation of RecordStore.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: RwLock<Arc<StoreState>>,
}

impl MemoryRecordStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl RecordSource for MemoryRecordStore {
    type Snapshot = MemorySnapshot;

    async fn snapshot(&self) -> DomainResult<MemorySnapshot> {
        let state = Arc::clone(&*self.state.read().await);
        Ok(MemorySnapshot { state })
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    #[instrument(skip(self, batch), fields(ops = batch.len()))]
    async fn commit(
        &self,
        expected_version: Option<u64>,
        batch: WriteBatch,
    ) -> StorageResult<u64> {
        let mut guard = self.state.write().await;
        if let Some(expected) = expected_version {
            if guard.version != expected {
                return Err(StorageError::VersionConflict {
                    expected,
                    actual: guard.version,
                });
            }
        }
        if batch.is_empty() {
            return Ok(guard.version);
        }

        let mut next = StoreState::clone(&guard);
        for op in batch {
            next.apply(op)?;
        }
        next.version += 1;
        let version = next.version;
        *guard = Arc::new(next);
        debug!(version, "committed");
        Ok(version)
    }

    async fn version(&self) -> u64 {
        self.state.read().await.version
    }
}
