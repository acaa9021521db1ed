//! RecordStore trait definition.

use async_trait::async_trait;
use relaygate_domain::model::{Collection, Record};
use relaygate_domain::RecordSource;

use crate::error::StorageResult;

/// One mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert or replace a record by id.
    Put(Record),
    /// Remove a record, cascading to records it owns.
    Delete { collection: Collection, id: String },
}

/// Mutations applied atomically by [`RecordStore::commit`].
///
/// Operations apply in order; a reference may point at a record inserted
/// earlier in the same batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, record: Record) -> Self {
        self.ops.push(WriteOp::Put(record));
        self
    }

    pub fn delete(mut self, collection: Collection, id: impl Into<String>) -> Self {
        self.ops.push(WriteOp::Delete {
            collection,
            id: id.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Abstract storage interface for relay records.
///
/// Reads go through snapshots ([`RecordSource`]); writes go through
/// [`commit`](RecordStore::commit), which enforces the (relay, user)
/// uniqueness of membership edges and referential integrity.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations.
#[async_trait]
pub trait RecordStore: RecordSource + Send + Sync + 'static {
    /// Applies `batch` atomically and returns the new version.
    ///
    /// With `expected_version` set, the commit fails with
    /// [`StorageError::VersionConflict`](crate::StorageError::VersionConflict)
    /// if any other write landed since that version was read. Callers that
    /// authorized a write against a snapshot pass the snapshot's version so
    /// the authorization and the write observe the same state.
    async fn commit(&self, expected_version: Option<u64>, batch: WriteBatch)
        -> StorageResult<u64>;

    /// Current store version.
    async fn version(&self) -> u64;
}
