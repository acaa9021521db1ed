//! Storage error types.

use relaygate_domain::model::Collection;
use relaygate_domain::DomainError;
use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Record not found.
    #[error("record not found: {collection}/{id}")]
    NotFound { collection: Collection, id: String },

    /// A second record under a unique key: an edge for the same
    /// (relay, user) pair, or a second settings record for one user.
    #[error("{collection} record already exists for {key}")]
    UniqueViolation { collection: Collection, key: String },

    /// A reference to a missing record, or a delete that would orphan one.
    #[error("foreign key violation: {collection}.{field} -> {id}")]
    ForeignKeyViolation {
        collection: Collection,
        field: &'static str,
        id: String,
    },

    /// The store moved past the version the write was prepared against.
    #[error("version conflict: expected {expected}, store is at {actual}")]
    VersionConflict { expected: u64, actual: u64 },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for DomainError {
    fn from(err: StorageError) -> Self {
        DomainError::SourceError {
            message: err.to_string(),
        }
    }
}
