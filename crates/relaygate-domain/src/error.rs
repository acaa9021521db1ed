//! Domain error types for policy evaluation.
//!
//! Authorization outcomes are never errors: a denial is a [`Decision`] value.
//! These errors describe malformed requests and data-source failures.
//!
//! [`Decision`]: crate::policy::Decision

use thiserror::Error;

use crate::model::{Collection, Operation};

/// Domain-specific errors for policy operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A single-record or create operation was evaluated without a target.
    #[error("operation '{operation}' on '{collection}' requires a target record")]
    MissingTarget {
        collection: Collection,
        operation: Operation,
    },

    /// The target record belongs to a different collection than requested.
    #[error("target record belongs to '{actual}', expected '{expected}'")]
    CollectionMismatch {
        expected: Collection,
        actual: Collection,
    },

    /// Error parsing a user-supplied list filter.
    #[error("filter parse error: {message}")]
    FilterParseError { message: String },

    /// The filter references a field the collection does not have.
    #[error("unknown filter field '{field}' on '{collection}'")]
    UnknownFilterField {
        collection: Collection,
        field: String,
    },

    /// Malformed expand request.
    #[error("invalid expand path: {message}")]
    InvalidExpand { message: String },

    /// Expand path deeper than the configured limit.
    #[error("expand depth limit exceeded (max: {max_depth})")]
    ExpandDepthExceeded { max_depth: u32 },

    /// A membership edge references a role that does not exist.
    #[error("membership edge {edge_id} references unknown role {role_id}")]
    UnknownRole { edge_id: String, role_id: String },

    /// Failure reported by the external data layer.
    #[error("data source error: {message}")]
    SourceError { message: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
