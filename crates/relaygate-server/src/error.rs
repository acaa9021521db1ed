//! Outward error taxonomy.
//!
//! Every failure a caller can observe is one of these variants. A concealed
//! denial is a [`ServiceError::NotFound`] built exactly as for a missing
//! record, so the two cannot be told apart by variant, code, status or
//! message.

use relaygate_domain::model::Collection;
use relaygate_domain::{DenyReason, DomainError};
use relaygate_storage::StorageError;
use thiserror::Error;

/// Errors returned by the service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The record does not exist, or the principal may not know it does.
    #[error("{collection} record '{id}' not found")]
    NotFound { collection: Collection, id: String },

    /// A create denied for a reason that reveals nothing about existence.
    #[error("forbidden: {reason}")]
    Forbidden { reason: DenyReason },

    /// A relay capacity or ownership limit was hit.
    #[error("limit exceeded: {message}")]
    LimitExceeded { message: String },

    /// The write collided with existing state or kept losing commit races.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Malformed filter, expand or payload.
    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub(crate) fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            collection,
            id: id.into(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound { .. } => "not-found",
            ServiceError::Forbidden { reason } => reason.code(),
            ServiceError::LimitExceeded { .. } => "limit-exceeded",
            ServiceError::Conflict { .. } => "conflict",
            ServiceError::BadRequest { .. } => "bad-request",
            ServiceError::Internal { .. } => "internal",
        }
    }

    /// Suggested HTTP status for transports.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::NotFound { .. } => 404,
            ServiceError::Forbidden { .. } => 403,
            ServiceError::LimitExceeded { .. } | ServiceError::BadRequest { .. } => 400,
            ServiceError::Conflict { .. } => 409,
            ServiceError::Internal { .. } => 500,
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::FilterParseError { .. }
            | DomainError::UnknownFilterField { .. }
            | DomainError::InvalidExpand { .. }
            | DomainError::ExpandDepthExceeded { .. } => ServiceError::BadRequest {
                message: err.to_string(),
            },
            DomainError::MissingTarget { .. }
            | DomainError::CollectionMismatch { .. }
            | DomainError::UnknownRole { .. }
            | DomainError::SourceError { .. } => ServiceError::Internal {
                message: err.to_string(),
            },
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { collection, id } => ServiceError::NotFound { collection, id },
            StorageError::UniqueViolation { .. } | StorageError::VersionConflict { .. } => {
                ServiceError::Conflict {
                    message: err.to_string(),
                }
            }
            StorageError::ForeignKeyViolation { .. } => ServiceError::BadRequest {
                message: err.to_string(),
            },
        }
    }
}
