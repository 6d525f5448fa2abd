//! Domain error kinds.
//!
//! These are the errors that are stable across the wire. Persistence-layer failures are
//! translated into one of these kinds at the persistence boundary, and the API boundary
//! renders a list of them as `[{code, params, message}]`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The six error kinds recognised at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Required,
    NotFound,
    BadReference,
    ConcurrentUpdate,
    Conflict,
    Other,
}

impl ErrorKind {
    /// Canonical HTTP status for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Required => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::BadReference => 400,
            ErrorKind::ConcurrentUpdate => 409,
            ErrorKind::Conflict => 409,
            ErrorKind::Other => 500,
        }
    }

    /// Wire code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Required => "ErrRequired",
            ErrorKind::NotFound => "ErrNotFound",
            ErrorKind::BadReference => "ErrBadReference",
            ErrorKind::ConcurrentUpdate => "ErrConcurrentUpdate",
            ErrorKind::Conflict => "ErrConflict",
            ErrorKind::Other => "ErrOther",
        }
    }
}

/// Errors raised by tenant-scoped persistence and by the core's domain logic.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainError {
    /// A required input field is absent.
    #[error("{field} is required")]
    Required { field: String },

    /// The referenced entity does not exist in the acting tenant.
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    /// A foreign-key target does not exist.
    #[error("{entity} {id} references a missing entity")]
    BadReference { entity: String, id: String },

    /// The caller's last-modified value does not match the persisted row.
    #[error("{entity} {id} was updated concurrently")]
    ConcurrentUpdate { entity: String, id: String },

    /// A transactional conflict at the storage layer.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Catch-all.
    #[error("{0}")]
    Other(String),
}

impl DomainError {
    /// Create a required-field error.
    pub fn required(field: impl Into<String>) -> Self {
        Self::Required {
            field: field.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a bad-reference error.
    pub fn bad_reference(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::BadReference {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a concurrent-update error.
    pub fn concurrent_update(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::ConcurrentUpdate {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a catch-all error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Required { .. } => ErrorKind::Required,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::BadReference { .. } => ErrorKind::BadReference,
            DomainError::ConcurrentUpdate { .. } => ErrorKind::ConcurrentUpdate,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::Other(_) => ErrorKind::Other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound { .. })
    }

    /// Parameters rendered alongside the code at the API boundary.
    pub fn params(&self) -> Vec<String> {
        match self {
            DomainError::Required { field } => vec![field.clone()],
            DomainError::NotFound { entity, id }
            | DomainError::BadReference { entity, id }
            | DomainError::ConcurrentUpdate { entity, id } => vec![entity.clone(), id.clone()],
            DomainError::Conflict(msg) | DomainError::Other(msg) => vec![msg.clone()],
        }
    }

    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }
}

/// A single error entry in an API response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiError {
    pub code: String,
    pub params: Vec<String>,
    pub message: String,
}

impl From<&DomainError> for ApiError {
    fn from(err: &DomainError) -> Self {
        Self {
            code: err.kind().code().to_string(),
            params: err.params(),
            message: err.to_string(),
        }
    }
}

/// The API error body together with its HTTP status.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiErrors {
    /// Maximum status across all entries.
    pub status: u16,
    pub errors: Vec<ApiError>,
}

impl ApiErrors {
    /// Build a response body from one or more domain errors.
    ///
    /// Validation failures produce one `Required` entry per failing field; the status is the
    /// maximum of the individual statuses (500 for an empty list).
    pub fn from_errors(errors: &[DomainError]) -> Self {
        let status = errors
            .iter()
            .map(DomainError::http_status)
            .max()
            .unwrap_or(500);
        Self {
            status,
            errors: errors.iter().map(ApiError::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_per_kind() {
        assert_eq!(DomainError::required("name").http_status(), 400);
        assert_eq!(DomainError::not_found("post", 1).http_status(), 404);
        assert_eq!(DomainError::bad_reference("collection", 2).http_status(), 400);
        assert_eq!(DomainError::concurrent_update("post", 3).http_status(), 409);
        assert_eq!(DomainError::conflict("tx").http_status(), 409);
        assert_eq!(DomainError::other("boom").http_status(), 500);
    }

    #[test]
    fn test_api_errors_take_max_status() {
        let body = ApiErrors::from_errors(&[
            DomainError::required("name"),
            DomainError::required("collection"),
            DomainError::concurrent_update("post", 7),
        ]);

        assert_eq!(body.status, 409);
        assert_eq!(body.errors.len(), 3);
        assert_eq!(body.errors[0].code, "ErrRequired");
        assert_eq!(body.errors[0].params, vec!["name".to_string()]);
        assert_eq!(body.errors[2].code, "ErrConcurrentUpdate");
    }

    #[test]
    fn test_api_error_serializes_wire_shape() {
        let body = ApiErrors::from_errors(&[DomainError::not_found("record", 42)]);
        let json = serde_json::to_value(&body.errors).unwrap();
        assert_eq!(json[0]["code"], "ErrNotFound");
        assert_eq!(json[0]["params"][1], "42");
        assert_eq!(json[0]["message"], "record 42 not found");
    }
}
