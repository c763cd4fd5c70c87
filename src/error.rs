//! Error types for GroupCore.
//!
//! This module defines all error types used throughout the library.
//! The taxonomy maps onto HTTP status codes for the server surface:
//! validation failures are 400, missing resources are 404, remote create
//! collisions are 409, and remote transport failures are 502.

use thiserror::Error;

/// Result type alias for GroupCore operations
pub type GroupResult<T> = Result<T, GroupError>;

/// Main error type for GroupCore operations
#[derive(Error, Debug)]
pub enum GroupError {
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote conflict: {0}")]
    RemoteConflict(String),

    #[error("Remote provider unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database operation failed: {0}")]
    DatabaseOperation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("{0}")]
    Other(String),
}

impl GroupError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        GroupError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        GroupError::NotFound(message.into())
    }

    /// Create a new remote-unavailable error
    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        GroupError::RemoteUnavailable(message.into())
    }

    /// Create a new invalid-state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        GroupError::InvalidState(message.into())
    }

    /// HTTP status code this error maps to on the server surface.
    pub fn http_status(&self) -> u16 {
        match self {
            GroupError::Validation { .. } => 400,
            GroupError::NotFound(_) => 404,
            GroupError::RemoteConflict(_) => 409,
            GroupError::InvalidState(_) => 409,
            GroupError::RemoteUnavailable(_) => 502,
            _ => 500,
        }
    }

    /// True if this error came from the remote provider rather than local state.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            GroupError::RemoteConflict(_) | GroupError::RemoteUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = GroupError::validation("display_name", "must not be empty");
        assert_eq!(
            err.to_string(),
            "Validation error in display_name: must not be empty"
        );
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(GroupError::validation("f", "m").http_status(), 400);
        assert_eq!(GroupError::not_found("group").http_status(), 404);
        assert_eq!(
            GroupError::RemoteConflict("duplicate name".into()).http_status(),
            409
        );
        assert_eq!(GroupError::invalid_state("no assets").http_status(), 409);
        assert_eq!(GroupError::remote_unavailable("timeout").http_status(), 502);
        assert_eq!(GroupError::Other("oops".into()).http_status(), 500);
    }

    #[test]
    fn test_is_remote() {
        assert!(GroupError::remote_unavailable("timeout").is_remote());
        assert!(GroupError::RemoteConflict("dup".into()).is_remote());
        assert!(!GroupError::not_found("group").is_remote());
    }
}
