//! Error types for notification storage.

use std::io;

use courier_common::NotificationId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O operation failed (file read/write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Notification not found: {0}")]
    NotFound(NotificationId),

    #[error("Notification already exists: {0}")]
    AlreadyExists(NotificationId),

    /// Optimistic version check failed; someone else saved first.
    #[error("Version conflict on {id}: expected {expected}, found {actual}")]
    Conflict {
        id: NotificationId,
        expected: u64,
        actual: u64,
    },

    /// The record or the store configuration breaks a storage rule.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error (lock poisoning, capacity, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = StoreError::from(io_err);
        assert!(matches!(err, StoreError::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_conflict_classification() {
        let err = StoreError::Conflict {
            id: NotificationId::generate(),
            expected: 2,
            actual: 3,
        };
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("expected 2, found 3"));
    }
}
