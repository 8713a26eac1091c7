//! Typed error handling for delivery.
//!
//! Expected, data-driven failures (invalid recipients, outages, unknown
//! notifications) never show up here: senders fold them into a
//! [`DeliveryResult`] and the orchestrator turns them into state transitions.
//! What remains is configuration problems, storage and transport failures,
//! and illegal state transitions, which point at a bug.

use courier_common::{Channel, DeliveryResult, ErrorCode, NotificationId, StateError};
use courier_store::StoreError;
use thiserror::Error;

/// Failure inside one delivery cycle that the lifecycle cannot absorb.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// A transition was attempted from a state with no edge for it.
    #[error("{0}")]
    IllegalState(#[from] StateError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DeliveryError {
    /// Another cycle saved the notification first.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(StoreError::Conflict { .. }))
    }

    /// Points at a programming error rather than an environmental one.
    #[must_use]
    pub const fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState(_))
    }
}

/// No enabled sender is registered for a channel.
///
/// A configuration problem rather than a delivery failure, so it is never
/// retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no enabled sender for channel {}", .0.code())]
pub struct UnsupportedChannel(pub Channel);

/// Faults a channel may raise while transmitting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Temporary failure: {0}")]
    Temporary(String),

    /// The channel refused the message outright.
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("{0}")]
    Simulated(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SendError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::Connection(_) => ErrorCode::ConnectionError,
            Self::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            Self::RateLimited(_) => ErrorCode::RateLimited,
            Self::Temporary(_) => ErrorCode::TemporaryFailure,
            Self::Rejected(_) => ErrorCode::Other("REJECTED".to_string()),
            Self::Simulated(_) => ErrorCode::SimulatedFailure,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl From<SendError> for DeliveryResult {
    fn from(error: SendError) -> Self {
        let code = error.code();
        Self::failure_with_code(error.to_string(), code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Transport is closed")]
    Closed,

    #[error("Failed to publish task for {id}: {reason}")]
    Publish { id: NotificationId, reason: String },
}

/// Errors surfaced to callers of the notification service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Notification not found: {0}")]
    NotFound(NotificationId),

    #[error("Invalid request: {}", display_fields(.0))]
    Invalid(Vec<FieldError>),

    /// The record was persisted but could not be queued; it stays `PENDING`.
    #[error("Notification {id} was stored but could not be queued: {source}")]
    Publish {
        id: NotificationId,
        source: TransportError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    IllegalState(#[from] StateError),
}

impl ServiceError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// One rejected field of a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

fn display_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
