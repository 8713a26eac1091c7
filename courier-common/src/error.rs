use thiserror::Error;

use crate::status::{LifecycleEvent, NotificationStatus};

/// A lifecycle event was applied to a status with no edge for it.
///
/// Under single-consumer-per-notification semantics this never happens, so
/// seeing one points at a bug or at two cycles racing on the same record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Illegal transition: cannot {event} a notification in state {from}")]
    IllegalTransition {
        from: NotificationStatus,
        event: LifecycleEvent,
    },

    #[error("Cannot record a delivery attempt for a notification in state {0}")]
    NotProcessing(NotificationStatus),
}

impl StateError {
    #[must_use]
    pub const fn from_status(&self) -> NotificationStatus {
        match self {
            Self::IllegalTransition { from, .. } | Self::NotProcessing(from) => *from,
        }
    }
}

/// Failures turning text into model values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Unknown notification status: {0}")]
    UnknownStatus(String),

    #[error("Invalid notification id: {0}")]
    InvalidId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_transition_message() {
        let err = StateError::IllegalTransition {
            from: NotificationStatus::Delivered,
            event: LifecycleEvent::BeginProcessing,
        };
        assert_eq!(
            err.to_string(),
            "Illegal transition: cannot begin processing a notification in state DELIVERED"
        );
        assert_eq!(err.from_status(), NotificationStatus::Delivered);
    }
}
