//! Notification lifecycle.
//!
//! ```text
//! PENDING ──enqueue──> QUEUED ──begin──> PROCESSING ──succeed──> DELIVERED
//!                        ^                   │
//!                        └────retry──────────┤
//!                                            └──fail──> FAILED
//!
//! any non-terminal ──dead-letter──> FAILED
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ParseError, StateError},
    traits::FiniteStateMachine,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Pending,
    Queued,
    Processing,
    Delivered,
    Failed,
}

impl NotificationStatus {
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Queued,
        Self::Processing,
        Self::Delivered,
        Self::Failed,
    ];

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Queued => "QUEUED",
            Self::Processing => "PROCESSING",
            Self::Delivered => "DELIVERED",
            Self::Failed => "FAILED",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    #[must_use]
    pub const fn is_successful(self) -> bool {
        matches!(self, Self::Delivered)
    }

    #[must_use]
    pub const fn can_be_processed(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NotificationStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.code().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseError::UnknownStatus(s.to_string()))
    }
}

/// Something that happened to a notification and may move its status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Enqueue,
    BeginProcessing,
    Succeed,
    Retry,
    Fail,
    DeadLetter,
}

impl LifecycleEvent {
    pub const ALL: [Self; 6] = [
        Self::Enqueue,
        Self::BeginProcessing,
        Self::Succeed,
        Self::Retry,
        Self::Fail,
        Self::DeadLetter,
    ];
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enqueue => "enqueue",
            Self::BeginProcessing => "begin processing",
            Self::Succeed => "succeed",
            Self::Retry => "retry",
            Self::Fail => "fail",
            Self::DeadLetter => "dead-letter",
        };
        f.write_str(name)
    }
}

impl FiniteStateMachine for NotificationStatus {
    type Input = LifecycleEvent;
    type Error = StateError;

    fn transition(self, input: Self::Input) -> Result<Self, Self::Error> {
        match (self, input) {
            (Self::Pending, LifecycleEvent::Enqueue)
            | (Self::Processing, LifecycleEvent::Retry) => Ok(Self::Queued),
            (Self::Queued, LifecycleEvent::BeginProcessing) => Ok(Self::Processing),
            (Self::Processing, LifecycleEvent::Succeed) => Ok(Self::Delivered),
            (Self::Processing, LifecycleEvent::Fail) => Ok(Self::Failed),
            (from, LifecycleEvent::DeadLetter) if !from.is_terminal() => Ok(Self::Failed),
            (from, event) => Err(StateError::IllegalTransition { from, event }),
        }
    }
}
