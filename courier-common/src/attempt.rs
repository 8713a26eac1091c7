use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::{DeliveryResult, ErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptOutcome {
    Success,
    Failed,
}

/// Immutable record of one delivery try, owned by its notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    /// 1-based, contiguous within a notification
    pub sequence: u32,
    pub outcome: AttemptOutcome,
    pub error_message: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub attempted_at: DateTime<Utc>,
}

impl DeliveryAttempt {
    pub(crate) fn from_result(sequence: u32, result: &DeliveryResult, at: DateTime<Utc>) -> Self {
        Self {
            sequence,
            outcome: if result.success {
                AttemptOutcome::Success
            } else {
                AttemptOutcome::Failed
            },
            error_message: result.error_message.clone(),
            error_code: result.error_code.clone(),
            attempted_at: at,
        }
    }

    #[must_use]
    pub const fn is_successful(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success)
    }

    #[must_use]
    pub const fn is_retry(&self) -> bool {
        self.sequence > 1
    }
}
