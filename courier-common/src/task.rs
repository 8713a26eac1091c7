use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{CorrelationId, NotificationId};

/// Transport message asking a worker to try delivering one notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTask {
    pub notification_id: NotificationId,
    pub created_at: DateTime<Utc>,
    #[serde(default = "first_attempt")]
    pub attempt_number: u32,
    pub correlation_id: CorrelationId,
}

const fn first_attempt() -> u32 {
    1
}

impl DeliveryTask {
    /// A first-attempt task with a fresh correlation id
    #[must_use]
    pub fn new(notification_id: NotificationId) -> Self {
        Self {
            notification_id,
            created_at: Utc::now(),
            attempt_number: first_attempt(),
            correlation_id: CorrelationId::generate(),
        }
    }

    /// The successor of this task: next attempt number, same correlation id.
    #[must_use]
    pub fn for_retry(&self) -> Self {
        Self {
            notification_id: self.notification_id,
            created_at: Utc::now(),
            attempt_number: self.attempt_number.saturating_add(1),
            correlation_id: self.correlation_id,
        }
    }

    #[must_use]
    pub const fn is_retry(&self) -> bool {
        self.attempt_number > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_first_attempt() {
        let task = DeliveryTask::new(NotificationId::generate());
        assert_eq!(task.attempt_number, 1);
        assert!(!task.is_retry());
    }

    #[test]
    fn test_retry_keeps_correlation() {
        let task = DeliveryTask::new(NotificationId::generate());
        let retry = task.for_retry();
        let again = retry.for_retry();

        assert_eq!(retry.attempt_number, 2);
        assert_eq!(again.attempt_number, 3);
        assert!(retry.is_retry());
        assert_eq!(again.correlation_id, task.correlation_id);
        assert_eq!(again.notification_id, task.notification_id);
    }

    #[test]
    fn test_attempt_number_defaults_when_missing() {
        let task = DeliveryTask::new(NotificationId::generate());
        let mut value = serde_json::to_value(&task).unwrap();
        value.as_object_mut().unwrap().remove("attempt_number");

        let parsed: DeliveryTask = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.attempt_number, 1);
    }
}
