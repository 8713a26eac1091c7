//! Retry policy for delivery cycles.
//!
//! The bound applies to attempts recorded on the notification, which is
//! separate from the transport's own redelivery count. The transport count
//! also grows when a cycle never gets as far as the sender, after a crash or
//! a conflict, and is the one that routes a task to the dead-letter path.
//! Deliveries held by an open circuit are deferred and count towards
//! neither.

use serde::{Deserialize, Serialize};

/// How many attempts a notification gets before it is failed for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Shared by every channel.
    ///
    /// Default: 3 attempts
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn with_max_attempts(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// `true` while fewer than `max_attempts` attempts have been recorded.
    #[must_use]
    pub const fn should_retry(&self, attempt_count: u32) -> bool {
        attempt_count < self.max_attempts
    }

    /// Returns `0` once max attempts has been reached.
    #[must_use]
    pub const fn remaining_attempts(&self, attempt_count: u32) -> u32 {
        self.max_attempts.saturating_sub(attempt_count)
    }
}

/// How a requested retry reaches the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetryMode {
    /// Negative-acknowledge the task so the transport redelivers it after its
    /// configured delay. The transport's redelivery count keeps growing.
    #[default]
    Redeliver,

    /// Acknowledge the task and publish its successor, carrying the next
    /// attempt number and the same correlation id.
    Republish,
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::with_max_attempts(3);

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    #[test]
    fn test_remaining_attempts() {
        let policy = RetryPolicy::with_max_attempts(3);

        assert_eq!(policy.remaining_attempts(0), 3);
        assert_eq!(policy.remaining_attempts(2), 1);
        assert_eq!(policy.remaining_attempts(3), 0);
        assert_eq!(policy.remaining_attempts(10), 0);
    }

    #[test]
    fn test_from_ron() {
        let policy: RetryPolicy = ron::from_str("()").unwrap();
        assert_eq!(policy, RetryPolicy::default());

        let mode: RetryMode = ron::from_str("Republish").unwrap();
        assert_eq!(mode, RetryMode::Republish);
    }
}
