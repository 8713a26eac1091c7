use serde::Deserialize;

use crate::{
    circuit_breaker::CircuitBreakerConfig,
    policy::{RetryMode, RetryPolicy},
    sender::{ConsoleConfig, EmailConfig, SmsConfig},
};

const fn default_max_attempts() -> u32 {
    3
}

const fn default_max_concurrent_deliveries() -> usize {
    8
}

const fn default_requeue_pending_on_start() -> bool {
    true
}

/// Settings for the delivery worker pool and the orchestrator it drives.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Attempts a notification gets before it is failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delivery cycles allowed to run at once
    #[serde(default = "default_max_concurrent_deliveries")]
    pub max_concurrent_deliveries: usize,

    #[serde(default)]
    pub retry_mode: RetryMode,

    /// Re-publish tasks for notifications left `PENDING`, `QUEUED` or
    /// `PROCESSING` by a previous run
    #[serde(default = "default_requeue_pending_on_start")]
    pub requeue_pending_on_start: bool,

    /// Per-channel circuit breaker; disabled when absent
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_concurrent_deliveries: default_max_concurrent_deliveries(),
            retry_mode: RetryMode::default(),
            requeue_pending_on_start: default_requeue_pending_on_start(),
            circuit_breaker: None,
        }
    }
}

impl DeliveryConfig {
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.max_attempts)
    }
}

/// One section per built-in channel
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub sms: SmsConfig,

    #[serde(default)]
    pub console: ConsoleConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: DeliveryConfig = ron::from_str("()").unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.max_concurrent_deliveries, 8);
        assert_eq!(config.retry_mode, RetryMode::Redeliver);
        assert!(config.requeue_pending_on_start);
        assert!(config.circuit_breaker.is_none());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_full_config() {
        let config: DeliveryConfig = ron::from_str(
            r"(
                max_attempts: 5,
                max_concurrent_deliveries: 2,
                retry_mode: Republish,
                requeue_pending_on_start: false,
                circuit_breaker: Some((failure_threshold: 10)),
            )",
        )
        .unwrap();

        assert_eq!(config.retry_policy().max_attempts, 5);
        assert_eq!(config.retry_mode, RetryMode::Republish);
        assert_eq!(
            config.circuit_breaker.map(|breaker| breaker.failure_threshold),
            Some(10)
        );
    }

    #[test]
    fn test_channels() {
        let config: ChannelsConfig =
            ron::from_str(r#"(sms: (enabled: false), email: (from: "alerts@example.com"))"#).unwrap();
        assert!(!config.sms.enabled);
        assert!(config.console.enabled);
        assert_eq!(config.email.from, "alerts@example.com");
    }
}
