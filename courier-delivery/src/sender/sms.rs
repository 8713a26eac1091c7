use std::sync::LazyLock;

use async_trait::async_trait;
use courier_common::{Channel, Notification, tracing};
use regex::Regex;
use serde::Deserialize;

use super::{ChannelSender, simulation::Simulation};
use crate::error::SendError;

/// Characters that fit in a single SMS segment
pub const SMS_MAX_LENGTH: usize = 160;

#[allow(clippy::expect_used, reason = "constant pattern")]
static E164_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9]\d{1,14}$").expect("valid E.164 pattern"));

const fn default_enabled() -> bool {
    true
}

fn default_from() -> String {
    "+15551234567".to_string()
}

const fn default_failure_rate() -> u8 {
    5
}

const fn default_min_latency_ms() -> u64 {
    200
}

const fn default_max_latency_ms() -> u64 {
    800
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Originating number, E.164
    #[serde(default = "default_from")]
    pub from: String,

    #[serde(default = "default_failure_rate")]
    pub simulate_failure_rate: u8,

    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: u64,

    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            from: default_from(),
            simulate_failure_rate: default_failure_rate(),
            min_latency_ms: default_min_latency_ms(),
            max_latency_ms: default_max_latency_ms(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmsSender {
    enabled: bool,
    from: String,
    simulation: Simulation,
}

impl SmsSender {
    #[must_use]
    pub fn new(config: &SmsConfig) -> Self {
        Self {
            enabled: config.enabled,
            from: config.from.clone(),
            simulation: Simulation {
                failure_rate: config.simulate_failure_rate,
                min_latency_ms: config.min_latency_ms,
                max_latency_ms: config.max_latency_ms,
            },
        }
    }

    #[must_use]
    pub const fn with_simulation(mut self, simulation: Simulation) -> Self {
        self.simulation = simulation;
        self
    }
}

/// Number of segments needed to carry `content`.
fn segments(content: &str) -> usize {
    content.chars().count().div_ceil(SMS_MAX_LENGTH).max(1)
}

#[async_trait]
impl ChannelSender for SmsSender {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, notification: &Notification) -> Result<(), String> {
        let recipient = notification.recipient();
        if !E164_PATTERN.is_match(recipient) {
            return Err(format!(
                "Invalid phone number format. Expected E.164 format (e.g., +14155551234), got: {recipient}"
            ));
        }

        let length = notification.content().chars().count();
        if length > SMS_MAX_LENGTH {
            tracing::warn!(
                notification_id = %notification.id(),
                length,
                limit = SMS_MAX_LENGTH,
                "SMS content exceeds a single segment and will be split"
            );
        }

        Ok(())
    }

    async fn do_send(&self, notification: &Notification) -> Result<(), SendError> {
        if self.simulation.run().await {
            return Err(SendError::Simulated(
                "Simulated SMS delivery failure".to_string(),
            ));
        }

        tracing::info!(
            to = notification.recipient(),
            from = %self.from,
            segments = segments(notification.content()),
            "[SMS] Sent (simulated)"
        );

        Ok(())
    }
}
