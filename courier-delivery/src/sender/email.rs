use std::sync::LazyLock;

use async_trait::async_trait;
use courier_common::{Channel, Notification, tracing};
use regex::Regex;
use serde::Deserialize;

use super::{ChannelSender, simulation::Simulation};
use crate::error::SendError;

#[allow(clippy::expect_used, reason = "constant pattern")]
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9+_.-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email pattern")
});

const fn default_enabled() -> bool {
    true
}

fn default_from() -> String {
    "noreply@courier.local".to_string()
}

const fn default_failure_rate() -> u8 {
    10
}

const fn default_min_latency_ms() -> u64 {
    100
}

const fn default_max_latency_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Sender address shown to recipients
    #[serde(default = "default_from")]
    pub from: String,

    /// Percentage of sends that fail on purpose
    #[serde(default = "default_failure_rate")]
    pub simulate_failure_rate: u8,

    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: u64,

    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
}

impl Default for EmailConfig {
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

/// Simulated email channel; no mail leaves the process.
#[derive(Debug, Clone)]
pub struct EmailSender {
    enabled: bool,
    from: String,
    simulation: Simulation,
}

impl EmailSender {
    #[must_use]
    pub fn new(config: &EmailConfig) -> Self {
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

#[async_trait]
impl ChannelSender for EmailSender {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, notification: &Notification) -> Result<(), String> {
        if !EMAIL_PATTERN.is_match(notification.recipient()) {
            return Err(format!(
                "Invalid email address: {}",
                notification.recipient()
            ));
        }

        if notification
            .subject()
            .is_none_or(|subject| subject.trim().is_empty())
        {
            tracing::warn!(
                notification_id = %notification.id(),
                "Email has no subject"
            );
        }

        Ok(())
    }

    async fn do_send(&self, notification: &Notification) -> Result<(), SendError> {
        if self.simulation.run().await {
            return Err(SendError::Simulated(
                "Simulated email delivery failure".to_string(),
            ));
        }

        tracing::info!(
            to = notification.recipient(),
            from = %self.from,
            subject = notification.subject().unwrap_or_default(),
            "[Email] Sent (simulated)"
        );

        Ok(())
    }
}
