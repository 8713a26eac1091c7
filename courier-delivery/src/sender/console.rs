use std::fmt::Write as _;

use async_trait::async_trait;
use courier_common::{Channel, Notification, tracing};
use serde::Deserialize;

use super::ChannelSender;
use crate::error::SendError;

const RULE: &str = "============================================================";

const fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
        }
    }
}

/// Writes notifications to the log instead of delivering them. Never fails.
#[derive(Debug, Clone)]
pub struct ConsoleSender {
    enabled: bool,
}

impl ConsoleSender {
    #[must_use]
    pub const fn new(config: &ConsoleConfig) -> Self {
        Self {
            enabled: config.enabled,
        }
    }

    fn render(notification: &Notification) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "NOTIFICATION");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "ID:        {}", notification.id());
        let _ = writeln!(out, "Recipient: {}", notification.recipient());
        if let Some(subject) = notification.subject() {
            let _ = writeln!(out, "Subject:   {subject}");
        }
        let _ = writeln!(out, "Content:");
        let _ = writeln!(out, "{}", notification.content());
        if !notification.metadata().is_empty() {
            let _ = writeln!(out, "Metadata:");
            for (key, value) in notification.metadata() {
                let _ = writeln!(out, "  {key}: {value}");
            }
        }
        let _ = write!(out, "{RULE}");
        out
    }
}

#[async_trait]
impl ChannelSender for ConsoleSender {
    fn channel(&self) -> Channel {
        Channel::Console
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, _notification: &Notification) -> Result<(), String> {
        Ok(())
    }

    async fn do_send(&self, notification: &Notification) -> Result<(), SendError> {
        tracing::info!("\n{}", Self::render(notification));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use courier_common::{DeliveryResult, Metadata};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sender::Sender;

    #[test]
    fn test_render_includes_every_field() {
        let mut metadata = Metadata::new();
        metadata.insert("order".to_string(), serde_json::json!(42));

        let notification = Notification::new(Channel::Console, "ops", "disk full")
            .with_subject("alert")
            .with_metadata(metadata);
        let rendered = ConsoleSender::render(&notification);

        assert!(rendered.contains(&format!("ID:        {}", notification.id())));
        assert!(rendered.contains("Recipient: ops"));
        assert!(rendered.contains("Subject:   alert"));
        assert!(rendered.contains("disk full"));
        assert!(rendered.contains("  order: 42"));
        assert!(rendered.starts_with(RULE));
        assert!(rendered.ends_with(RULE));
    }

    #[test]
    fn test_render_skips_absent_sections() {
        let rendered = ConsoleSender::render(&Notification::new(Channel::Console, "ops", "x"));
        assert!(!rendered.contains("Subject:"));
        assert!(!rendered.contains("Metadata:"));
    }

    #[tokio::test]
    async fn test_always_delivers() {
        let sender = Sender::from(ConsoleSender::new(&ConsoleConfig::default()));
        let result = sender
            .send(&Notification::new(Channel::Console, "anyone at all", "hello"))
            .await;
        assert_eq!(result, DeliveryResult::ok());
    }
}
