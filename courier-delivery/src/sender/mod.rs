//! Channel senders.
//!
//! Every sender goes through the same two phases: validation, then
//! transmission. [`Sender::send`] runs both and never fails: invalid input,
//! transmission faults and even panics inside a channel come back as a failed
//! [`DeliveryResult`] so the orchestrator can apply one retry policy to all of
//! them.

mod console;
mod email;
mod simulation;
mod sms;

use std::{fmt, panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use courier_common::{Channel, DeliveryResult, ErrorCode, Notification, tracing};
use futures_util::FutureExt;

pub use self::{
    console::{ConsoleConfig, ConsoleSender},
    email::{EmailConfig, EmailSender},
    simulation::Simulation,
    sms::{SMS_MAX_LENGTH, SmsConfig, SmsSender},
};
use crate::error::SendError;

/// One delivery channel implementation.
#[async_trait]
pub trait ChannelSender: Send + Sync + fmt::Debug {
    fn channel(&self) -> Channel;

    fn is_enabled(&self) -> bool;

    /// Channel-specific checks, run after the shared recipient and content
    /// checks. The error is the message recorded on the failed attempt.
    ///
    /// # Errors
    /// When the notification cannot be sent over this channel as it stands.
    fn validate(&self, notification: &Notification) -> Result<(), String>;

    /// Hand the notification to the channel.
    ///
    /// # Errors
    /// Any fault reported by the channel.
    async fn do_send(&self, notification: &Notification) -> Result<(), SendError>;
}

/// A registered sender: one of the built-in channels, or a plug-in.
#[derive(Debug, Clone)]
pub enum Sender {
    Email(EmailSender),
    Sms(SmsSender),
    Console(ConsoleSender),
    Custom(Arc<dyn ChannelSender>),
}

impl Sender {
    fn inner(&self) -> &dyn ChannelSender {
        match self {
            Self::Email(sender) => sender,
            Self::Sms(sender) => sender,
            Self::Console(sender) => sender,
            Self::Custom(sender) => sender.as_ref(),
        }
    }

    #[must_use]
    pub fn channel(&self) -> Channel {
        self.inner().channel()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner().is_enabled()
    }

    /// Validate and transmit `notification`, reporting every outcome as a
    /// [`DeliveryResult`].
    pub async fn send(&self, notification: &Notification) -> DeliveryResult {
        let sender = self.inner();
        let channel = sender.channel().display_name();
        let id = notification.id();

        tracing::info!(
            notification_id = %id,
            recipient = notification.recipient(),
            "[{channel}] Starting delivery"
        );

        if let Err(reason) = validate_common(notification).and_then(|()| sender.validate(notification)) {
            tracing::warn!(notification_id = %id, error = %reason, "[{channel}] Validation failed");
            return DeliveryResult::invalid(reason);
        }

        match AssertUnwindSafe(sender.do_send(notification))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {
                tracing::info!(notification_id = %id, "[{channel}] Delivered");
                DeliveryResult::ok()
            }
            Ok(Err(error)) => {
                tracing::warn!(notification_id = %id, error = %error, "[{channel}] Delivery failed");
                error.into()
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(notification_id = %id, error = %message, "[{channel}] Unexpected fault");
                DeliveryResult::failure_with_code(format!("Unexpected fault: {message}"), ErrorCode::Panic)
            }
        }
    }
}

impl From<EmailSender> for Sender {
    fn from(sender: EmailSender) -> Self {
        Self::Email(sender)
    }
}

impl From<SmsSender> for Sender {
    fn from(sender: SmsSender) -> Self {
        Self::Sms(sender)
    }
}

impl From<ConsoleSender> for Sender {
    fn from(sender: ConsoleSender) -> Self {
        Self::Console(sender)
    }
}

impl From<Arc<dyn ChannelSender>> for Sender {
    fn from(sender: Arc<dyn ChannelSender>) -> Self {
        Self::Custom(sender)
    }
}

/// Checks shared by every channel.
fn validate_common(notification: &Notification) -> Result<(), String> {
    if notification.recipient().trim().is_empty() {
        return Err("Recipient is required".to_string());
    }

    if notification.content().trim().is_empty() {
        return Err("Content is required".to_string());
    }

    Ok(())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, Default)]
    struct Exploding {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ChannelSender for Exploding {
        fn channel(&self) -> Channel {
            Channel::Console
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn validate(&self, _notification: &Notification) -> Result<(), String> {
            Ok(())
        }

        async fn do_send(&self, _notification: &Notification) -> Result<(), SendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("channel exploded");
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_result() {
        let inner = Arc::new(Exploding::default());
        let sender = Sender::Custom(inner.clone());
        let result = sender
            .send(&Notification::new(Channel::Console, "ops", "hello"))
            .await;

        assert!(result.is_failure());
        assert!(result.has_error_code(&ErrorCode::Panic));
        assert_eq!(
            result.error_message.as_deref(),
            Some("Unexpected fault: channel exploded")
        );
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_input_never_reaches_channel() {
        let inner = Arc::new(Exploding::default());
        let sender = Sender::Custom(inner.clone());

        let blank_recipient = sender
            .send(&Notification::new(Channel::Console, "  ", "hello"))
            .await;
        assert_eq!(blank_recipient, DeliveryResult::invalid("Recipient is required"));

        let blank_content = sender
            .send(&Notification::new(Channel::Console, "ops", "\n"))
            .await;
        assert_eq!(blank_content, DeliveryResult::invalid("Content is required"));

        assert_eq!(inner.calls.load(Ordering::SeqCst), 0);
    }
}
