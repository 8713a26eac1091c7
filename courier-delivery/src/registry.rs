use ahash::AHashMap;
use courier_common::{Channel, tracing};

use crate::{
    config::ChannelsConfig,
    error::UnsupportedChannel,
    sender::{ConsoleSender, EmailSender, Sender, SmsSender},
};

/// The senders available to the orchestrator, grouped by channel in
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct SenderRegistry {
    senders: AHashMap<Channel, Vec<Sender>>,
}

impl SenderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in simulated senders, one per channel.
    #[must_use]
    pub fn from_config(config: &ChannelsConfig) -> Self {
        let mut registry = Self::new();
        registry.register(EmailSender::new(&config.email));
        registry.register(SmsSender::new(&config.sms));
        registry.register(ConsoleSender::new(&config.console));
        registry
    }

    /// Add a sender after every sender already registered for its channel.
    pub fn register(&mut self, sender: impl Into<Sender>) -> &mut Self {
        let sender = sender.into();
        let channel = sender.channel();
        tracing::debug!(
            channel = channel.code(),
            enabled = sender.is_enabled(),
            "Registered sender"
        );
        self.senders.entry(channel).or_default().push(sender);
        self
    }

    /// First enabled sender registered for `channel`.
    ///
    /// # Errors
    /// [`UnsupportedChannel`] when nothing is registered for the channel or
    /// every matching sender is disabled.
    pub fn resolve(&self, channel: Channel) -> Result<&Sender, UnsupportedChannel> {
        self.senders
            .get(&channel)
            .and_then(|senders| senders.iter().find(|sender| sender.is_enabled()))
            .ok_or(UnsupportedChannel(channel))
    }

    /// Channels with at least one enabled sender
    pub fn enabled_channels(&self) -> impl Iterator<Item = Channel> + '_ {
        Channel::ALL
            .into_iter()
            .filter(|channel| self.resolve(*channel).is_ok())
    }
}
