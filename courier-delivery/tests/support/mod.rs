//! Helpers shared by the integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

use async_trait::async_trait;
use courier_common::{Channel, DeliveryTask, Notification};
use courier_delivery::{
    ChannelSender, DeliveryOrchestrator, RetryPolicy, SendError, Sender, SenderRegistry,
};
use courier_store::{NotificationStore, TestNotificationStore};
use parking_lot::Mutex;

/// Sender that replays a fixed list of results, then keeps succeeding.
#[derive(Debug)]
pub struct ScriptedSender {
    channel: Channel,
    script: Mutex<VecDeque<Result<(), SendError>>>,
    calls: AtomicU32,
}

impl ScriptedSender {
    pub fn new(channel: Channel, script: impl IntoIterator<Item = Result<(), SendError>>) -> Arc<Self> {
        Arc::new(Self {
            channel,
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicU32::new(0),
        })
    }

    /// Fails every call with a transient error
    pub fn always_failing(channel: Channel) -> Arc<Self> {
        Self::new(
            channel,
            std::iter::repeat_n(Err(SendError::Timeout("no answer".to_string())), 1000),
        )
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelSender for ScriptedSender {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn validate(&self, _notification: &Notification) -> Result<(), String> {
        Ok(())
    }

    async fn do_send(&self, _notification: &Notification) -> Result<(), SendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().pop_front().unwrap_or(Ok(()))
    }
}

pub fn registry(senders: impl IntoIterator<Item = Sender>) -> Arc<SenderRegistry> {
    let mut registry = SenderRegistry::new();
    for sender in senders {
        registry.register(sender);
    }
    Arc::new(registry)
}

pub fn orchestrator(
    store: &TestNotificationStore,
    registry: Arc<SenderRegistry>,
    max_attempts: u32,
) -> DeliveryOrchestrator {
    DeliveryOrchestrator::new(
        Arc::new(store.clone()),
        registry,
        RetryPolicy::with_max_attempts(max_attempts),
    )
}

/// Store `notification` as `QUEUED` and return its first task.
pub async fn enqueue(store: &TestNotificationStore, mut notification: Notification) -> DeliveryTask {
    let id = store.create(&mut notification).await.unwrap();
    notification.mark_queued().unwrap();
    store.save(&mut notification).await.unwrap();
    DeliveryTask::new(id)
}
