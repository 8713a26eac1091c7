use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use courier_common::{DeliveryTask, outgoing, tracing};
use tokio::sync::{Mutex, Notify, mpsc};

use super::{Envelope, Transport, TransportConfig};
use crate::error::TransportError;

/// In-process transport backed by tokio channels.
///
/// Redeliveries are scheduled on the runtime and re-enter the same queue
/// once their delay has passed. Nothing survives a restart; tasks for
/// notifications left unresolved are recovered by re-publishing them at
/// startup.
#[derive(Debug)]
pub struct MemoryTransport {
    config: TransportConfig,
    ready_tx: mpsc::Sender<Envelope>,
    ready_rx: Mutex<mpsc::Receiver<Envelope>>,
    dead_tx: mpsc::UnboundedSender<Envelope>,
    dead_rx: Mutex<mpsc::UnboundedReceiver<Envelope>>,
    closed: AtomicBool,
    close_notify: Notify,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl MemoryTransport {
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        let (ready_tx, ready_rx) = mpsc::channel(config.capacity.max(1));
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();

        Self {
            config,
            ready_tx,
            ready_rx: Mutex::new(ready_rx),
            dead_tx,
            dead_rx: Mutex::new(dead_rx),
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Tasks waiting to be received, not counting scheduled redeliveries
    #[must_use]
    pub fn len(&self) -> usize {
        self.ready_tx.max_capacity() - self.ready_tx.capacity()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn dead_letter(&self, envelope: Envelope) -> Result<(), TransportError> {
        tracing::warn!(
            notification_id = %envelope.task.notification_id,
            correlation_id = %envelope.task.correlation_id,
            deliveries = envelope.delivery_count,
            "Redelivery budget exhausted, moving task to the dead-letter queue"
        );

        let id = envelope.task.notification_id;
        self.dead_tx
            .send(envelope)
            .map_err(|_| TransportError::Publish {
                id,
                reason: "dead-letter queue is closed".to_string(),
            })
    }

    /// Put `envelope` back on the queue once `delay` has passed.
    fn schedule(&self, envelope: Envelope, delay: Duration) {
        let tx = self.ready_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let id = envelope.task.notification_id;
            if tx.send(envelope).await.is_err() {
                tracing::warn!(notification_id = %id, "Transport dropped before redelivery");
            }
        });
    }

    /// Wait on `future` unless the transport is closed first.
    async fn until_closed<T>(&self, future: impl Future<Output = Option<T>>) -> Option<T> {
        let mut closed = std::pin::pin!(self.close_notify.notified());
        closed.as_mut().enable();

        if self.is_closed() {
            return None;
        }

        tokio::select! {
            item = future => item,
            () = closed => None,
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publish(&self, task: DeliveryTask) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let id = task.notification_id;
        outgoing!(
            level = DEBUG,
            notification_id = %id,
            correlation_id = %task.correlation_id,
            attempt = task.attempt_number,
            "Publishing delivery task"
        );

        self.ready_tx
            .try_send(Envelope::new(task))
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => TransportError::Publish {
                    id,
                    reason: "queue is full".to_string(),
                },
                mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
            })
    }

    async fn receive(&self) -> Option<Envelope> {
        let mut rx = self.ready_rx.lock().await;
        self.until_closed(rx.recv()).await
    }

    async fn ack(&self, envelope: &Envelope) {
        tracing::trace!(
            notification_id = %envelope.task.notification_id,
            deliveries = envelope.delivery_count,
            "Task acknowledged"
        );
    }

    async fn nack(&self, envelope: Envelope) -> Result<(), TransportError> {
        if envelope.delivery_count > self.config.max_redeliveries {
            return self.dead_letter(envelope);
        }

        let envelope = envelope.redelivered();
        tracing::debug!(
            notification_id = %envelope.task.notification_id,
            delivery = envelope.delivery_count,
            delay_ms = self.config.redelivery_delay_ms,
            "Scheduling redelivery"
        );

        self.schedule(envelope, Duration::from_millis(self.config.redelivery_delay_ms));
        Ok(())
    }

    async fn defer(&self, envelope: Envelope, delay: Duration) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        tracing::debug!(
            notification_id = %envelope.task.notification_id,
            delivery = envelope.delivery_count,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Deferring task"
        );

        self.schedule(envelope, delay);
        Ok(())
    }

    async fn receive_dead_letter(&self) -> Option<Envelope> {
        let mut rx = self.dead_rx.lock().await;
        self.until_closed(rx.recv()).await
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.close_notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use courier_common::NotificationId;

    use super::*;

    fn transport(max_redeliveries: u32) -> MemoryTransport {
        MemoryTransport::new(TransportConfig {
            max_redeliveries,
            redelivery_delay_ms: 100,
            capacity: 4,
        })
    }

    #[tokio::test]
    async fn test_publish_then_receive() {
        let transport = transport(1);
        let task = DeliveryTask::new(NotificationId::generate());

        transport.publish(task.clone()).await.unwrap();
        assert_eq!(transport.len(), 1);

        let envelope = transport.receive().await.unwrap();
        assert_eq!(envelope.task, task);
        assert_eq!(envelope.delivery_count, 1);
        transport.ack(&envelope).await;
        assert!(transport.is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_rejects_publish() {
        let transport = transport(1);
        for _ in 0..4 {
            transport
                .publish(DeliveryTask::new(NotificationId::generate()))
                .await
                .unwrap();
        }

        let err = transport
            .publish(DeliveryTask::new(NotificationId::generate()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Publish { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nack_redelivers_after_delay() {
        let transport = transport(2);
        transport
            .publish(DeliveryTask::new(NotificationId::generate()))
            .await
            .unwrap();

        let first = transport.receive().await.unwrap();
        transport.nack(first).await.unwrap();
        assert!(transport.is_empty());

        let second = transport.receive().await.unwrap();
        assert_eq!(second.delivery_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_defer_keeps_delivery_count() {
        let transport = transport(1);
        transport
            .publish(DeliveryTask::new(NotificationId::generate()))
            .await
            .unwrap();

        let mut envelope = transport.receive().await.unwrap();
        for _ in 0..5 {
            transport
                .defer(envelope, Duration::from_secs(30))
                .await
                .unwrap();
            assert!(transport.is_empty());
            envelope = transport.receive().await.unwrap();
        }
        assert_eq!(envelope.delivery_count, 1);

        // Deferring never spent the budget, a nack still redelivers.
        transport.nack(envelope).await.unwrap();
        assert_eq!(transport.receive().await.unwrap().delivery_count, 2);
        assert!(transport.dead_rx.lock().await.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_dead_letters() {
        let transport = transport(1);
        let task = DeliveryTask::new(NotificationId::generate());
        transport.publish(task.clone()).await.unwrap();

        let first = transport.receive().await.unwrap();
        transport.nack(first).await.unwrap();
        let second = transport.receive().await.unwrap();
        transport.nack(second).await.unwrap();

        let dead = transport.receive_dead_letter().await.unwrap();
        assert_eq!(dead.task, task);
        assert_eq!(dead.delivery_count, 2);
    }

    #[tokio::test]
    async fn test_close_wakes_receivers_and_rejects_publish() {
        let transport = std::sync::Arc::new(transport(1));

        let waiter = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.receive().await })
        };
        tokio::task::yield_now().await;

        transport.close();
        assert_eq!(waiter.await.unwrap(), None);
        assert_eq!(
            transport
                .publish(DeliveryTask::new(NotificationId::generate()))
                .await,
            Err(TransportError::Closed)
        );
        assert_eq!(transport.receive_dead_letter().await, None);
    }
}
