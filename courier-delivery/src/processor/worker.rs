//! Handling for a single envelope, spawned once per received task

use std::{sync::Arc, time::Duration};

use courier_common::{NotificationId, tracing};
use dashmap::DashSet;

use crate::{
    error::DeliveryError,
    orchestrator::{CycleOutcome, DeadLetterOutcome, DeferReason, DeliveryOrchestrator},
    policy::RetryMode,
    publisher::DispatchPublisher,
    transport::{Envelope, Transport},
};

/// Everything a spawned delivery task needs; cheap to clone.
#[derive(Debug, Clone)]
pub(crate) struct Worker {
    pub(crate) orchestrator: DeliveryOrchestrator,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) publisher: DispatchPublisher,
    pub(crate) retry_mode: RetryMode,
    pub(crate) in_flight: Arc<DashSet<NotificationId>>,
}

/// Claim on a notification for the lifetime of one cycle in this process.
/// Released on drop, so a panicking cycle cannot leave it claimed.
struct InFlight {
    set: Arc<DashSet<NotificationId>>,
    id: NotificationId,
}

impl InFlight {
    fn acquire(set: &Arc<DashSet<NotificationId>>, id: NotificationId) -> Option<Self> {
        set.insert(id).then(|| Self {
            set: Arc::clone(set),
            id,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

impl Worker {
    /// Run a delivery cycle for `envelope` and settle it with the transport.
    pub(crate) async fn deliver(self, envelope: Envelope) {
        let id = envelope.task.notification_id;

        let Some(_claim) = InFlight::acquire(&self.in_flight, id) else {
            tracing::debug!(
                notification_id = %id,
                "Another cycle for this notification is running, redelivering later"
            );
            self.nack(envelope).await;
            return;
        };

        let result = self
            .orchestrator
            .process(&envelope.task, envelope.delivery_count)
            .await;

        self.settle(envelope, result).await;
    }

    /// Resolve a task the transport dead-lettered.
    pub(crate) async fn dead_letter(self, envelope: Envelope) {
        let id = envelope.task.notification_id;
        match self
            .orchestrator
            .handle_dead_letter(&envelope.task, envelope.delivery_count)
            .await
        {
            Ok(DeadLetterOutcome::Failed { .. }) => {}
            Ok(DeadLetterOutcome::Skipped(reason)) => {
                tracing::debug!(notification_id = %id, %reason, "Dead-lettered task skipped");
            }
            Err(err) => {
                tracing::error!(
                    notification_id = %id,
                    error = %err,
                    "Failed to resolve dead-lettered task"
                );
            }
        }
    }

    async fn settle(&self, envelope: Envelope, result: Result<CycleOutcome, DeliveryError>) {
        let id = envelope.task.notification_id;

        match result {
            Ok(CycleOutcome::RetryRequested { .. }) if self.retry_mode == RetryMode::Republish => {
                match self.publisher.publish_retry(&envelope.task).await {
                    Ok(next) => {
                        tracing::debug!(
                            notification_id = %id,
                            attempt = next.attempt_number,
                            "Published retry task"
                        );
                        self.transport.ack(&envelope).await;
                    }
                    Err(err) => {
                        tracing::warn!(
                            notification_id = %id,
                            error = %err,
                            "Could not publish retry task, falling back to redelivery"
                        );
                        self.nack(envelope).await;
                    }
                }
            }
            Ok(CycleOutcome::Deferred(DeferReason::CircuitOpen { retry_after })) => {
                self.defer(envelope, retry_after).await;
            }
            Ok(outcome) if outcome.needs_redelivery() => self.nack(envelope).await,
            Ok(_) => self.transport.ack(&envelope).await,
            Err(err) if err.is_conflict() => {
                tracing::debug!(
                    notification_id = %id,
                    "Another cycle saved this notification first, dropping task"
                );
                self.transport.ack(&envelope).await;
            }
            Err(err) => {
                tracing::error!(
                    notification_id = %id,
                    deliveries = envelope.delivery_count,
                    error = %err,
                    "Delivery cycle failed"
                );
                self.nack(envelope).await;
            }
        }
    }

    async fn nack(&self, envelope: Envelope) {
        let id = envelope.task.notification_id;
        if let Err(err) = self.transport.nack(envelope).await {
            tracing::error!(notification_id = %id, error = %err, "Failed to return task to the transport");
        }
    }

    /// Hand the task back without spending its redelivery budget.
    async fn defer(&self, envelope: Envelope, delay: Duration) {
        let id = envelope.task.notification_id;
        if let Err(err) = self.transport.defer(envelope, delay).await {
            tracing::warn!(notification_id = %id, error = %err, "Could not defer task");
        }
    }
}
