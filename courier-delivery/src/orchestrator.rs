//! One delivery cycle for one task.
//!
//! A cycle loads the notification, claims it by moving it to `PROCESSING`,
//! hands it to the channel's sender and folds the result back into the
//! lifecycle. The claim is saved with the version that was loaded, so when
//! two cycles race for the same notification only one of them gets past the
//! store; the other fails with a conflict and leaves no trace.
//!
//! The recorded attempt and the status change it causes are saved together,
//! in one write.
//!
//! The cycle never signals retries by failing. It reports what happened as a
//! [`CycleOutcome`] and the worker pool translates that into whatever the
//! transport needs.

use std::{fmt, sync::Arc, time::Duration};

use courier_common::{DeliveryTask, NotificationStatus, incoming, internal, tracing};
use courier_store::NotificationStore;

use crate::{
    circuit_breaker::{Admission, CircuitBreaker},
    error::DeliveryError,
    policy::RetryPolicy,
    registry::SenderRegistry,
};

/// Saves attempted before a dead-letter update gives up on a conflict
const DEAD_LETTER_SAVE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The sender accepted the notification.
    Delivered,

    /// The attempt failed and the notification went back to `QUEUED`; the
    /// task has to be delivered again.
    RetryRequested { attempt_count: u32 },

    /// The sender was not invoked and nothing was recorded; the task has to
    /// be delivered again later.
    Deferred(DeferReason),

    /// The notification reached `FAILED`.
    Failed { reason: String },

    /// Nothing to do for this task.
    Skipped(SkipReason),
}

impl CycleOutcome {
    /// Whether the transport has to deliver the task again
    #[must_use]
    pub const fn needs_redelivery(&self) -> bool {
        matches!(self, Self::RetryRequested { .. } | Self::Deferred(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    /// The channel's circuit breaker is open. The task is held for
    /// `retry_after` and does not count as a delivery.
    CircuitOpen { retry_after: Duration },

    /// The task arrived before its notification was marked `QUEUED`.
    NotQueued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No such notification; it was deleted or never existed.
    NotFound,

    /// The notification was already resolved.
    Terminal(NotificationStatus),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("notification not found"),
            Self::Terminal(status) => write!(f, "notification already {}", status.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterOutcome {
    /// The notification was moved to `FAILED`.
    Failed { reason: String },

    /// Nothing to do; it was already resolved or no longer exists.
    Skipped(SkipReason),
}

/// Drives delivery cycles against a store and a set of senders.
#[derive(Debug, Clone)]
pub struct DeliveryOrchestrator {
    store: Arc<dyn NotificationStore>,
    registry: Arc<SenderRegistry>,
    policy: RetryPolicy,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl DeliveryOrchestrator {
    #[must_use]
    pub fn new(store: Arc<dyn NotificationStore>, registry: Arc<SenderRegistry>, policy: RetryPolicy) -> Self {
        Self {
            store,
            registry,
            policy,
            circuit_breaker: None,
        }
    }

    #[must_use]
    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run one delivery cycle for `task`, which the transport has now
    /// delivered `delivery_count` times.
    ///
    /// # Errors
    /// - [`DeliveryError::IllegalState`] when the notification is in a state
    ///   no cycle should find it in, such as `PROCESSING` left behind by a
    ///   cycle that never finished.
    /// - [`DeliveryError::Store`] on storage failures, including a conflict
    ///   when another cycle saved the notification first.
    pub async fn process(&self, task: &DeliveryTask, delivery_count: u32) -> Result<CycleOutcome, DeliveryError> {
        let id = task.notification_id;

        incoming!(
            level = DEBUG,
            notification_id = %id,
            correlation_id = %task.correlation_id,
            attempt = task.attempt_number,
            deliveries = delivery_count,
            "Processing delivery task"
        );

        let Some(mut notification) = self.store.get(&id).await? else {
            tracing::warn!(notification_id = %id, "Notification not found, discarding task");
            return Ok(CycleOutcome::Skipped(SkipReason::NotFound));
        };

        if notification.is_terminal() {
            tracing::info!(
                notification_id = %id,
                status = notification.status().name(),
                "Notification already resolved, skipping"
            );
            return Ok(CycleOutcome::Skipped(SkipReason::Terminal(notification.status())));
        }

        if notification.status() == NotificationStatus::Pending {
            tracing::debug!(notification_id = %id, "Notification not queued yet, deferring");
            return Ok(CycleOutcome::Deferred(DeferReason::NotQueued));
        }

        let channel = notification.channel();
        if let Some(breaker) = &self.circuit_breaker
            && let Admission::Hold { retry_after } = breaker.admit(channel)
        {
            tracing::info!(
                notification_id = %id,
                channel = channel.code(),
                retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                "Circuit open, holding delivery"
            );
            return Ok(CycleOutcome::Deferred(DeferReason::CircuitOpen { retry_after }));
        }

        notification.mark_processing()?;
        self.store.save(&mut notification).await?;

        let sender = match self.registry.resolve(channel) {
            Ok(sender) => sender,
            Err(unsupported) => {
                let reason = unsupported.to_string();
                tracing::error!(notification_id = %id, channel = channel.code(), "{reason}");
                notification.mark_failed(reason.clone())?;
                self.store.save(&mut notification).await?;
                return Ok(CycleOutcome::Failed { reason });
            }
        };

        let result = sender.send(&notification).await;
        let attempt = notification.record_attempt(&result)?.sequence;
        if let Some(breaker) = &self.circuit_breaker {
            breaker.record(channel, &result);
        }

        let outcome = if result.success {
            notification.mark_delivered()?;
            CycleOutcome::Delivered
        } else if self.policy.should_retry(notification.attempt_count()) {
            notification.requeue_for_retry()?;
            CycleOutcome::RetryRequested {
                attempt_count: notification.attempt_count(),
            }
        } else {
            let reason = notification
                .last_error()
                .unwrap_or("Delivery failed")
                .to_string();
            notification.mark_failed(reason.clone())?;
            CycleOutcome::Failed { reason }
        };

        self.store.save(&mut notification).await?;

        match &outcome {
            CycleOutcome::Delivered => internal!(
                level = INFO,
                notification_id = %id,
                attempt,
                "Notification delivered"
            ),
            CycleOutcome::RetryRequested { .. } => tracing::warn!(
                notification_id = %id,
                attempt,
                remaining = self.policy.remaining_attempts(notification.attempt_count()),
                transient = result.is_transient(),
                error = notification.last_error().unwrap_or_default(),
                "Delivery failed, retry requested"
            ),
            CycleOutcome::Failed { reason } => tracing::error!(
                notification_id = %id,
                attempt,
                error = %reason,
                "Delivery failed permanently"
            ),
            CycleOutcome::Deferred(_) | CycleOutcome::Skipped(_) => {}
        }

        Ok(outcome)
    }

    /// Resolve a task the transport gave up on after delivering it
    /// `delivery_count` times. Calling this again for the same notification
    /// changes nothing.
    ///
    /// # Errors
    /// Storage failures, or a conflict that persisted across every retry.
    pub async fn handle_dead_letter(
        &self,
        task: &DeliveryTask,
        delivery_count: u32,
    ) -> Result<DeadLetterOutcome, DeliveryError> {
        let id = task.notification_id;
        let reason = format!("max retries exceeded after {delivery_count} attempts");

        let mut remaining = DEAD_LETTER_SAVE_ATTEMPTS;
        loop {
            remaining -= 1;
            let Some(mut notification) = self.store.get(&id).await? else {
                tracing::warn!(notification_id = %id, "Dead-lettered notification not found");
                return Ok(DeadLetterOutcome::Skipped(SkipReason::NotFound));
            };

            if notification.is_terminal() {
                tracing::debug!(
                    notification_id = %id,
                    status = notification.status().name(),
                    "Dead-lettered notification already resolved"
                );
                return Ok(DeadLetterOutcome::Skipped(SkipReason::Terminal(
                    notification.status(),
                )));
            }

            notification.dead_letter(reason.clone())?;
            match self.store.save(&mut notification).await {
                Ok(()) => {
                    tracing::error!(
                        notification_id = %id,
                        correlation_id = %task.correlation_id,
                        deliveries = delivery_count,
                        "Notification dead-lettered"
                    );
                    return Ok(DeadLetterOutcome::Failed { reason });
                }
                Err(err) if err.is_conflict() && remaining > 0 => {
                    tracing::debug!(notification_id = %id, "Conflict while dead-lettering, reloading");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
