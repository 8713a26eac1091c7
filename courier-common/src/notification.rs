//! The notification aggregate.
//!
//! Every status change goes through one of the transition methods below, which
//! check the lifecycle graph and stamp the relevant timestamps in the same
//! step. A failed transition leaves the notification untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    attempt::DeliveryAttempt,
    channel::Channel,
    error::StateError,
    id::NotificationId,
    result::DeliveryResult,
    status::{LifecycleEvent, NotificationStatus},
    traits::FiniteStateMachine,
};

/// Free-form caller supplied data carried alongside a notification
pub type Metadata = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    id: NotificationId,
    channel: Channel,
    recipient: String,
    subject: Option<String>,
    content: String,
    #[serde(default)]
    metadata: Metadata,
    status: NotificationStatus,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    attempts: Vec<DeliveryAttempt>,
    /// Bumped by the store on every successful save
    #[serde(default)]
    version: u64,
}

impl Notification {
    /// A fresh notification in `PENDING` with a newly generated id
    #[must_use]
    pub fn new(channel: Channel, recipient: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: NotificationId::generate(),
            channel,
            recipient: recipient.into(),
            subject: None,
            content: content.into(),
            metadata: Metadata::new(),
            status: NotificationStatus::Pending,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            delivered_at: None,
            attempts: Vec::new(),
            version: 0,
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub const fn id(&self) -> NotificationId {
        self.id
    }

    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    #[must_use]
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub const fn status(&self) -> NotificationStatus {
        self.status
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub const fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    #[must_use]
    pub fn attempts(&self) -> &[DeliveryAttempt] {
        &self.attempts
    }

    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        u32::try_from(self.attempts.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn last_attempt(&self) -> Option<&DeliveryAttempt> {
        self.attempts.last()
    }

    /// Error message of the most recent attempt, if it failed with one
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_attempt()
            .and_then(|attempt| attempt.error_message.as_deref())
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Move to the next version after the record was durably written.
    ///
    /// Only storage backends should call this.
    pub const fn advance_version(&mut self) {
        self.version += 1;
    }

    fn apply(&mut self, event: LifecycleEvent) -> Result<DateTime<Utc>, StateError> {
        let next = self.status.transition(event)?;
        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        Ok(now)
    }

    /// `PENDING -> QUEUED`
    ///
    /// # Errors
    /// If the notification is not `PENDING`.
    pub fn mark_queued(&mut self) -> Result<(), StateError> {
        self.apply(LifecycleEvent::Enqueue).map(drop)
    }

    /// `QUEUED -> PROCESSING`
    ///
    /// # Errors
    /// If the notification is not `QUEUED`.
    pub fn mark_processing(&mut self) -> Result<(), StateError> {
        self.apply(LifecycleEvent::BeginProcessing).map(drop)
    }

    /// Append an attempt mirroring `result`, numbered after the last one.
    ///
    /// Attempts can only be recorded while `PROCESSING`; the caller follows up
    /// with the transition the result calls for and saves both together.
    ///
    /// # Errors
    /// If the notification is not `PROCESSING`.
    pub fn record_attempt(&mut self, result: &DeliveryResult) -> Result<&DeliveryAttempt, StateError> {
        if self.status != NotificationStatus::Processing {
            return Err(StateError::NotProcessing(self.status));
        }

        let now = Utc::now();
        let sequence = self.attempt_count().saturating_add(1);
        self.attempts
            .push(DeliveryAttempt::from_result(sequence, result, now));
        self.updated_at = now;

        self.attempts
            .last()
            .ok_or(StateError::NotProcessing(self.status))
    }

    /// `PROCESSING -> DELIVERED`, stamping `delivered_at`
    ///
    /// # Errors
    /// If the notification is not `PROCESSING`.
    pub fn mark_delivered(&mut self) -> Result<(), StateError> {
        let now = self.apply(LifecycleEvent::Succeed)?;
        self.delivered_at = Some(now);
        Ok(())
    }

    /// `PROCESSING -> QUEUED`, ready for another attempt
    ///
    /// # Errors
    /// If the notification is not `PROCESSING`.
    pub fn requeue_for_retry(&mut self) -> Result<(), StateError> {
        self.apply(LifecycleEvent::Retry).map(drop)
    }

    /// `PROCESSING -> FAILED`
    ///
    /// # Errors
    /// If the notification is not `PROCESSING`.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), StateError> {
        self.apply(LifecycleEvent::Fail)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// Any non-terminal state `-> FAILED`
    ///
    /// # Errors
    /// If the notification is already terminal.
    pub fn dead_letter(&mut self, reason: impl Into<String>) -> Result<(), StateError> {
        self.apply(LifecycleEvent::DeadLetter)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }
}
