//! Entry point for callers outside the pipeline: creating notifications,
//! looking them up, and resolving them by hand.

use std::sync::Arc;

use courier_common::{Channel, Metadata, Notification, NotificationId, NotificationStatus, internal, tracing};
use courier_store::{NotificationStore, Page, PageRequest};

use crate::{
    error::{FieldError, ServiceError},
    publisher::DispatchPublisher,
};

pub const MAX_RECIPIENT_LENGTH: usize = 255;
pub const MAX_SUBJECT_LENGTH: usize = 500;
pub const MAX_CONTENT_LENGTH: usize = 10_000;

/// Page size used when walking every stored notification
const SCAN_PAGE_SIZE: u32 = 100;

/// A request to send one notification
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub channel: Channel,
    pub recipient: String,
    pub subject: Option<String>,
    pub content: String,
    pub metadata: Metadata,
}

impl NewNotification {
    pub fn new(channel: Channel, recipient: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            channel,
            recipient: recipient.into(),
            subject: None,
            content: content.into(),
            metadata: Metadata::new(),
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

    /// Field limits shared by every channel. Channel-specific formats are
    /// checked by the sender at delivery time.
    ///
    /// # Errors
    /// Every field that breaks a limit.
    pub fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = Vec::new();

        if self.recipient.trim().is_empty() {
            errors.push(FieldError::new("recipient", "Recipient is required"));
        } else if self.recipient.chars().count() > MAX_RECIPIENT_LENGTH {
            errors.push(FieldError::new(
                "recipient",
                format!("Recipient must not exceed {MAX_RECIPIENT_LENGTH} characters"),
            ));
        }

        if self
            .subject
            .as_ref()
            .is_some_and(|subject| subject.chars().count() > MAX_SUBJECT_LENGTH)
        {
            errors.push(FieldError::new(
                "subject",
                format!("Subject must not exceed {MAX_SUBJECT_LENGTH} characters"),
            ));
        }

        if self.content.trim().is_empty() {
            errors.push(FieldError::new("content", "Content is required"));
        } else if self.content.chars().count() > MAX_CONTENT_LENGTH {
            errors.push(FieldError::new(
                "content",
                format!("Content must not exceed {MAX_CONTENT_LENGTH} characters"),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Invalid(errors))
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    publisher: DispatchPublisher,
}

impl NotificationService {
    #[must_use]
    pub fn new(store: Arc<dyn NotificationStore>, publisher: DispatchPublisher) -> Self {
        Self { store, publisher }
    }

    /// Persist a new notification, publish its first task and mark it
    /// `QUEUED`.
    ///
    /// # Errors
    /// - [`ServiceError::Invalid`] when the request breaks a field limit.
    /// - [`ServiceError::Publish`] when the task could not be published. The
    ///   notification is stored and stays `PENDING` until
    ///   [`requeue_pending`](Self::requeue_pending) picks it up.
    /// - [`ServiceError::Store`] on storage failures.
    pub async fn create_and_queue(&self, request: NewNotification) -> Result<Notification, ServiceError> {
        request.validate()?;

        let NewNotification {
            channel,
            recipient,
            subject,
            content,
            metadata,
        } = request;

        let mut notification = Notification::new(channel, recipient, content).with_metadata(metadata);
        if let Some(subject) = subject {
            notification = notification.with_subject(subject);
        }

        let id = self.store.create(&mut notification).await?;
        internal!(
            level = INFO,
            notification_id = %id,
            channel = channel.code(),
            "Notification created"
        );

        self.queue(&mut notification).await?;
        Ok(notification)
    }

    async fn queue(&self, notification: &mut Notification) -> Result<(), ServiceError> {
        let id = notification.id();
        let task = self
            .publisher
            .publish_new(id)
            .await
            .map_err(|source| {
                tracing::error!(
                    notification_id = %id,
                    error = %source,
                    "Failed to publish delivery task, notification left PENDING"
                );
                ServiceError::Publish { id, source }
            })?;

        notification.mark_queued()?;
        self.store.save(notification).await?;

        tracing::debug!(
            notification_id = %id,
            correlation_id = %task.correlation_id,
            "Notification queued"
        );
        Ok(())
    }

    /// # Errors
    /// Storage failures.
    pub async fn find_by_id(&self, id: &NotificationId) -> Result<Option<Notification>, ServiceError> {
        Ok(self.store.get(id).await?)
    }

    /// The notification together with its full attempt history.
    ///
    /// # Errors
    /// [`ServiceError::NotFound`] for unknown ids, and storage failures.
    pub async fn find_by_id_with_attempts(&self, id: &NotificationId) -> Result<Notification, ServiceError> {
        self.find_by_id(id).await?.ok_or(ServiceError::NotFound(*id))
    }

    /// # Errors
    /// Storage failures.
    pub async fn find_by_status(
        &self,
        status: NotificationStatus,
        page: PageRequest,
    ) -> Result<Page<Notification>, ServiceError> {
        Ok(self.store.query(status, page).await?)
    }

    /// # Errors
    /// Storage failures.
    pub async fn find_all(&self, page: PageRequest) -> Result<Page<Notification>, ServiceError> {
        Ok(self.store.query_all(page).await?)
    }

    /// Record an out-of-band delivery confirmation. Unknown ids and
    /// notifications that are already resolved are left alone.
    ///
    /// # Errors
    /// [`ServiceError::IllegalState`] unless the notification is
    /// `PROCESSING`, and storage failures.
    pub async fn mark_delivered(&self, id: &NotificationId) -> Result<(), ServiceError> {
        let Some(mut notification) = self.store.get(id).await? else {
            return Ok(());
        };
        if notification.is_terminal() {
            return Ok(());
        }

        notification.mark_delivered()?;
        self.store.save(&mut notification).await?;
        internal!(level = INFO, notification_id = %id, "Notification marked delivered");
        Ok(())
    }

    /// Fail a notification by hand. Unknown ids are ignored and a resolved
    /// notification keeps its outcome.
    ///
    /// # Errors
    /// Storage failures.
    pub async fn mark_failed(&self, id: &NotificationId, reason: impl Into<String>) -> Result<(), ServiceError> {
        let Some(mut notification) = self.store.get(id).await? else {
            return Ok(());
        };
        if notification.is_terminal() {
            return Ok(());
        }

        let reason = reason.into();
        if notification.status() == NotificationStatus::Processing {
            notification.mark_failed(reason)?;
        } else {
            notification.dead_letter(reason)?;
        }
        self.store.save(&mut notification).await?;
        internal!(level = INFO, notification_id = %id, "Notification marked failed");
        Ok(())
    }

    /// Publish tasks for notifications a previous run left behind: `PENDING`
    /// ones whose publish failed or never happened, `QUEUED` ones whose task
    /// was lost with the transport, and `PROCESSING` ones whose cycle was cut
    /// short. Returns how many were published.
    ///
    /// An interrupted `PROCESSING` notification cannot start a new cycle, so
    /// its task is refused until the transport dead-letters it and the
    /// dead-letter handler marks it `FAILED`.
    ///
    /// # Errors
    /// Storage failures. Publish failures are logged and skipped so one
    /// stuck notification does not block the rest.
    pub async fn requeue_pending(&self) -> Result<usize, ServiceError> {
        // Snapshot every status before publishing: queueing a PENDING
        // notification moves it to QUEUED and it must not be seen twice.
        let mut stranded = Vec::new();
        for status in [
            NotificationStatus::Pending,
            NotificationStatus::Queued,
            NotificationStatus::Processing,
        ] {
            stranded.extend(self.ids_with_status(status).await?);
        }

        let mut requeued = 0;
        for id in stranded {
            let Some(mut notification) = self.store.get(&id).await? else {
                continue;
            };

            let result = match notification.status() {
                NotificationStatus::Pending => self.queue(&mut notification).await,
                NotificationStatus::Queued | NotificationStatus::Processing => self
                    .publisher
                    .publish_new(id)
                    .await
                    .map(|_| ())
                    .map_err(|source| ServiceError::Publish { id, source }),
                NotificationStatus::Delivered | NotificationStatus::Failed => continue,
            };

            match result {
                Ok(()) => requeued += 1,
                Err(err @ ServiceError::Publish { .. }) => {
                    tracing::warn!(notification_id = %id, error = %err, "Could not requeue notification");
                }
                Err(err) => return Err(err),
            }
        }

        if requeued > 0 {
            internal!(level = INFO, requeued, "Requeued notifications left by a previous run");
        }
        Ok(requeued)
    }

    async fn ids_with_status(&self, status: NotificationStatus) -> Result<Vec<NotificationId>, ServiceError> {
        let mut ids = Vec::new();
        let mut page = 0;
        loop {
            let batch = self
                .store
                .query(status, PageRequest::new(page, SCAN_PAGE_SIZE))
                .await?;
            let last = u64::from(page + 1) >= batch.total_pages();
            ids.extend(batch.items.iter().map(Notification::id));
            if last {
                return Ok(ids);
            }
            page += 1;
        }
    }
}
