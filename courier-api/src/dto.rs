//! Request and response bodies

use chrono::{DateTime, Utc};
use courier_common::{
    AttemptOutcome, Channel, DeliveryAttempt, Metadata, Notification, NotificationId,
    NotificationStatus,
};
use courier_delivery::{FieldError, NewNotification};
use courier_store::{Page, PageRequest};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

const DEFAULT_PAGE_SIZE: u32 = 20;

/// Body of `POST /api/v1/notifications`
///
/// `channel` is kept as text so that a missing or unknown channel is
/// reported like any other invalid field instead of as unreadable JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationRequest {
    pub channel: Option<String>,
    #[serde(default)]
    pub recipient: String,
    pub subject: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl TryFrom<NotificationRequest> for NewNotification {
    type Error = ApiError;

    fn try_from(request: NotificationRequest) -> Result<Self, Self::Error> {
        let channel = match request.channel.as_deref().map(str::trim) {
            None | Some("") => Err(FieldError::new("channel", "must not be null")),
            Some(code) => code.parse::<Channel>().map_err(|_| {
                FieldError::new("channel", "must be one of EMAIL, SMS, CONSOLE")
            }),
        }
        .map_err(|field| ApiError::validation(&[field]))?;

        let mut new = Self::new(channel, request.recipient, request.content)
            .with_metadata(request.metadata);
        if let Some(subject) = request.subject {
            new = new.with_subject(subject);
        }

        Ok(new)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptResponse {
    pub attempt_number: u32,
    pub status: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&DeliveryAttempt> for AttemptResponse {
    fn from(attempt: &DeliveryAttempt) -> Self {
        Self {
            attempt_number: attempt.sequence,
            status: attempt.outcome,
            error_message: attempt.error_message.clone(),
            error_code: attempt.error_code.as_ref().map(ToString::to_string),
            timestamp: attempt.attempted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationResponse {
    pub id: NotificationId,
    pub channel: Channel,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub status: NotificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    pub attempt_count: u32,
    /// Only filled in when a single notification is fetched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<Vec<AttemptResponse>>,
    pub tracking_url: String,
}

impl NotificationResponse {
    /// Summary without the attempt history, as used in listings
    #[must_use]
    pub fn summary(notification: &Notification) -> Self {
        let id = notification.id();
        Self {
            id,
            channel: notification.channel(),
            recipient: notification.recipient().to_string(),
            subject: notification.subject().map(str::to_string),
            status: notification.status(),
            failure_reason: notification.failure_reason().map(str::to_string),
            metadata: notification.metadata().clone(),
            created_at: notification.created_at(),
            updated_at: notification.updated_at(),
            delivered_at: notification.delivered_at(),
            attempt_count: notification.attempt_count(),
            attempts: None,
            tracking_url: format!("/api/v1/notifications/{id}"),
        }
    }

    #[must_use]
    pub fn with_attempts(notification: &Notification) -> Self {
        Self {
            attempts: Some(
                notification
                    .attempts()
                    .iter()
                    .map(AttemptResponse::from)
                    .collect(),
            ),
            ..Self::summary(notification)
        }
    }
}

/// Body of `GET /api/v1/notifications/{id}/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub id: NotificationId,
    pub status: NotificationStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl From<&Notification> for StatusResponse {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id(),
            status: notification.status(),
            delivered_at: notification.delivered_at(),
            failure_reason: notification.failure_reason().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> From<Page<T>> for PageResponse<T> {
    fn from(page: Page<T>) -> Self {
        let total_pages = page.total_pages();
        Self {
            items: page.items,
            page: page.page,
            size: page.size,
            total: page.total,
            total_pages,
        }
    }
}

/// Query string of `GET /api/v1/notifications`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl ListQuery {
    /// The status filter, if any.
    ///
    /// # Errors
    /// `INVALID_PARAMETER` for a status that does not exist.
    pub fn status(&self) -> Result<Option<NotificationStatus>, ApiError> {
        self.status
            .as_deref()
            .filter(|status| !status.trim().is_empty())
            .map(|status| {
                status.parse().map_err(|_| {
                    ApiError::invalid_parameter(format!(
                        "The parameter 'status' has an invalid value: '{status}'"
                    ))
                })
            })
            .transpose()
    }

    /// Page selector with `size` clamped to `1..=max_size`.
    #[must_use]
    pub fn page_request(&self, max_size: u32) -> PageRequest {
        let size = self
            .size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, max_size.max(1));
        PageRequest::new(self.page.unwrap_or(0), size)
    }
}
