//! Error types of the HTTP boundary

use std::collections::BTreeMap;

use axum::{
    Json,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use courier_delivery::{FieldError, ServiceError};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while starting or running the server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind API server to {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("API server error: {0}")]
    Serve(String),
}

/// Body of every error response
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    /// Canonical reason phrase of `status`
    pub error: &'static str,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Per-field validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}

/// A failed request, rendered as [`ApiErrorResponse`]
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub path: Option<String>,
    pub details: Option<BTreeMap<String, String>>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            path: None,
            details: None,
        }
    }

    /// Attach the path of the request that failed.
    #[must_use]
    pub fn at(mut self, uri: &Uri) -> Self {
        self.path = Some(uri.path().to_string());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: BTreeMap<String, String>) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND", message)
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_JSON", message)
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_PARAMETER", message)
    }

    /// 400 listing every rejected field
    pub fn validation(fields: &[FieldError]) -> Self {
        let mut details = BTreeMap::<String, String>::new();
        for field in fields {
            details
                .entry(field.field.to_string())
                .and_modify(|existing| {
                    existing.push_str("; ");
                    existing.push_str(&field.reason);
                })
                .or_insert_with(|| field.reason.clone());
        }

        Self::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "Request validation failed",
        )
        .with_details(details)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(id) => Self::not_found(format!("Notification not found: {id}")),
            ServiceError::Invalid(fields) => Self::validation(&fields),
            ServiceError::Publish { id, source } => {
                tracing::error!(notification_id = %id, error = %source, "Notification could not be queued");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "PUBLISH_FAILED",
                    format!("Notification {id} was stored but could not be queued"),
                )
            }
            ServiceError::IllegalState(e) => {
                tracing::warn!(error = %e, "Illegal state transition requested");
                Self::new(StatusCode::CONFLICT, "INVALID_STATE", e.to_string())
            }
            ServiceError::Store(e) => {
                tracing::error!(error = %e, "Store error");
                Self::internal("An internal error occurred")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            timestamp: Utc::now(),
            status: self.status.as_u16(),
            error: self.status.canonical_reason().unwrap_or("Unknown"),
            message: self.message,
            code: self.code,
            path: self.path,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use courier_common::{LifecycleEvent, NotificationId, NotificationStatus, StateError};
    use courier_delivery::TransportError;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_service_errors_map_to_statuses() {
        let id = NotificationId::generate();

        let cases = [
            (ServiceError::NotFound(id), StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND"),
            (
                ServiceError::Invalid(vec![FieldError::new("recipient", "must not be blank")]),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                ServiceError::Publish {
                    id,
                    source: TransportError::Closed,
                },
                StatusCode::SERVICE_UNAVAILABLE,
                "PUBLISH_FAILED",
            ),
            (
                ServiceError::IllegalState(StateError::IllegalTransition {
                    from: NotificationStatus::Delivered,
                    event: LifecycleEvent::Retry,
                }),
                StatusCode::CONFLICT,
                "INVALID_STATE",
            ),
        ];

        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status, status);
            assert_eq!(api.code, code);
        }
    }

    #[test]
    fn test_validation_details_merge_per_field() {
        let err = ApiError::validation(&[
            FieldError::new("recipient", "must not be blank"),
            FieldError::new("content", "must not be blank"),
            FieldError::new("recipient", "too long"),
        ]);

        let details = err.details.unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details["recipient"], "must not be blank; too long");
        assert_eq!(details["content"], "must not be blank");
    }

    #[test]
    fn test_path_is_attached() {
        let uri: Uri = "/api/v1/notifications/abc?x=1".parse().unwrap();
        let err = ApiError::invalid_parameter("bad id").at(&uri);
        assert_eq!(err.path.as_deref(), Some("/api/v1/notifications/abc"));
    }
}
