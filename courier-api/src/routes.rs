//! Route table and handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use courier_common::{NotificationId, incoming, tracing};
use courier_delivery::{NewNotification, NotificationService};

use crate::{
    HealthChecker,
    dto::{ListQuery, NotificationRequest, NotificationResponse, PageResponse, StatusResponse},
    error::{ApiError, ApiResult},
};

/// Shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<NotificationService>,
    pub health: Arc<HealthChecker>,
    pub max_page_size: u32,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/notifications",
            get(list_notifications).post(create_notification),
        )
        .route("/api/v1/notifications/{id}", get(get_notification))
        .route(
            "/api/v1/notifications/{id}/status",
            get(get_notification_status),
        )
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(state)
}

fn parse_id(raw: &str) -> ApiResult<NotificationId> {
    raw.parse().map_err(|_| {
        ApiError::invalid_parameter(format!("The parameter 'id' has an invalid value: '{raw}'"))
    })
}

/// Create a notification and queue it. Delivery happens asynchronously, so
/// the answer is `202 Accepted` with the notification as stored.
async fn create_notification(
    State(state): State<AppState>,
    uri: Uri,
    payload: Result<Json<NotificationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<NotificationResponse>)> {
    let Json(request) = payload.map_err(|e| {
        tracing::warn!(error = %e, "Unreadable notification request");
        ApiError::invalid_json(e.body_text()).at(&uri)
    })?;

    let new = NewNotification::try_from(request).map_err(|e| e.at(&uri))?;
    incoming!(
        level = INFO,
        channel = new.channel.code(),
        recipient = %new.recipient,
        "Notification request received"
    );

    let notification = state
        .service
        .create_and_queue(new)
        .await
        .map_err(|e| ApiError::from(e).at(&uri))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(NotificationResponse::summary(&notification)),
    ))
}

async fn get_notification(
    State(state): State<AppState>,
    uri: Uri,
    Path(id): Path<String>,
) -> ApiResult<Json<NotificationResponse>> {
    let id = parse_id(&id).map_err(|e| e.at(&uri))?;

    let notification = state
        .service
        .find_by_id_with_attempts(&id)
        .await
        .map_err(|e| ApiError::from(e).at(&uri))?;

    Ok(Json(NotificationResponse::with_attempts(&notification)))
}

async fn get_notification_status(
    State(state): State<AppState>,
    uri: Uri,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let id = parse_id(&id).map_err(|e| e.at(&uri))?;

    let notification = state
        .service
        .find_by_id(&id)
        .await
        .map_err(|e| ApiError::from(e).at(&uri))?
        .ok_or_else(|| ApiError::not_found(format!("Notification not found: {id}")).at(&uri))?;

    Ok(Json(StatusResponse::from(&notification)))
}

/// Newest first, optionally filtered by `status`.
async fn list_notifications(
    State(state): State<AppState>,
    uri: Uri,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<PageResponse<NotificationResponse>>> {
    let Query(query) = query.map_err(|e| ApiError::invalid_parameter(e.body_text()).at(&uri))?;
    let status = query.status().map_err(|e| e.at(&uri))?;
    let page = query.page_request(state.max_page_size);

    let found = match status {
        Some(status) => state.service.find_by_status(status, page).await,
        None => state.service.find_all(page).await,
    }
    .map_err(|e| ApiError::from(e).at(&uri))?;

    Ok(Json(found.map(|n| NotificationResponse::summary(&n)).into()))
}

/// Liveness probe handler
///
/// Returns 200 OK while the process can answer at all.
async fn liveness_handler(State(state): State<AppState>) -> Response {
    if state.health.is_alive() {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
    }
}

/// Readiness probe handler
///
/// Returns 200 OK once the store and the worker pool are up, otherwise 503
/// with the per-component status.
async fn readiness_handler(State(state): State<AppState>) -> Response {
    if state.health.is_ready() {
        (StatusCode::OK, "OK").into_response()
    } else {
        let status = state.health.get_status();
        tracing::warn!(
            store_ready = status.store_ready,
            delivery_ready = status.delivery_ready,
            "Readiness probe failed"
        );
        (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use courier_common::{Channel, NotificationStatus};
    use courier_delivery::{DispatchPublisher, MemoryTransport, TransportConfig};
    use courier_store::TestNotificationStore;

    use super::*;

    fn state() -> (AppState, TestNotificationStore) {
        let store = TestNotificationStore::new();
        let transport = Arc::new(MemoryTransport::new(TransportConfig::default()));
        let service = NotificationService::new(
            Arc::new(store.clone()),
            DispatchPublisher::new(transport),
        );

        let state = AppState {
            service: Arc::new(service),
            health: Arc::new(HealthChecker::new()),
            max_page_size: 100,
        };
        (state, store)
    }

    fn uri(path: &str) -> Uri {
        path.parse().unwrap()
    }

    fn request(channel: &str, recipient: &str, content: &str) -> NotificationRequest {
        NotificationRequest {
            channel: Some(channel.to_string()),
            recipient: recipient.to_string(),
            content: content.to_string(),
            ..NotificationRequest::default()
        }
    }

    #[tokio::test]
    async fn test_create_queues_and_accepts() {
        let (state, store) = state();

        let (status, Json(body)) = create_notification(
            State(state),
            uri("/api/v1/notifications"),
            Ok(Json(request("EMAIL", "a@b.com", "hello"))),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body.status, NotificationStatus::Queued);
        assert_eq!(body.channel, Channel::Email);
        assert_eq!(store.notification_count(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_fields_together() {
        let (state, store) = state();

        let err = create_notification(
            State(state),
            uri("/api/v1/notifications"),
            Ok(Json(request("SMS", " ", ""))),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "VALIDATION_ERROR");
        assert_eq!(err.path.as_deref(), Some("/api/v1/notifications"));
        let details = err.details.unwrap();
        assert!(details.contains_key("recipient"));
        assert!(details.contains_key("content"));
        assert_eq!(store.notification_count(), 0);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let (state, _store) = state();
        let id = NotificationId::generate();

        let err = get_notification(
            State(state),
            uri(&format!("/api/v1/notifications/{id}")),
            Path(id.to_string()),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "RESOURCE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_get_malformed_id_is_bad_request() {
        let (state, _store) = state();

        let err = get_notification_status(
            State(state),
            uri("/api/v1/notifications/not-an-id/status"),
            Path("not-an-id".to_string()),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "INVALID_PARAMETER");
    }

    #[tokio::test]
    async fn test_get_includes_attempts() {
        let (state, _store) = state();
        let (_, Json(created)) = create_notification(
            State(state.clone()),
            uri("/api/v1/notifications"),
            Ok(Json(request("CONSOLE", "ops", "deploy done"))),
        )
        .await
        .unwrap();

        let Json(fetched) = get_notification(
            State(state),
            uri(&format!("/api/v1/notifications/{}", created.id)),
            Path(created.id.to_string()),
        )
        .await
        .unwrap();

        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.attempts, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let (state, _store) = state();
        for i in 0..3 {
            create_notification(
                State(state.clone()),
                uri("/api/v1/notifications"),
                Ok(Json(request("CONSOLE", "ops", &format!("#{i}")))),
            )
            .await
            .unwrap();
        }

        let list = |status: &str| {
            list_notifications(
                State(state.clone()),
                uri("/api/v1/notifications"),
                Ok(Query(ListQuery {
                    status: Some(status.to_string()),
                    size: Some(2),
                    ..ListQuery::default()
                })),
            )
        };

        let Json(queued) = list("QUEUED").await.unwrap();
        assert_eq!(queued.total, 3);
        assert_eq!(queued.items.len(), 2);
        assert_eq!(queued.total_pages, 2);

        let Json(failed) = list("FAILED").await.unwrap();
        assert_eq!(failed.total, 0);

        let err = list("SOMEWHERE").await.unwrap_err();
        assert_eq!(err.code, "INVALID_PARAMETER");
    }

    #[tokio::test]
    async fn test_liveness_probe_always_passes() {
        let (state, _store) = state();
        let response = liveness_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_probe_fails_when_not_ready() {
        let (state, _store) = state();
        state.health.set_store_ready(true);

        let response = readiness_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_readiness_probe_passes_when_all_ready() {
        let (state, _store) = state();
        state.health.set_store_ready(true);
        state.health.set_delivery_ready(true);

        let response = readiness_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
