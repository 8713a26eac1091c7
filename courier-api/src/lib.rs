//! HTTP boundary for courier
//!
//! Exposes notification creation and lookup, plus probes for container
//! orchestration.
//!
//! # Endpoints
//!
//! - **`POST /api/v1/notifications`** - Create and queue a notification (`202`)
//! - **`GET /api/v1/notifications`** - Newest first, `?status=&page=&size=`
//! - **`GET /api/v1/notifications/{id}`** - One notification with its attempts
//! - **`GET /api/v1/notifications/{id}/status`** - Status only
//! - **`/health/live`** - Liveness probe: 200 while the process answers
//! - **`/health/ready`** - Readiness probe: 200 once the store and the worker
//!   pool are up
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use courier_api::{ApiConfig, ApiServer, HealthChecker};
//! use courier_delivery::NotificationService;
//!
//! # async fn example(service: Arc<NotificationService>) -> Result<(), Box<dyn std::error::Error>> {
//! let health = Arc::new(HealthChecker::new());
//! let server = ApiServer::new(&ApiConfig::default(), service, health).await?;
//!
//! // server.serve(shutdown_receiver).await?;
//! # Ok(())
//! # }
//! ```

mod checker;
mod config;
mod dto;
mod error;
mod routes;
mod server;

pub use checker::{HealthChecker, HealthStatus};
pub use config::ApiConfig;
pub use dto::{
    AttemptResponse, ListQuery, NotificationRequest, NotificationResponse, PageResponse,
    StatusResponse,
};
pub use error::{ApiError, ApiErrorResponse, ApiResult, ServerError};
pub use routes::{AppState, router};
pub use server::ApiServer;
