//! HTTP server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use courier_common::Signal;
use courier_delivery::NotificationService;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::{
    ApiConfig, HealthChecker, ServerError,
    routes::{self, AppState},
};

/// Serves the notification endpoints and the `/health/live` and
/// `/health/ready` probes on one listener.
pub struct ApiServer {
    listener: TcpListener,
    router: Router,
}

impl ApiServer {
    /// Bind the listener and build the router.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the configured address fails.
    pub async fn new(
        config: &ApiConfig,
        service: Arc<NotificationService>,
        health: Arc<HealthChecker>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|e| ServerError::Bind {
                address: config.listen_address.clone(),
                source: e,
            })?;

        tracing::info!(
            address = %config.listen_address,
            "API server bound successfully"
        );

        let state = AppState {
            service,
            health,
            max_page_size: config.max_page_size,
        };
        let router = routes::router(state).layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )));

        Ok(Self { listener, router })
    }

    /// The address actually bound, which differs from the configured one
    /// when port `0` was requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Serve(e.to_string()))
    }

    /// Run the server until a shutdown signal is received
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a runtime error.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), ServerError> {
        tracing::info!("API server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("API server received shutdown signal");
            })
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}
