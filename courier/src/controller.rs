use std::sync::{Arc, LazyLock};

use anyhow::Context;
use courier_api::{ApiConfig, ApiServer, HealthChecker};
use courier_common::{Signal, internal, logging, tracing};
use courier_delivery::{
    ChannelsConfig, DeliveryConfig, DeliveryProcessor, DispatchPublisher, MemoryTransport,
    NotificationService, SenderRegistry, Transport, TransportConfig,
};
use courier_store::StoreConfig;
use serde::Deserialize;
use tokio::sync::broadcast;

/// Root of the configuration file
#[derive(Debug, Default, Deserialize)]
pub struct Courier {
    #[serde(default)]
    store: StoreConfig,
    #[serde(default)]
    delivery: DeliveryConfig,
    #[serde(default)]
    channels: ChannelsConfig,
    #[serde(default)]
    transport: TransportConfig,
    #[serde(default)]
    api: ApiConfig,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!("Terminate Signal received, shutting down");
        }
    };

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(s) => tracing::debug!("Received {s:?}"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(e) => tracing::debug!("Received: {e:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    Ok(())
}

impl Courier {
    /// Run until interrupted, then drain and stop.
    ///
    /// # Errors
    ///
    /// This function will return an error if the store cannot be opened, the
    /// API cannot bind, or the worker pool is misconfigured.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        internal!("Controller running");

        let ret = tokio::select! {
            r = self.start(&SHUTDOWN_BROADCAST) => {
                r
            }
            r = shutdown() => {
                r
            }
        };

        internal!("Shutting down...");

        ret
    }

    /// Bring every component up and keep it running until `shutdown`
    /// broadcasts a signal.
    ///
    /// Notifications a previous run left unresolved get a fresh task before
    /// the worker pool starts, when so configured.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub async fn start(self, shutdown: &broadcast::Sender<Signal>) -> anyhow::Result<()> {
        let health = Arc::new(HealthChecker::new());

        let store = self
            .store
            .into_store()
            .await
            .context("Failed to open the notification store")?;
        health.set_store_ready(true);

        let registry = Arc::new(SenderRegistry::from_config(&self.channels));
        internal!(
            level = INFO,
            channels = ?registry.enabled_channels().collect::<Vec<_>>(),
            "Senders registered"
        );

        let transport = Arc::new(MemoryTransport::new(self.transport));
        let service = Arc::new(NotificationService::new(
            Arc::clone(&store),
            DispatchPublisher::new(transport.clone()),
        ));

        if self.delivery.requeue_pending_on_start {
            let requeued = service
                .requeue_pending()
                .await
                .context("Failed to requeue notifications left by a previous run")?;
            internal!(level = INFO, requeued, "Startup recovery complete");
        }

        let processor = DeliveryProcessor::new(self.delivery, store, registry, transport.clone());

        let api = if self.api.enabled {
            Some(ApiServer::new(&self.api, Arc::clone(&service), Arc::clone(&health)).await?)
        } else {
            internal!(level = INFO, "API server disabled");
            None
        };

        let delivery_shutdown = shutdown.subscribe();
        let api_shutdown = shutdown.subscribe();

        health.set_delivery_ready(true);

        let (delivery, api) = tokio::join!(processor.serve(delivery_shutdown), async move {
            match api {
                Some(server) => server.serve(api_shutdown).await,
                None => Ok(()),
            }
        });

        health.set_delivery_ready(false);
        transport.close();

        delivery.context("Delivery processor failed")?;
        api.context("API server failed")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use courier_delivery::RetryMode;

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let courier: Courier = ron::from_str("()").unwrap();

        assert!(matches!(courier.store, StoreConfig::Memory(_)));
        assert_eq!(courier.delivery.max_attempts, 3);
        assert!(courier.channels.console.enabled);
        assert_eq!(courier.transport.max_redeliveries, 5);
        assert!(courier.api.enabled);
    }

    #[test]
    fn test_sample_config_parses() {
        let courier: Courier = ron::from_str(include_str!("../../courier.config.ron")).unwrap();

        assert_eq!(courier.delivery.retry_mode, RetryMode::Redeliver);
        assert!(courier.delivery.circuit_breaker.is_some());
        assert_eq!(courier.api.listen_address, "[::]:8080");
    }
}
