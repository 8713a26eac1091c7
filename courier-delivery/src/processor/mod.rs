//! Worker pool consuming delivery tasks from the transport

mod worker;

use std::{sync::Arc, time::Duration};

use courier_common::{Signal, internal, tracing};
use courier_store::NotificationStore;
use dashmap::DashSet;
use tokio::{sync::broadcast, task::JoinSet};

use self::worker::Worker;
use crate::{
    circuit_breaker::CircuitBreaker,
    config::DeliveryConfig,
    error::DeliveryError,
    orchestrator::DeliveryOrchestrator,
    publisher::DispatchPublisher,
    registry::SenderRegistry,
    transport::Transport,
};

/// How long in-flight cycles get to finish once shutdown is requested
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Receives tasks and runs up to `max_concurrent_deliveries` delivery cycles
/// at once, each on its own tokio task.
///
/// Tasks for different notifications share nothing but the store. Two tasks
/// for the same notification never run at once within one processor; across
/// processes the store's version check keeps all but one from getting
/// through.
#[derive(Debug)]
pub struct DeliveryProcessor {
    config: DeliveryConfig,
    worker: Worker,
}

impl DeliveryProcessor {
    #[must_use]
    pub fn new(
        config: DeliveryConfig,
        store: Arc<dyn NotificationStore>,
        registry: Arc<SenderRegistry>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let mut orchestrator = DeliveryOrchestrator::new(store, registry, config.retry_policy());
        if let Some(breaker) = &config.circuit_breaker {
            orchestrator = orchestrator.with_circuit_breaker(Arc::new(CircuitBreaker::new(breaker)));
        }

        internal!(
            level = INFO,
            max_attempts = config.max_attempts,
            max_concurrent = config.max_concurrent_deliveries,
            retry_mode = ?config.retry_mode,
            circuit_breaker = config.circuit_breaker.is_some(),
            "Delivery processor configured"
        );

        Self {
            worker: Worker {
                orchestrator,
                publisher: DispatchPublisher::new(Arc::clone(&transport)),
                transport,
                retry_mode: config.retry_mode,
                in_flight: Arc::new(DashSet::new()),
            },
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    #[must_use]
    pub const fn orchestrator(&self) -> &DeliveryOrchestrator {
        &self.worker.orchestrator
    }

    /// Consume tasks until a shutdown signal arrives or the transport closes.
    ///
    /// ## Graceful Shutdown
    ///
    /// On shutdown the processor stops receiving, then waits up to 30
    /// seconds for running cycles. Cycles still running after that are
    /// aborted; their tasks were never acknowledged and are delivered again
    /// by a durable transport.
    ///
    /// # Errors
    /// [`DeliveryError::Configuration`] when the pool has no room for a
    /// single delivery.
    pub async fn serve(&self, mut shutdown: broadcast::Receiver<Signal>) -> Result<(), DeliveryError> {
        if self.config.max_concurrent_deliveries == 0 {
            return Err(DeliveryError::Configuration(
                "max_concurrent_deliveries must be at least 1".to_string(),
            ));
        }

        internal!(level = INFO, "Delivery processor starting");

        let transport = Arc::clone(&self.worker.transport);
        let mut workers = JoinSet::new();

        loop {
            let has_capacity = workers.len() < self.config.max_concurrent_deliveries;

            tokio::select! {
                biased;

                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!(level = INFO, "Delivery processor received shutdown signal");
                        }
                        Err(e) => {
                            tracing::error!("Delivery processor shutdown channel error: {e}");
                        }
                    }
                    break;
                }

                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("Delivery task ended abnormally: {e}");
                    }
                }

                envelope = transport.receive_dead_letter(), if has_capacity => {
                    let Some(envelope) = envelope else {
                        internal!("Transport closed");
                        break;
                    };
                    workers.spawn(self.worker.clone().dead_letter(envelope));
                }

                envelope = transport.receive(), if has_capacity => {
                    let Some(envelope) = envelope else {
                        internal!("Transport closed");
                        break;
                    };
                    workers.spawn(self.worker.clone().deliver(envelope));
                }
            }
        }

        Self::drain(workers).await;
        internal!(level = INFO, "Delivery processor shutdown complete");

        Ok(())
    }

    async fn drain(mut workers: JoinSet<()>) {
        if workers.is_empty() {
            return;
        }

        tracing::debug!(in_flight = workers.len(), "Waiting for in-flight deliveries");
        let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
            while workers.join_next().await.is_some() {}
        })
        .await;

        if drained.is_ok() {
            internal!("All in-flight deliveries completed");
        } else {
            tracing::warn!(
                remaining = workers.len(),
                "Shutdown timeout exceeded, aborting remaining deliveries"
            );
            workers.abort_all();
        }
    }
}
