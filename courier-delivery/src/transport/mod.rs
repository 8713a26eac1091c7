//! Message transport between the publisher and the worker pool.
//!
//! The contract is at-least-once: a received [`Envelope`] must be
//! acknowledged or negatively acknowledged. A nack makes the transport
//! redeliver the task after its configured delay, until its own redelivery
//! budget runs out and the envelope moves to the dead-letter queue. That
//! budget is independent of the attempt bound the orchestrator enforces.
//!
//! A deferred task is handed back for later without counting as a delivery,
//! for when the worker chose not to run it yet.

mod memory;

use std::{fmt, time::Duration};

use async_trait::async_trait;
use courier_common::DeliveryTask;
use serde::Deserialize;

pub use self::memory::MemoryTransport;
use crate::error::TransportError;

/// A task as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub task: DeliveryTask,

    /// Times the transport has delivered this task, starting at 1.
    pub delivery_count: u32,
}

impl Envelope {
    #[must_use]
    pub const fn new(task: DeliveryTask) -> Self {
        Self {
            task,
            delivery_count: 1,
        }
    }

    #[must_use]
    pub const fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }

    /// The same task, delivered once more
    #[must_use]
    pub fn redelivered(self) -> Self {
        Self {
            delivery_count: self.delivery_count.saturating_add(1),
            ..self
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Enqueue a task for delivery.
    ///
    /// # Errors
    /// When the transport is closed or cannot accept the task.
    async fn publish(&self, task: DeliveryTask) -> Result<(), TransportError>;

    /// Wait for the next task. `None` once the transport is closed and
    /// drained.
    async fn receive(&self) -> Option<Envelope>;

    /// The task was handled and must not be delivered again.
    async fn ack(&self, envelope: &Envelope);

    /// The task must be delivered again, or dead-lettered once the
    /// redelivery budget is spent.
    ///
    /// # Errors
    /// When the envelope can be neither redelivered nor dead-lettered.
    async fn nack(&self, envelope: Envelope) -> Result<(), TransportError>;

    /// Deliver the task again after `delay`, with its delivery count
    /// unchanged.
    ///
    /// # Errors
    /// When the transport is closed.
    async fn defer(&self, envelope: Envelope, delay: Duration) -> Result<(), TransportError>;

    /// Wait for the next dead-lettered task.
    async fn receive_dead_letter(&self) -> Option<Envelope>;

    /// Stop accepting new tasks.
    fn close(&self);
}

const fn default_max_redeliveries() -> u32 {
    5
}

const fn default_redelivery_delay_ms() -> u64 {
    1000
}

const fn default_capacity() -> usize {
    10_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TransportConfig {
    /// Redeliveries after the first delivery before a task is dead-lettered
    #[serde(default = "default_max_redeliveries")]
    pub max_redeliveries: u32,

    #[serde(default = "default_redelivery_delay_ms")]
    pub redelivery_delay_ms: u64,

    /// Tasks that may wait in the queue at once
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_redeliveries: default_max_redeliveries(),
            redelivery_delay_ms: default_redelivery_delay_ms(),
            capacity: default_capacity(),
        }
    }
}
