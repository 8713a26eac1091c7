//! Delivery pipeline for courier notifications
//!
//! This crate provides:
//! - Channel senders and the registry that resolves them
//! - The orchestrator running one delivery cycle per task, and the
//!   dead-letter handler
//! - The dispatch publisher and an in-process transport
//! - The worker pool consuming tasks from the transport
//! - The notification service used by the HTTP boundary

mod circuit_breaker;
mod config;
mod error;
mod orchestrator;
pub mod policy;
mod processor;
mod publisher;
mod registry;
pub mod sender;
mod service;
pub mod transport;

pub use circuit_breaker::{Admission, CircuitBreaker, CircuitBreakerConfig, CircuitSettings};
pub use config::{ChannelsConfig, DeliveryConfig};
pub use error::{
    DeliveryError, FieldError, SendError, ServiceError, TransportError, UnsupportedChannel,
};
pub use orchestrator::{CycleOutcome, DeadLetterOutcome, DeferReason, DeliveryOrchestrator, SkipReason};
pub use policy::{RetryMode, RetryPolicy};
pub use processor::DeliveryProcessor;
pub use publisher::DispatchPublisher;
pub use registry::SenderRegistry;
pub use sender::{ChannelSender, Sender};
pub use service::{
    MAX_CONTENT_LENGTH, MAX_RECIPIENT_LENGTH, MAX_SUBJECT_LENGTH, NewNotification,
    NotificationService,
};
pub use transport::{Envelope, MemoryTransport, Transport, TransportConfig};
