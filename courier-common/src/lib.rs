//! Notification model shared by every courier crate: the aggregate and its
//! lifecycle, delivery attempts and results, the transport task, and the
//! logging setup.

pub mod attempt;
pub mod channel;
pub mod error;
pub mod id;
pub mod logging;
pub mod notification;
pub mod result;
pub mod status;
pub mod task;
pub mod traits;

pub use attempt::{AttemptOutcome, DeliveryAttempt};
pub use channel::Channel;
pub use error::{ParseError, StateError};
pub use id::{CorrelationId, NotificationId};
pub use notification::{Metadata, Notification};
pub use result::{DeliveryResult, ErrorCode};
pub use status::{LifecycleEvent, NotificationStatus};
pub use task::DeliveryTask;
pub use tracing;

#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
    Finalised,
}
