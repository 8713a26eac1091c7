//! Delivery policies, kept apart from the orchestrator so they can be
//! reasoned about and tested on their own.
//!
//! - [`RetryPolicy`]: how many attempts a notification gets
//! - [`RetryMode`]: how a retry is handed back to the transport

pub mod retry;

pub use retry::{RetryMode, RetryPolicy};
