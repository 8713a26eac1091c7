//! Persistence for notifications and their delivery attempts.

pub mod backends;
mod config;
mod error;
mod page;
mod traits;

pub use backends::{FileNotificationStore, MemoryNotificationStore, TestNotificationStore};
pub use config::{MemoryConfig, StoreConfig};
pub use error::{Result, StoreError};
pub use page::{Page, PageRequest};
pub use traits::NotificationStore;
