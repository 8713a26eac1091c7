use std::sync::Arc;

use serde::Deserialize;

use crate::{
    backends::{FileNotificationStore, MemoryNotificationStore},
    traits::NotificationStore,
};

/// Which store backs the service
///
/// File-backed store in RON config:
/// ```ron
/// Courier (
///     store: (
///         type: "File",
///         path: "/var/lib/courier",
///     ),
/// )
/// ```
///
/// Memory-backed store, optionally capped:
/// ```ron
/// Courier (
///     store: (
///         type: "Memory",
///         capacity: 1000,
///     ),
/// )
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum StoreConfig {
    File(FileNotificationStore),
    Memory(MemoryConfig),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryConfig {
    /// Maximum number of notifications to hold (omit for unlimited)
    #[serde(default)]
    pub capacity: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory(MemoryConfig::default())
    }
}

impl StoreConfig {
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::File(store) => Some(store.path()),
            Self::Memory(_) => None,
        }
    }

    /// Build and initialise the configured store.
    ///
    /// # Errors
    /// If a file store's directory cannot be prepared.
    pub async fn into_store(self) -> crate::Result<Arc<dyn NotificationStore>> {
        match self {
            Self::File(store) => {
                store.init().await?;
                Ok(Arc::new(store))
            }
            Self::Memory(config) => Ok(config.capacity.map_or_else(
                || Arc::new(MemoryNotificationStore::new()) as Arc<dyn NotificationStore>,
                |capacity| Arc::new(MemoryNotificationStore::with_capacity(capacity)),
            )),
        }
    }
}
