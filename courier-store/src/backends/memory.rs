use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use courier_common::{Notification, NotificationId, NotificationStatus};

use crate::{
    StoreError,
    page::{Page, PageRequest, paginate},
    traits::{NotificationStore, check_save, check_sequences},
};

/// In-memory notification store
///
/// Records live in a `HashMap` behind an `RwLock`; the write lock is held
/// across the version check and the replace, which is what makes `save`
/// atomic. Nothing survives a restart.
///
/// An optional capacity bounds the number of records, after which `create`
/// fails.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotificationStore {
    pub(crate) records: Arc<RwLock<HashMap<NotificationId, Notification>>>,
    capacity: Option<usize>,
}

impl MemoryNotificationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Arc::default(),
            capacity: Some(capacity),
        }
    }

    /// Recovers from a poisoned lock by reading the data underneath.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn select(&self, filter: impl Fn(&Notification) -> bool) -> crate::Result<Vec<Notification>> {
        Ok(self
            .records
            .read()?
            .values()
            .filter(|notification| filter(notification))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, notification: &mut Notification) -> crate::Result<NotificationId> {
        check_sequences(notification)?;

        let mut records = self.records.write()?;
        let id = notification.id();

        if records.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }

        if let Some(cap) = self.capacity
            && records.len() >= cap
        {
            return Err(StoreError::Internal(format!(
                "Memory store capacity exceeded: {}/{cap} notifications",
                records.len()
            )));
        }

        notification.advance_version();
        records.insert(id, notification.clone());

        Ok(id)
    }

    async fn get(&self, id: &NotificationId) -> crate::Result<Option<Notification>> {
        Ok(self.records.read()?.get(id).cloned())
    }

    async fn save(&self, notification: &mut Notification) -> crate::Result<()> {
        let mut records = self.records.write()?;
        let id = notification.id();
        let stored = records.get(&id).ok_or(StoreError::NotFound(id))?;

        check_save(stored, notification)?;

        notification.advance_version();
        records.insert(id, notification.clone());

        Ok(())
    }

    async fn query(
        &self,
        status: NotificationStatus,
        page: PageRequest,
    ) -> crate::Result<Page<Notification>> {
        Ok(paginate(
            self.select(|notification| notification.status() == status)?,
            page,
        ))
    }

    async fn query_all(&self, page: PageRequest) -> crate::Result<Page<Notification>> {
        Ok(paginate(self.select(|_| true)?, page))
    }

    async fn delete(&self, id: &NotificationId) -> crate::Result<()> {
        self.records
            .write()?
            .remove(id)
            .map(drop)
            .ok_or(StoreError::NotFound(*id))
    }
}
