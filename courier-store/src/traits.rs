use async_trait::async_trait;
use courier_common::{Notification, NotificationId, NotificationStatus};

use crate::{
    StoreError,
    page::{Page, PageRequest},
};

/// Storage for notifications and the attempts they own.
///
/// A notification and its attempt list are always written together, so a
/// persisted attempt can never be observed without the status change it
/// caused. Every write carries the version the caller loaded; a stale version
/// is rejected with [`StoreError::Conflict`].
#[async_trait]
pub trait NotificationStore: Send + Sync + std::fmt::Debug {
    /// Persist a new notification and return its id.
    ///
    /// The caller's copy has its version advanced to match the stored one.
    ///
    /// # Errors
    /// [`StoreError::AlreadyExists`] if the id is taken, or any backend failure.
    async fn create(&self, notification: &mut Notification) -> crate::Result<NotificationId>;

    /// Load a notification with its attempts, `None` if unknown.
    ///
    /// # Errors
    /// Backend failures only; an unknown id is not an error.
    async fn get(&self, id: &NotificationId) -> crate::Result<Option<Notification>>;

    /// Replace the stored notification and its attempts in one step.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] for an unknown id, [`StoreError::Conflict`] if the
    /// stored version moved on since `notification` was loaded, and
    /// [`StoreError::Validation`] if the attempt list would rewrite history.
    async fn save(&self, notification: &mut Notification) -> crate::Result<()>;

    /// A page of notifications in `status`, newest first.
    ///
    /// # Errors
    /// Backend failures.
    async fn query(
        &self,
        status: NotificationStatus,
        page: PageRequest,
    ) -> crate::Result<Page<Notification>>;

    /// A page of all notifications, newest first.
    ///
    /// # Errors
    /// Backend failures.
    async fn query_all(&self, page: PageRequest) -> crate::Result<Page<Notification>>;

    /// Remove a notification together with its attempts.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] for an unknown id.
    async fn delete(&self, id: &NotificationId) -> crate::Result<()>;
}

/// Rules every backend applies before accepting a save.
///
/// Attempts are keyed by `(notification id, sequence)`: the incoming list has
/// to be numbered `1..=n` and keep every previously stored attempt unchanged.
pub(crate) fn check_save(stored: &Notification, incoming: &Notification) -> crate::Result<()> {
    if stored.version() != incoming.version() {
        return Err(StoreError::Conflict {
            id: incoming.id(),
            expected: incoming.version(),
            actual: stored.version(),
        });
    }

    check_sequences(incoming)?;

    let kept = stored.attempts().len();
    if incoming.attempts().len() < kept || incoming.attempts()[..kept] != *stored.attempts() {
        return Err(StoreError::Validation(format!(
            "Attempts of {} cannot be removed or rewritten",
            incoming.id()
        )));
    }

    Ok(())
}

pub(crate) fn check_sequences(notification: &Notification) -> crate::Result<()> {
    let contiguous = notification
        .attempts()
        .iter()
        .zip(1u32..)
        .all(|(attempt, expected)| attempt.sequence == expected);

    if contiguous {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "Attempt sequence numbers of {} are not contiguous from 1",
            notification.id()
        )))
    }
}
