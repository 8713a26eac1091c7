use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use courier_common::{Notification, NotificationId, NotificationStatus, internal};
use tokio::{fs, sync::Mutex};

use crate::{
    StoreError,
    page::{Page, PageRequest, paginate},
    traits::{NotificationStore, check_save, check_sequences},
};

const TEMP_PREFIX: &str = ".tmp_";

/// File-backed notification store
///
/// One JSON document per notification, named `<ULID>.json`, holding the
/// notification and its attempts. Writes go to a `.tmp_` file first and are
/// renamed into place, so a reader never sees a half-written record and the
/// root and its attempts always land together.
///
/// Writers are serialised through a mutex so the version check and the rename
/// happen as one step within this process. Sharing a directory between
/// processes is not supported.
#[derive(Debug, Clone)]
pub struct FileNotificationStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl Default for FileNotificationStore {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/courier"),
            write_lock: Arc::default(),
        }
    }
}

impl<'de> serde::Deserialize<'de> for FileNotificationStore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct Helper {
            path: PathBuf,
        }

        let helper = Helper::deserialize(deserializer)?;
        Self::new(helper.path).map_err(serde::de::Error::custom)
    }
}

impl FileNotificationStore {
    /// A store rooted at `path`, which has to be absolute, free of `..` and
    /// outside system directories.
    ///
    /// # Errors
    /// [`StoreError::Validation`] when the path breaks one of those rules.
    pub fn new(path: impl Into<PathBuf>) -> crate::Result<Self> {
        let path = path.into();
        Self::validate_path(&path)?;
        Ok(Self {
            path,
            write_lock: Arc::default(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn validate_path(path: &Path) -> crate::Result<()> {
        if path
            .components()
            .any(|component| component == std::path::Component::ParentDir)
        {
            return Err(StoreError::Validation(format!(
                "Store path cannot contain '..' components: {}",
                path.display()
            )));
        }

        if !path.is_absolute() {
            return Err(StoreError::Validation(format!(
                "Store path must be absolute: {}",
                path.display()
            )));
        }

        let sensitive_prefixes = [
            "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc", "/dev",
        ];

        if let Some(prefix) = sensitive_prefixes
            .iter()
            .find(|prefix| path.starts_with(prefix))
        {
            return Err(StoreError::Validation(format!(
                "Store path cannot be in system directory {prefix}: {}",
                path.display()
            )));
        }

        Ok(())
    }

    /// Create the directory if needed and clear out temporary files left by
    /// writes that were interrupted.
    ///
    /// # Errors
    /// If the directory cannot be created or read, or the path is not a
    /// directory.
    pub async fn init(&self) -> crate::Result<()> {
        fs::create_dir_all(&self.path).await?;

        if !fs::metadata(&self.path).await?.is_dir() {
            return Err(StoreError::Validation(format!(
                "Store path is not a directory: {}",
                self.path.display()
            )));
        }

        let mut entries = fs::read_dir(&self.path).await?;
        let mut cleaned = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                fs::remove_file(entry.path()).await?;
                cleaned += 1;
            }
        }

        internal!(
            level = INFO,
            "File store ready at {} ({cleaned} stale temporary files removed)",
            self.path.display()
        );

        Ok(())
    }

    fn record_path(&self, id: &NotificationId) -> PathBuf {
        self.path.join(id.filename())
    }

    async fn read_record(&self, id: &NotificationId) -> crate::Result<Option<Notification>> {
        match fs::read(self.record_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, notification: &Notification) -> crate::Result<()> {
        let filename = notification.id().filename();
        let temp_path = self.path.join(format!("{TEMP_PREFIX}{filename}"));

        fs::write(&temp_path, serde_json::to_vec(notification)?).await?;
        fs::rename(&temp_path, self.path.join(&filename)).await?;

        Ok(())
    }

    async fn load_all(&self) -> crate::Result<Vec<Notification>> {
        let mut entries = fs::read_dir(&self.path).await?;
        let mut notifications = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let Some(id) = NotificationId::from_filename(&entry.file_name().to_string_lossy())
            else {
                continue;
            };

            // Deleted between listing and reading.
            if let Some(notification) = self.read_record(&id).await? {
                notifications.push(notification);
            }
        }

        Ok(notifications)
    }
}

#[async_trait]
impl NotificationStore for FileNotificationStore {
    async fn create(&self, notification: &mut Notification) -> crate::Result<NotificationId> {
        check_sequences(notification)?;

        let _guard = self.write_lock.lock().await;
        let id = notification.id();

        if fs::try_exists(self.record_path(&id)).await? {
            return Err(StoreError::AlreadyExists(id));
        }

        let mut stored = notification.clone();
        stored.advance_version();
        self.write_record(&stored).await?;
        notification.advance_version();

        internal!(level = DEBUG, "Stored notification {id}");

        Ok(id)
    }

    async fn get(&self, id: &NotificationId) -> crate::Result<Option<Notification>> {
        self.read_record(id).await
    }

    async fn save(&self, notification: &mut Notification) -> crate::Result<()> {
        let _guard = self.write_lock.lock().await;
        let id = notification.id();
        let stored = self
            .read_record(&id)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        check_save(&stored, notification)?;

        let mut next = notification.clone();
        next.advance_version();
        self.write_record(&next).await?;
        notification.advance_version();

        Ok(())
    }

    async fn query(
        &self,
        status: NotificationStatus,
        page: PageRequest,
    ) -> crate::Result<Page<Notification>> {
        let mut all = self.load_all().await?;
        all.retain(|notification| notification.status() == status);
        Ok(paginate(all, page))
    }

    async fn query_all(&self, page: PageRequest) -> crate::Result<Page<Notification>> {
        Ok(paginate(self.load_all().await?, page))
    }

    async fn delete(&self, id: &NotificationId) -> crate::Result<()> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(*id)),
            Err(e) => Err(e.into()),
        }
    }
}
