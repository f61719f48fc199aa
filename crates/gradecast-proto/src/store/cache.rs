//! Role-namespaced persistence for the notification store.

use super::notification::ClientNotification;
use crate::identity::Role;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Cache I/O failures.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache contents are not valid: {0}")]
    Format(#[from] serde_json::Error),
}

/// Where a [`NotificationStore`](super::NotificationStore) keeps its entries
/// between sessions. Every call is scoped to one role.
pub trait NotificationCache {
    /// Entries previously saved for `role`, newest first. Empty when nothing was saved.
    fn load(&self, role: Role) -> Result<Vec<ClientNotification>, CacheError>;

    /// Replace the saved entries for `role`.
    fn save(&mut self, role: Role, entries: &[ClientNotification]) -> Result<(), CacheError>;

    /// Forget everything saved for `role`.
    fn evict(&mut self, role: Role) -> Result<(), CacheError>;
}

/// Process-local cache.
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    slots: HashMap<Role, Vec<ClientNotification>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationCache for MemoryCache {
    fn load(&self, role: Role) -> Result<Vec<ClientNotification>, CacheError> {
        Ok(self.slots.get(&role).cloned().unwrap_or_default())
    }

    fn save(&mut self, role: Role, entries: &[ClientNotification]) -> Result<(), CacheError> {
        self.slots.insert(role, entries.to_vec());
        Ok(())
    }

    fn evict(&mut self, role: Role) -> Result<(), CacheError> {
        self.slots.remove(&role);
        Ok(())
    }
}

/// One JSON file per role (`notifications-admin.json`,
/// `notifications-faculty.json`) inside a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, role: Role) -> PathBuf {
        self.dir.join(format!("notifications-{role}.json"))
    }
}

impl NotificationCache for FileCache {
    fn load(&self, role: Role) -> Result<Vec<ClientNotification>, CacheError> {
        match std::fs::read(self.path_for(role)) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, role: Role, entries: &[ClientNotification]) -> Result<(), CacheError> {
        let path = self.path_for(role);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(entries)?)?;
        std::fs::rename(tmp, path)?;
        Ok(())
    }

    fn evict(&mut self, role: Role) -> Result<(), CacheError> {
        match std::fs::remove_file(self.path_for(role)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
