use chrono::{DateTime, Utc};
use fd_lock::{RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::store::WorkflowTable;
use super::subplugins::SubpluginTables;
use crate::lifecycle::{LifecycleError, Result};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything the in-memory backends hold, as written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub workflows: WorkflowTable,
    #[serde(default)]
    pub subplugins: SubpluginTables,
}

impl LifecycleSnapshot {
    pub fn new(workflows: WorkflowTable, subplugins: SubpluginTables) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            workflows,
            subplugins,
        }
    }
}

impl Default for LifecycleSnapshot {
    fn default() -> Self {
        Self::new(WorkflowTable::default(), SubpluginTables::default())
    }
}

/// JSON state file guarded by an exclusive lock on `<path>.lock`.
///
/// Only one process may hold a state file open at a time. Dropping the
/// `StateFile` releases the lock, but the lock file handle stays open until the
/// process exits, so open it once per process.
pub struct StateFile {
    path: PathBuf,
    _lock_guard: RwLockWriteGuard<'static, File>,
}

impl StateFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let lock_path = lock_path_for(&path);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        let lock = Box::leak(Box::new(RwLock::new(lock_file)));
        let guard = lock.try_write().map_err(|_| LifecycleError::StateLocked {
            path: path.display().to_string(),
        })?;

        debug!(path = %path.display(), "State file locked");
        Ok(Self {
            path,
            _lock_guard: guard,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot, or an empty one if the file does not exist yet
    pub async fn load(&self) -> Result<LifecycleSnapshot> {
        if !tokio::fs::try_exists(&self.path).await? {
            debug!(path = %self.path.display(), "No state file yet, starting empty");
            return Ok(LifecycleSnapshot::default());
        }
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let snapshot: LifecycleSnapshot = serde_json::from_str(&raw)?;
        debug!(
            path = %self.path.display(),
            workflows = snapshot.workflows.len(),
            "State loaded"
        );
        Ok(snapshot)
    }

    /// Write the snapshot through a temporary file so readers never see half a file
    pub async fn save(&self, snapshot: &LifecycleSnapshot) -> Result<()> {
        let content = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        info!(path = %self.path.display(), "State saved");
        Ok(())
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}
