//! File-backed job store.
//!
//! The store is a single JSON snapshot. Every operation takes an exclusive
//! lock on a sibling `.lock` file, re-reads the snapshot, and (for changes)
//! writes the new snapshot before releasing the lock, so any number of
//! processes can share one file.
//!
//! Writes go to a sibling temp file that is synced and then renamed over the
//! snapshot, and the directory is synced after the rename, so a crash leaves
//! either the old or the new state on disk.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::state::StoreState;
use crate::domain::{JobId, JobRecord, JobStatus, QueueError, Transition};
use crate::ports::{JobStore, StatusGuard};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    jobs: Vec<&'a JobRecord>,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    jobs: Vec<JobRecord>,
}

/// Durable job store backed by a single JSON file.
///
/// Handles in different processes (or several handles in one process) may
/// open the same path; the lock file serializes them.
pub struct JsonFileStore {
    path: PathBuf,
    tmp_path: PathBuf,
    lock_path: PathBuf,

    /// Orders this handle's own callers before they queue on the file lock.
    local: Mutex<()>,
}

/// Held while a store operation runs; the OS lock is released on drop.
struct FileLock(#[allow(dead_code)] File);

impl JsonFileStore {
    /// Open the store at `path`, creating an empty one if the file is missing.
    ///
    /// An existing snapshot is validated up front so a corrupt file is
    /// reported here rather than on first use.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let store = Self {
            tmp_path: sibling(&path, ".tmp"),
            lock_path: sibling(&path, ".lock"),
            path,
            local: Mutex::new(()),
        };

        let jobs = store.with_state(|state| Ok((state.records().count(), false))).await?;
        info!(path = %store.path.display(), jobs, "opened job store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn lock(&self) -> Result<FileLock, QueueError> {
        let lock_path = self.lock_path.clone();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| QueueError::storage(format!("lock task failed: {e}")))??;
        Ok(FileLock(file))
    }

    async fn load(&self) -> Result<StoreState, QueueError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreState::default());
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            QueueError::storage(format!("corrupt store file {}: {e}", self.path.display()))
        })?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(QueueError::storage(format!(
                "store file {} has unsupported version {}",
                self.path.display(),
                snapshot.version
            )));
        }
        StoreState::from_records(snapshot.jobs)
    }

    async fn persist(&self, state: &StoreState) -> Result<(), QueueError> {
        let mut jobs: Vec<&JobRecord> = state.records().collect();
        jobs.sort_by_key(|r| r.id);
        let bytes = serde_json::to_vec_pretty(&SnapshotRef {
            version: SNAPSHOT_VERSION,
            jobs,
        })?;

        let mut tmp = tokio::fs::File::create(&self.tmp_path).await?;
        tmp.write_all(&bytes).await?;
        tmp.sync_all().await?;
        drop(tmp);

        tokio::fs::rename(&self.tmp_path, &self.path).await?;
        sync_parent_dir(&self.path).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "persisted job store");
        Ok(())
    }

    /// Run `f` against the current on-disk state under the file lock; if it
    /// reports a change, write the new state before the lock is released.
    async fn with_state<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<(T, bool), QueueError>,
    ) -> Result<T, QueueError> {
        let _local = self.local.lock().await;
        let _lock = self.lock().await?;

        let mut state = self.load().await?;
        let (out, changed) = f(&mut state)?;
        if changed {
            self.persist(&state).await?;
        }
        Ok(out)
    }

    async fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> Result<T, QueueError> {
        self.with_state(|state| Ok((f(state), false))).await
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(unix)]
async fn sync_parent_dir(path: &Path) -> Result<(), QueueError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

// No directory handle to sync off unix.
#[cfg(not(unix))]
async fn sync_parent_dir(_path: &Path) -> Result<(), QueueError> {
    Ok(())
}

#[async_trait]
impl JobStore for JsonFileStore {
    async fn insert(&self, record: JobRecord) -> Result<(), QueueError> {
        self.with_state(|state| state.insert(record).map(|()| ((), true)))
            .await
    }

    async fn update_status(
        &self,
        id: JobId,
        guard: StatusGuard,
        transition: Transition,
    ) -> Result<Option<JobRecord>, QueueError> {
        self.with_state(|state| {
            let updated = state.update_status(id, guard, &transition)?;
            let changed = updated.is_some();
            Ok((updated, changed))
        })
        .await
    }

    async fn update_progress(
        &self,
        id: JobId,
        attempt: u32,
        progress: u8,
        label: Option<String>,
    ) -> Result<bool, QueueError> {
        self.with_state(|state| {
            let applied = state.update_progress(id, attempt, progress, label)?;
            Ok((applied, applied))
        })
        .await
    }

    async fn find_next_eligible(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<JobRecord>, QueueError> {
        self.read(|state| state.find_next_eligible(now)).await
    }

    async fn find_expired_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobRecord>, QueueError> {
        self.read(|state| state.find_expired_reservations(now)).await
    }

    async fn count(&self, status: JobStatus) -> Result<usize, QueueError> {
        self.read(|state| state.count(status)).await
    }

    async fn list_jobs(
        &self,
        limit: Option<usize>,
        status: Option<JobStatus>,
    ) -> Result<Vec<JobRecord>, QueueError> {
        self.read(|state| state.list(limit, status)).await
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, QueueError> {
        self.read(|state| state.get(id)).await
    }

    async fn delete(&self, id: JobId) -> Result<bool, QueueError> {
        self.with_state(|state| {
            let existed = state.delete(id);
            Ok((existed, existed))
        })
        .await
    }
}
