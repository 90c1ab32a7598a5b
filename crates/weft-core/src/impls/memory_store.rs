//! In-memory job store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::state::StoreState;
use crate::domain::{JobId, JobRecord, JobStatus, QueueError, Transition};
use crate::ports::{JobStore, StatusGuard};

/// Job store kept entirely in process memory.
///
/// Every operation runs under one async mutex, which is what makes
/// `update_status` an atomic compare-and-swap. Nothing survives a restart;
/// use `JsonFileStore` for that.
#[derive(Default)]
pub struct InMemoryJobStore {
    state: Mutex<StoreState>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, record: JobRecord) -> Result<(), QueueError> {
        self.state.lock().await.insert(record)
    }

    async fn update_status(
        &self,
        id: JobId,
        guard: StatusGuard,
        transition: Transition,
    ) -> Result<Option<JobRecord>, QueueError> {
        self.state
            .lock()
            .await
            .update_status(id, guard, &transition)
    }

    async fn update_progress(
        &self,
        id: JobId,
        attempt: u32,
        progress: u8,
        label: Option<String>,
    ) -> Result<bool, QueueError> {
        self.state
            .lock()
            .await
            .update_progress(id, attempt, progress, label)
    }

    async fn find_next_eligible(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<JobRecord>, QueueError> {
        Ok(self.state.lock().await.find_next_eligible(now))
    }

    async fn find_expired_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobRecord>, QueueError> {
        Ok(self.state.lock().await.find_expired_reservations(now))
    }

    async fn count(&self, status: JobStatus) -> Result<usize, QueueError> {
        Ok(self.state.lock().await.count(status))
    }

    async fn list_jobs(
        &self,
        limit: Option<usize>,
        status: Option<JobStatus>,
    ) -> Result<Vec<JobRecord>, QueueError> {
        Ok(self.state.lock().await.list(limit, status))
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, QueueError> {
        Ok(self.state.lock().await.get(id))
    }

    async fn delete(&self, id: JobId) -> Result<bool, QueueError> {
        Ok(self.state.lock().await.delete(id))
    }
}
