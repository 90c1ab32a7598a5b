//! JobStore port: durable storage of job records.
//!
//! # Design principles
//! - The store is the only shared mutable resource between workers.
//! - `update_status` is a compare-and-swap: two workers racing for the same
//!   job can never both win, and a worker whose lease was reclaimed can never
//!   overwrite the job's newer state.
//! - Callers never write back a cached record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{JobId, JobRecord, JobStatus, QueueError, Transition};

/// Condition an `update_status` call must satisfy to take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusGuard {
    /// Status the record must currently have.
    pub from: JobStatus,

    /// Attempt number the record must currently have, if any.
    pub attempt: Option<u32>,
}

impl StatusGuard {
    pub fn status(from: JobStatus) -> Self {
        Self {
            from,
            attempt: None,
        }
    }

    /// Guard for writes made on behalf of a specific reservation.
    pub fn reservation(attempt: u32) -> Self {
        Self {
            from: JobStatus::Reserved,
            attempt: Some(attempt),
        }
    }

    pub fn matches(&self, record: &JobRecord) -> bool {
        record.status == self.from && self.attempt.is_none_or(|a| a == record.attempt)
    }
}

/// Storage backend for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new record. Fails if the id already exists.
    async fn insert(&self, record: JobRecord) -> Result<(), QueueError>;

    /// Atomically apply `transition` if `guard` matches the stored record.
    ///
    /// Returns the updated record, or `None` if the guard did not match.
    /// Fails with `NotFound` if the id is unknown.
    async fn update_status(
        &self,
        id: JobId,
        guard: StatusGuard,
        transition: Transition,
    ) -> Result<Option<JobRecord>, QueueError>;

    /// Atomically record progress if the job is still reserved under `attempt`.
    ///
    /// Returns `false` if the reservation no longer holds.
    async fn update_progress(
        &self,
        id: JobId,
        attempt: u32,
        progress: u8,
        label: Option<String>,
    ) -> Result<bool, QueueError>;

    /// The waiting job with `due_at <= now` that sorts first by
    /// `(due_at, priority, id)`.
    async fn find_next_eligible(&self, now: DateTime<Utc>)
    -> Result<Option<JobRecord>, QueueError>;

    /// Reserved jobs whose deadline is before `now`.
    async fn find_expired_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobRecord>, QueueError>;

    async fn count(&self, status: JobStatus) -> Result<usize, QueueError>;

    /// Records ordered by `(priority, id)`, optionally filtered by status.
    async fn list_jobs(
        &self,
        limit: Option<usize>,
        status: Option<JobStatus>,
    ) -> Result<Vec<JobRecord>, QueueError>;

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, QueueError>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, id: JobId) -> Result<bool, QueueError>;
}
