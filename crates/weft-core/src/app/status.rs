//! Introspection views returned by the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{JobEnvelope, JobId, JobRecord, JobStatus};

/// Number of jobs per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub waiting: usize,
    pub reserved: usize,
    pub done: usize,
    pub failed: usize,
}

impl QueueCounts {
    /// Jobs still "in the queue": everything except done.
    pub fn total(&self) -> usize {
        self.waiting + self.reserved + self.failed
    }
}

/// One row of a job listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: JobId,

    /// Seconds until the job is due (0 unless waiting on a delay).
    pub delay: u64,

    /// 1 = waiting, 2 = reserved, 3 = done, 4 = failed.
    pub status: u8,

    pub progress: u8,
    pub progress_label: Option<String>,
    pub description: String,
    pub error: Option<String>,
}

impl JobInfo {
    pub fn from_record(record: &JobRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id,
            delay: record.delay_remaining(now),
            status: record.status.code(),
            progress: record.progress,
            progress_label: record.progress_label.clone(),
            description: record.description.clone(),
            error: record.error.clone(),
        }
    }
}

/// Everything known about one job, payload decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetails {
    pub id: JobId,
    pub status: JobStatus,
    pub status_code: u8,
    pub description: String,
    pub priority: i32,
    pub ttr: u32,
    pub attempt: u32,
    pub delay: u64,
    pub progress: u8,
    pub progress_label: Option<String>,
    pub error: Option<String>,
    pub pushed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub reserved_deadline: Option<DateTime<Utc>>,

    /// Decoded payload, if it could be decoded.
    pub job: Option<JobEnvelope>,

    /// Why the payload could not be decoded.
    pub payload_error: Option<String>,
}

impl JobDetails {
    pub fn from_record(record: &JobRecord, now: DateTime<Utc>) -> Self {
        let (job, payload_error) = match JobEnvelope::decode(&record.payload) {
            Ok(envelope) => (Some(envelope), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            id: record.id,
            status: record.status,
            status_code: record.status.code(),
            description: record.description.clone(),
            priority: record.priority,
            ttr: record.ttr,
            attempt: record.attempt,
            delay: record.delay_remaining(now),
            progress: record.progress,
            progress_label: record.progress_label.clone(),
            error: record.error.clone(),
            pushed_at: record.pushed_at,
            due_at: record.due_at,
            reserved_at: record.reserved_at,
            reserved_deadline: record.reserved_deadline,
            job,
            payload_error,
        }
    }
}

/// How one execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    Failed(String),

    /// The lease was reclaimed before the result could be recorded.
    LeaseLost,
}

/// What a foreground `run()` did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub lease_lost: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &ExecutionOutcome) {
        match outcome {
            ExecutionOutcome::Completed => self.completed += 1,
            ExecutionOutcome::Failed(_) => self.failed += 1,
            ExecutionOutcome::LeaseLost => self.lease_lost += 1,
        }
    }

    pub fn executed(&self) -> usize {
        self.completed + self.failed + self.lease_lost
    }
}
