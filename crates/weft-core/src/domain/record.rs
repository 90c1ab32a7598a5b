//! Job record: the persisted unit of work.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::errors::QueueError;
use super::ids::JobId;
use super::status::JobStatus;
use super::transition::Transition;

pub const DEFAULT_PRIORITY: i32 = 1024;
pub const DEFAULT_TTR_SECS: u32 = 300;

pub const PROGRESS_MAX: u8 = 100;

/// A job as the store keeps it.
///
/// Design:
/// - This is the single source of truth for job state.
/// - All state changes go through `apply`; stores call it under their own
///   lock after checking the caller's guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,

    /// Encoded `JobEnvelope`.
    pub payload: Vec<u8>,

    pub description: String,

    /// Lower value is served first.
    pub priority: i32,

    /// Not reservable before this instant.
    pub due_at: DateTime<Utc>,

    /// Lease length in seconds.
    pub ttr: u32,

    /// Number of reservations so far (including the current one if reserved).
    pub attempt: u32,

    pub status: JobStatus,

    pub progress: u8,
    pub progress_label: Option<String>,

    /// Set only while failed.
    pub error: Option<String>,

    pub reserved_at: Option<DateTime<Utc>>,
    pub reserved_deadline: Option<DateTime<Utc>>,

    pub pushed_at: DateTime<Utc>,
}

impl JobRecord {
    /// A fresh waiting record, due immediately, with default priority and ttr.
    pub fn new(
        id: JobId,
        payload: Vec<u8>,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            payload,
            description: description.into(),
            priority: DEFAULT_PRIORITY,
            due_at: now,
            ttr: DEFAULT_TTR_SECS,
            attempt: 0,
            status: JobStatus::Waiting,
            progress: 0,
            progress_label: None,
            error: None,
            reserved_at: None,
            reserved_deadline: None,
            pushed_at: now,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_ttr(mut self, ttr: u32) -> Self {
        self.ttr = ttr;
        self
    }

    pub fn with_due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = due_at;
        self
    }

    pub fn ttr_duration(&self) -> Duration {
        Duration::seconds(i64::from(self.ttr))
    }

    /// Key the dispatcher orders waiting jobs by.
    pub fn eligibility_key(&self) -> (DateTime<Utc>, i32, JobId) {
        (self.due_at, self.priority, self.id)
    }

    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Waiting && self.due_at <= now
    }

    pub fn is_lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Reserved
            && self.reserved_deadline.is_some_and(|deadline| deadline < now)
    }

    /// Whole seconds (rounded up) until a waiting job becomes due; 0 otherwise.
    pub fn delay_remaining(&self, now: DateTime<Utc>) -> u64 {
        if self.status != JobStatus::Waiting || self.due_at <= now {
            return 0;
        }
        let millis = (self.due_at - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }

    /// Apply a transition, or fail with `InvalidState` if it is not legal
    /// from the current status.
    pub fn apply(&mut self, transition: &Transition) -> Result<(), QueueError> {
        if self.status != transition.from_status() {
            return Err(QueueError::InvalidState {
                id: self.id,
                status: self.status,
                action: transition.action(),
            });
        }

        match transition {
            Transition::Reserve { now } => {
                self.attempt += 1;
                self.reserved_at = Some(*now);
                self.reserved_deadline = Some(*now + self.ttr_duration());
                self.reset_progress();
            }
            Transition::Complete => {
                self.progress = PROGRESS_MAX;
                self.clear_reservation();
            }
            Transition::Fail { error } => {
                self.error = Some(error.clone());
                self.clear_reservation();
            }
            Transition::Reclaim { now } => {
                self.due_at = *now;
                self.clear_reservation();
                self.reset_progress();
            }
            Transition::Retry { now } => {
                self.due_at = *now;
                self.error = None;
                self.reset_progress();
            }
        }
        self.status = transition.to_status();
        Ok(())
    }

    /// Record progress; the caller has already checked the lease.
    pub fn set_progress(&mut self, progress: u8, label: Option<String>) {
        self.progress = progress.min(PROGRESS_MAX);
        self.progress_label = label;
    }

    /// Check the structural invariants of a record.
    pub fn check_invariants(&self) -> Result<(), String> {
        match (self.status, self.reserved_at, self.reserved_deadline) {
            (JobStatus::Reserved, Some(at), Some(deadline)) => {
                if deadline != at + self.ttr_duration() {
                    return Err(format!(
                        "{}: reserved_deadline {deadline} != reserved_at {at} + ttr {}",
                        self.id, self.ttr
                    ));
                }
            }
            (JobStatus::Reserved, _, _) => {
                return Err(format!("{}: reserved without reservation timestamps", self.id));
            }
            (_, None, None) => {}
            (status, _, _) => {
                return Err(format!("{}: {status} job has reservation timestamps", self.id));
            }
        }

        match (self.status, &self.error) {
            (JobStatus::Failed, None) => Err(format!("{}: failed without error", self.id)),
            (JobStatus::Failed, Some(_)) | (_, None) => Ok(()),
            (status, Some(_)) => Err(format!("{}: {status} job carries an error", self.id)),
        }?;

        if self.progress > PROGRESS_MAX {
            return Err(format!("{}: progress {} out of range", self.id, self.progress));
        }
        Ok(())
    }

    fn clear_reservation(&mut self) {
        self.reserved_at = None;
        self.reserved_deadline = None;
    }

    fn reset_progress(&mut self) {
        self.progress = 0;
        self.progress_label = None;
    }
}
