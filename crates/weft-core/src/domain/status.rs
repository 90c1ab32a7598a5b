//! Job status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a job.
///
/// State transitions:
/// - Waiting -> Reserved -> Done
/// - Waiting -> Reserved -> Failed (job error, or attempts exhausted on reclaim)
/// - Reserved -> Waiting (lease expired, attempts remain)
/// - Failed -> Waiting (manual retry)
///
/// The numeric codes (`1..=4`) are what introspection consumers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Stored and waiting for its due time / a free worker.
    Waiting,

    /// Leased by a worker.
    Reserved,

    /// Finished successfully.
    Done,

    /// Finished with an error.
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Waiting,
        JobStatus::Reserved,
        JobStatus::Done,
        JobStatus::Failed,
    ];

    pub fn code(self) -> u8 {
        match self {
            JobStatus::Waiting => 1,
            JobStatus::Reserved => 2,
            JobStatus::Done => 3,
            JobStatus::Failed => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(JobStatus::Waiting),
            2 => Some(JobStatus::Reserved),
            3 => Some(JobStatus::Done),
            4 => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Reserved => "reserved",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// Is this a terminal state (no automatic transitions out of it)?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Does a job in this state count as "in the queue"?
    pub fn is_queued(self) -> bool {
        !matches!(self, JobStatus::Done)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
