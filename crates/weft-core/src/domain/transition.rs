//! State transitions a job record can undergo.

use chrono::{DateTime, Utc};

use super::status::JobStatus;

/// A requested state change.
///
/// Each variant has exactly one legal source status; `JobRecord::apply`
/// rejects it from anywhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// waiting -> reserved (a worker takes a lease).
    Reserve { now: DateTime<Utc> },

    /// reserved -> done.
    Complete,

    /// reserved -> failed.
    Fail { error: String },

    /// reserved -> waiting (lease expired, job is due again immediately).
    Reclaim { now: DateTime<Utc> },

    /// failed -> waiting (manual retry).
    Retry { now: DateTime<Utc> },
}

impl Transition {
    pub fn from_status(&self) -> JobStatus {
        match self {
            Transition::Reserve { .. } => JobStatus::Waiting,
            Transition::Complete | Transition::Fail { .. } | Transition::Reclaim { .. } => {
                JobStatus::Reserved
            }
            Transition::Retry { .. } => JobStatus::Failed,
        }
    }

    pub fn to_status(&self) -> JobStatus {
        match self {
            Transition::Reserve { .. } => JobStatus::Reserved,
            Transition::Complete => JobStatus::Done,
            Transition::Fail { .. } => JobStatus::Failed,
            Transition::Reclaim { .. } | Transition::Retry { .. } => JobStatus::Waiting,
        }
    }

    /// Verb used in error messages and logs.
    pub fn action(&self) -> &'static str {
        match self {
            Transition::Reserve { .. } => "reserve",
            Transition::Complete => "complete",
            Transition::Fail { .. } => "fail",
            Transition::Reclaim { .. } => "reclaim",
            Transition::Retry { .. } => "retry",
        }
    }
}
