//! Events emitted on job lifecycle changes.

use super::ids::JobId;

/// Something that happened to a job.
///
/// Delivered to the `EventSink` the queue was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    Pushed {
        id: JobId,
        job_type: String,
        delay_secs: u64,
    },
    Reserved {
        id: JobId,
        attempt: u32,
    },
    Progressed {
        id: JobId,
        progress: u8,
        label: Option<String>,
    },
    Completed {
        id: JobId,
        attempt: u32,
    },
    Failed {
        id: JobId,
        attempt: u32,
        error: String,
    },
    Reclaimed {
        id: JobId,
        attempt: u32,
    },
    Retried {
        id: JobId,
    },
    Released {
        id: JobId,
    },
}

impl QueueEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            QueueEvent::Pushed { id, .. }
            | QueueEvent::Reserved { id, .. }
            | QueueEvent::Progressed { id, .. }
            | QueueEvent::Completed { id, .. }
            | QueueEvent::Failed { id, .. }
            | QueueEvent::Reclaimed { id, .. }
            | QueueEvent::Retried { id }
            | QueueEvent::Released { id } => *id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QueueEvent::Pushed { .. } => "pushed",
            QueueEvent::Reserved { .. } => "reserved",
            QueueEvent::Progressed { .. } => "progressed",
            QueueEvent::Completed { .. } => "completed",
            QueueEvent::Failed { .. } => "failed",
            QueueEvent::Reclaimed { .. } => "reclaimed",
            QueueEvent::Retried { .. } => "retried",
            QueueEvent::Released { .. } => "released",
        }
    }
}
