//! Error types.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use super::ids::JobId;
use super::status::JobStatus;

/// Errors returned by the queue API and the storage port.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("cannot {action} job {id} while it is {status}")]
    InvalidState {
        id: JobId,
        status: JobStatus,
        action: &'static str,
    },

    /// The caller's reservation was reclaimed (and possibly handed to another worker).
    #[error("lease lost for job {id} (attempt {attempt})")]
    LeaseLost { id: JobId, attempt: u32 },

    #[error("no handler registered for job type '{0}'")]
    UnknownJobType(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("payload codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl QueueError {
    pub fn storage(message: impl Into<String>) -> Self {
        QueueError::Storage(message.into())
    }

    /// Errors a worker should shrug off rather than abort on.
    pub fn is_lease_lost(&self) -> bool {
        matches!(self, QueueError::LeaseLost { .. })
    }
}

/// Error returned from a job handler.
///
/// Recorded on the job as `message: cause: cause...`.
#[derive(Debug)]
pub struct JobError {
    message: String,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The message followed by every source in the chain.
    pub fn describe_chain(&self) -> String {
        let mut out = self.message.clone();
        let mut next: Option<&(dyn StdError + 'static)> = self.source();
        while let Some(err) = next {
            out.push_str(": ");
            out.push_str(&err.to_string());
            next = err.source();
        }
        out
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for JobError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for JobError {
    fn from(err: serde_json::Error) -> Self {
        JobError::with_source("json error", err)
    }
}

impl From<QueueError> for JobError {
    fn from(err: QueueError) -> Self {
        JobError::with_source("queue error", err)
    }
}
