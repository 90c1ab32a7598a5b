//! Job identifiers.
//!
//! Ids are ULIDs: the timestamp prefix makes them sortable by push time,
//! which the dispatcher relies on as the final tiebreak of its ordering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

const PREFIX: &str = "job-";

/// Identifier of a job, assigned at push time and never changed.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Ulid);

impl JobId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for JobId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}", self.0)
    }
}

/// Error returned when a string is not a valid job id.
#[derive(Debug, thiserror::Error)]
#[error("invalid job id '{input}'")]
pub struct ParseJobIdError {
    input: String,
}

impl FromStr for JobId {
    type Err = ParseJobIdError;

    /// Accepts both the display form (`job-01H...`) and a bare ULID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(PREFIX).unwrap_or(s);
        Ulid::from_string(raw)
            .map(JobId::from_ulid)
            .map_err(|_| ParseJobIdError {
                input: s.to_string(),
            })
    }
}
