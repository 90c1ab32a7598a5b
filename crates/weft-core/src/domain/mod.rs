//! Domain model (ids, records, status, transitions, errors, events).

pub mod envelope;
pub mod errors;
pub mod events;
pub mod ids;
pub mod record;
pub mod status;
pub mod transition;

pub use self::envelope::JobEnvelope;
pub use self::errors::{JobError, QueueError};
pub use self::events::QueueEvent;
pub use self::ids::{JobId, ParseJobIdError};
pub use self::record::{DEFAULT_PRIORITY, DEFAULT_TTR_SECS, JobRecord, PROGRESS_MAX};
pub use self::status::JobStatus;
pub use self::transition::Transition;
