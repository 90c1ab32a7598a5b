//! IdGenerator port.
//!
//! # Implementations
//! - **UlidGenerator**: clock-based ULIDs, monotonic within one generator.

use std::sync::Mutex;

use ulid::Ulid;

use crate::domain::JobId;
use crate::ports::Clock;

/// Generates job ids.
///
/// Ids produced by one generator must be strictly increasing: the dispatcher
/// uses the id as the last tiebreak, so push order decides among jobs with
/// the same due time and priority.
pub trait IdGenerator: Send + Sync {
    fn generate_job_id(&self) -> JobId;
}

/// ULID generator driven by a `Clock`.
///
/// Within one millisecond (or if the clock goes backwards) the previous id is
/// incremented instead of drawing fresh randomness.
pub struct UlidGenerator<C> {
    clock: C,
    last: Mutex<Option<Ulid>>,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            last: Mutex::new(None),
        }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_job_id(&self) -> JobId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        let fresh = Ulid::from_parts(timestamp_ms, rand::random());

        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = match *last {
            Some(prev) if fresh <= prev => prev.increment().unwrap_or(fresh),
            _ => fresh,
        };
        *last = Some(next);
        JobId::from_ulid(next)
    }
}
