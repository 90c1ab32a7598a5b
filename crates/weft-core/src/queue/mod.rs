//! Queue mechanics: reservation, leases, reclaim, poll backoff.
//!
//! These are free functions over a `JobStore` so they can be tested against
//! any store; `app::JobQueue` wires them together.

pub mod backoff;
pub mod dispatcher;
pub mod lease;

pub use self::backoff::PollBackoff;
pub use self::dispatcher::reserve_next;
pub use self::lease::{EXCEEDED_MAX_ATTEMPTS, Lease, ReclaimReport, reclaim_expired};
