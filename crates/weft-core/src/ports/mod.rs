//! Ports - the seams between the queue core and the outside world.
//!
//! Each trait here hides an external concern (storage, time, id generation,
//! event delivery) so the queue can be wired with real or test
//! implementations.

pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod job_store;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::event_sink::{EventSink, NoopEventSink, TracingEventSink};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job_store::{JobStore, StatusGuard};
