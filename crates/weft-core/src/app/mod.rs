//! App - the application layer.
//!
//! Wires ports and queue mechanics together.
//!
//! # Components
//! - **QueueBuilder**: construction and fail-fast checks
//! - **JobQueue**: the facade (push, reserve, execute, admin, introspection)
//! - **WorkerGroup**: background worker loops
//! - **ReaperLoop**: periodic reclaim of expired leases
//! - **status**: introspection views

pub mod builder;
pub mod queue;
pub mod reaper;
pub mod status;
pub mod worker;

pub use self::builder::{BuildError, QueueBuilder};
pub use self::queue::{JobQueue, PushOptions};
pub use self::reaper::ReaperLoop;
pub use self::status::{ExecutionOutcome, JobDetails, JobInfo, QueueCounts, RunSummary};
pub use self::worker::WorkerGroup;
