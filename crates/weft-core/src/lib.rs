//! weft-core
//!
//! A persistent, delayed, retryable job queue.
//!
//! # Modules
//! - **domain**: job records, status, transitions, errors, events
//! - **ports**: the seams (JobStore, Clock, IdGenerator, EventSink)
//! - **impls**: JobStore implementations (in-memory, JSON file)
//! - **queue**: reservation, leases, reclaim, poll backoff
//! - **typed**: typed job API (Job, Handler, JobRegistry, JobContext)
//! - **app**: JobQueue facade, builder, workers, reaper
//! - **config**: YAML-loadable queue settings

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod typed;

pub use crate::app::{
    BuildError, ExecutionOutcome, JobDetails, JobInfo, JobQueue, PushOptions, QueueBuilder,
    QueueCounts, RunSummary, WorkerGroup,
};
pub use crate::config::{ConfigError, QueueConfig};
pub use crate::domain::{JobEnvelope, JobError, JobId, JobStatus, QueueError, QueueEvent};
pub use crate::typed::{Handler, Job, JobContext};
