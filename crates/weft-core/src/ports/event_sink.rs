//! EventSink port: callback for job lifecycle events.
//!
//! # Implementations
//! - NoopEventSink: drops everything (default)
//! - TracingEventSink: logs each event at debug level

use tracing::debug;

use crate::domain::QueueEvent;

/// Receives lifecycle events.
///
/// Called synchronously after the store change has been made; must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &QueueEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &QueueEvent) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &QueueEvent) {
        debug!(event = event.name(), job_id = %event.job_id(), ?event, "queue event");
    }
}
