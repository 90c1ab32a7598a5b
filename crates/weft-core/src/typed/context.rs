//! JobContext - what a running job can see and do.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{JobId, PROGRESS_MAX, QueueError, QueueEvent};
use crate::ports::{EventSink, JobStore};
use crate::queue::Lease;

/// Handed to a handler for the duration of one attempt.
#[derive(Clone)]
pub struct JobContext {
    lease: Lease,
    description: String,
    store: Arc<dyn JobStore>,
    events: Arc<dyn EventSink>,
}

impl JobContext {
    pub(crate) fn new(
        lease: Lease,
        description: String,
        store: Arc<dyn JobStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            lease,
            description,
            store,
            events,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.lease.job_id
    }

    /// 1 on the first run, counting every reservation since.
    pub fn attempt(&self) -> u32 {
        self.lease.attempt
    }

    pub fn lease(&self) -> &Lease {
        &self.lease
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Report progress (clamped to 0..=100) with an optional label.
    ///
    /// Fails with `LeaseLost` once this attempt's lease has been reclaimed;
    /// the job's newer reservation is left untouched.
    pub async fn set_progress(
        &self,
        progress: i32,
        label: Option<&str>,
    ) -> Result<(), QueueError> {
        set_progress(&*self.store, &*self.events, &self.lease, progress, label).await
    }
}

/// Guarded progress write shared by `JobContext` and `JobQueue`.
pub(crate) async fn set_progress(
    store: &dyn JobStore,
    events: &dyn EventSink,
    lease: &Lease,
    progress: i32,
    label: Option<&str>,
) -> Result<(), QueueError> {
    let progress = progress.clamp(0, i32::from(PROGRESS_MAX)) as u8;
    let label = label.map(str::to_string);

    let applied = store
        .update_progress(lease.job_id, lease.attempt, progress, label.clone())
        .await?;
    if !applied {
        return Err(lease.lost());
    }

    debug!(job_id = %lease.job_id, progress, "progress");
    events.emit(&QueueEvent::Progressed {
        id: lease.job_id,
        progress,
        label,
    });
    Ok(())
}
