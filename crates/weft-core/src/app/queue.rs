//! JobQueue - the facade producers, workers and admin tools talk to.
//!
//! Every mutation goes through a guarded `JobStore::update_status` /
//! `update_progress`; nothing here writes back a record it read earlier.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::status::{ExecutionOutcome, JobDetails, JobInfo, QueueCounts, RunSummary};
use crate::config::QueueConfig;
use crate::domain::{
    JobEnvelope, JobId, JobRecord, JobStatus, QueueError, QueueEvent, Transition,
};
use crate::ports::{Clock, EventSink, IdGenerator, JobStore, StatusGuard};
use crate::queue::{Lease, PollBackoff, ReclaimReport, dispatcher, lease};
use crate::typed::{Job, JobContext, JobRegistry, context};

/// Per-push overrides. Unset fields fall back to the queue's config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOptions {
    pub priority: Option<i32>,
    pub delay: Duration,
    pub ttr: Option<u32>,
    pub description: Option<String>,
}

impl PushOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn ttr(mut self, ttr_secs: u32) -> Self {
        self.ttr = Some(ttr_secs);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The job queue.
///
/// Built with `QueueBuilder`. Cheap to share behind an `Arc`; all state
/// lives in the store.
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    registry: Arc<JobRegistry>,
    events: Arc<dyn EventSink>,
    config: QueueConfig,
    backoff: PollBackoff,
    pushed: Notify,
}

impl JobQueue {
    pub(crate) fn from_parts(
        store: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        registry: JobRegistry,
        events: Arc<dyn EventSink>,
        config: QueueConfig,
    ) -> Self {
        let backoff = PollBackoff::from_config(&config.poll);
        Self {
            store,
            clock,
            ids,
            registry: Arc::new(registry),
            events,
            config,
            backoff,
            pushed: Notify::new(),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn backoff(&self) -> &PollBackoff {
        &self.backoff
    }

    /// Resolves on the next push or retry. Call `enable()` on the pinned
    /// future before checking the queue so a push in between is not missed.
    pub fn notified(&self) -> Notified<'_> {
        self.pushed.notified()
    }

    // ---------------------------------------------------------------------
    // Producers
    // ---------------------------------------------------------------------

    /// Push a typed job with the configured defaults.
    pub async fn push<T: Job>(&self, job: &T) -> Result<JobId, QueueError> {
        self.push_with(job, PushOptions::default()).await
    }

    pub async fn push_with<T: Job>(
        &self,
        job: &T,
        options: PushOptions,
    ) -> Result<JobId, QueueError> {
        let envelope = JobEnvelope::new(T::TYPE, serde_json::to_value(job)?);
        let description = options
            .description
            .clone()
            .unwrap_or_else(|| job.describe());
        self.insert(envelope, description, &options).await
    }

    /// Push an untyped job. Fails with `UnknownJobType` if no handler is
    /// registered for its type.
    pub async fn push_envelope(
        &self,
        envelope: JobEnvelope,
        options: PushOptions,
    ) -> Result<JobId, QueueError> {
        if !self.registry.contains(envelope.job_type()) {
            return Err(QueueError::UnknownJobType(envelope.job_type().to_string()));
        }
        let description = options
            .description
            .clone()
            .unwrap_or_else(|| envelope.job_type().to_string());
        self.insert(envelope, description, &options).await
    }

    async fn insert(
        &self,
        envelope: JobEnvelope,
        description: String,
        options: &PushOptions,
    ) -> Result<JobId, QueueError> {
        let ttr = options.ttr.unwrap_or(self.config.default_ttr_secs);
        if ttr == 0 {
            return Err(QueueError::InvalidArgument(
                "ttr must be at least one second".into(),
            ));
        }
        let priority = options.priority.unwrap_or(self.config.default_priority);

        let now = self.clock.now();
        let due_at = chrono::Duration::from_std(options.delay)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .ok_or_else(|| {
                QueueError::InvalidArgument(format!("delay {:?} is out of range", options.delay))
            })?;

        let id = self.ids.generate_job_id();
        let record = JobRecord::new(id, envelope.encode()?, description, now)
            .with_priority(priority)
            .with_ttr(ttr)
            .with_due_at(due_at);
        self.store.insert(record).await?;

        let delay_secs = options.delay.as_secs();
        info!(job_id = %id, job_type = envelope.job_type(), priority, delay_secs, "job pushed");
        self.events.emit(&QueueEvent::Pushed {
            id,
            job_type: envelope.job_type().to_string(),
            delay_secs,
        });
        self.pushed.notify_waiters();
        Ok(id)
    }

    // ---------------------------------------------------------------------
    // Workers
    // ---------------------------------------------------------------------

    /// Reserve the next eligible job, sweeping expired leases first if
    /// `sweep_on_reserve` is set.
    pub async fn reserve_next(&self) -> Result<Option<(Lease, JobRecord)>, QueueError> {
        let now = self.clock.now();
        if self.config.sweep_on_reserve {
            lease::reclaim_expired(&*self.store, &*self.events, now, self.config.max_attempts)
                .await?;
        }

        let reserved =
            dispatcher::reserve_next(&*self.store, now, self.config.reserve_retries).await?;
        if let Some((lease, _)) = &reserved {
            debug!(job_id = %lease.job_id, attempt = lease.attempt, "job reserved");
            self.events.emit(&QueueEvent::Reserved {
                id: lease.job_id,
                attempt: lease.attempt,
            });
        }
        Ok(reserved)
    }

    /// Poll for a job until one is reserved or `timeout` passes.
    ///
    /// Idle polls back off exponentially; a push cuts the wait short.
    pub async fn wait_for_job(
        &self,
        timeout: Duration,
    ) -> Result<Option<(Lease, JobRecord)>, QueueError> {
        let deadline = Instant::now() + timeout;
        let mut idle_polls = 0u32;
        loop {
            let notified = self.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(reserved) = self.reserve_next().await? {
                return Ok(Some(reserved));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            idle_polls = idle_polls.saturating_add(1);
            let pause = self.backoff.next_delay(idle_polls).min(deadline - now);

            tokio::select! {
                _ = &mut notified => idle_polls = 0,
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Run the handler for a reserved job and record the result.
    ///
    /// Handler errors, panics, undecodable payloads and unknown job types
    /// all fail the job; only storage errors are returned to the caller.
    #[instrument(
        name = "execute",
        skip(self, record),
        fields(job_id = %lease.job_id, attempt = lease.attempt)
    )]
    pub async fn execute(
        &self,
        lease: Lease,
        record: JobRecord,
    ) -> Result<ExecutionOutcome, QueueError> {
        let recorded = match self.run_handler(lease, &record).await {
            Ok(()) => self
                .mark_done(&lease)
                .await
                .map(|()| ExecutionOutcome::Completed),
            Err(message) => self
                .mark_failed(&lease, message.clone())
                .await
                .map(|()| ExecutionOutcome::Failed(message)),
        };

        match recorded {
            Err(e) if e.is_lease_lost() => {
                warn!(error = %e, "lease lost before the result was recorded");
                Ok(ExecutionOutcome::LeaseLost)
            }
            other => other,
        }
    }

    async fn run_handler(&self, lease: Lease, record: &JobRecord) -> Result<(), String> {
        let envelope = JobEnvelope::decode(&record.payload)
            .map_err(|e| format!("could not decode job payload: {e}"))?;
        let handler = self
            .registry
            .get(envelope.job_type())
            .ok_or_else(|| QueueError::UnknownJobType(envelope.job_type().to_string()).to_string())?;

        let ctx = JobContext::new(
            lease,
            record.description.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.events),
        );
        let data = envelope.into_data();

        // Spawned so a panicking handler only takes its own task down.
        let joined = tokio::spawn(async move { handler.execute_dyn(data, &ctx).await }).await;
        match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.describe_chain()),
            Err(e) => Err(describe_join_error(e)),
        }
    }

    /// Mark the lease's job done.
    ///
    /// `LeaseLost` if the reservation no longer holds (reclaimed, or the job
    /// was released while running).
    pub async fn mark_done(&self, lease: &Lease) -> Result<(), QueueError> {
        self.finish(lease, Transition::Complete).await?;
        info!(job_id = %lease.job_id, attempt = lease.attempt, "job done");
        self.events.emit(&QueueEvent::Completed {
            id: lease.job_id,
            attempt: lease.attempt,
        });
        Ok(())
    }

    pub async fn mark_failed(
        &self,
        lease: &Lease,
        error: impl Into<String>,
    ) -> Result<(), QueueError> {
        let error = error.into();
        self.finish(
            lease,
            Transition::Fail {
                error: error.clone(),
            },
        )
        .await?;
        warn!(job_id = %lease.job_id, attempt = lease.attempt, %error, "job failed");
        self.events.emit(&QueueEvent::Failed {
            id: lease.job_id,
            attempt: lease.attempt,
            error,
        });
        Ok(())
    }

    async fn finish(&self, lease: &Lease, transition: Transition) -> Result<(), QueueError> {
        match self
            .store
            .update_status(lease.job_id, lease.guard(), transition)
            .await
        {
            Ok(Some(_)) => Ok(()),
            Ok(None) | Err(QueueError::NotFound(_)) => Err(lease.lost()),
            Err(e) => Err(e),
        }
    }

    /// Report progress on behalf of `lease`; see `JobContext::set_progress`.
    pub async fn set_progress(
        &self,
        lease: &Lease,
        progress: i32,
        label: Option<&str>,
    ) -> Result<(), QueueError> {
        context::set_progress(&*self.store, &*self.events, lease, progress, label).await
    }

    /// Reclaim every expired lease now.
    pub async fn reclaim_expired(&self) -> Result<ReclaimReport, QueueError> {
        let report = lease::reclaim_expired(
            &*self.store,
            &*self.events,
            self.clock.now(),
            self.config.max_attempts,
        )
        .await?;
        if !report.requeued.is_empty() {
            self.pushed.notify_waiters();
        }
        Ok(report)
    }

    /// Execute eligible jobs in the foreground until none is left.
    pub async fn run(&self) -> Result<RunSummary, QueueError> {
        let mut summary = RunSummary::default();
        while let Some((lease, record)) = self.reserve_next().await? {
            let outcome = self.execute(lease, record).await?;
            summary.record(&outcome);
        }
        info!(
            completed = summary.completed,
            failed = summary.failed,
            lease_lost = summary.lease_lost,
            "queue drained"
        );
        Ok(summary)
    }

    // ---------------------------------------------------------------------
    // Admin
    // ---------------------------------------------------------------------

    /// Put a failed job back in the queue, due now. Its attempt count is kept.
    pub async fn retry(&self, id: JobId) -> Result<(), QueueError> {
        if !self.retry_failed(id).await? {
            let status = self
                .store
                .get(id)
                .await?
                .map(|record| record.status)
                .ok_or(QueueError::NotFound(id))?;
            return Err(QueueError::InvalidState {
                id,
                status,
                action: "retry",
            });
        }
        self.pushed.notify_waiters();
        Ok(())
    }

    /// Retry every failed job. Returns how many were requeued.
    pub async fn retry_all(&self) -> Result<usize, QueueError> {
        let failed = self.store.list_jobs(None, Some(JobStatus::Failed)).await?;
        let mut retried = 0;
        for record in failed {
            match self.retry_failed(record.id).await {
                Ok(true) => retried += 1,
                Ok(false) | Err(QueueError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if retried > 0 {
            self.pushed.notify_waiters();
        }
        info!(retried, "retried failed jobs");
        Ok(retried)
    }

    async fn retry_failed(&self, id: JobId) -> Result<bool, QueueError> {
        let now = self.clock.now();
        let retried = self
            .store
            .update_status(id, StatusGuard::status(JobStatus::Failed), Transition::Retry { now })
            .await?;
        if retried.is_some() {
            info!(job_id = %id, "job retried");
            self.events.emit(&QueueEvent::Retried { id });
        }
        Ok(retried.is_some())
    }

    /// Remove a job whatever its status.
    ///
    /// A worker still running it gets `LeaseLost` when it reports back.
    pub async fn release(&self, id: JobId) -> Result<(), QueueError> {
        if !self.store.delete(id).await? {
            return Err(QueueError::NotFound(id));
        }
        info!(job_id = %id, "job released");
        self.events.emit(&QueueEvent::Released { id });
        Ok(())
    }

    /// Remove every job. Returns how many were removed.
    pub async fn release_all(&self) -> Result<usize, QueueError> {
        let mut released = 0;
        for record in self.store.list_jobs(None, None).await? {
            if self.store.delete(record.id).await? {
                self.events.emit(&QueueEvent::Released { id: record.id });
                released += 1;
            }
        }
        info!(released, "released all jobs");
        Ok(released)
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    pub async fn has_waiting_jobs(&self) -> Result<bool, QueueError> {
        Ok(self.store.count(JobStatus::Waiting).await? > 0)
    }

    pub async fn has_reserved_jobs(&self) -> Result<bool, QueueError> {
        Ok(self.store.count(JobStatus::Reserved).await? > 0)
    }

    /// Waiting + reserved + failed. Done jobs are no longer in the queue.
    pub async fn total_jobs(&self) -> Result<usize, QueueError> {
        Ok(self.counts().await?.total())
    }

    pub async fn counts(&self) -> Result<QueueCounts, QueueError> {
        Ok(QueueCounts {
            waiting: self.store.count(JobStatus::Waiting).await?,
            reserved: self.store.count(JobStatus::Reserved).await?,
            done: self.store.count(JobStatus::Done).await?,
            failed: self.store.count(JobStatus::Failed).await?,
        })
    }

    /// Jobs not yet done, ordered by `(priority, id)`.
    pub async fn job_info(&self, limit: Option<usize>) -> Result<Vec<JobInfo>, QueueError> {
        let now = self.clock.now();
        let records = self.store.list_jobs(None, None).await?;
        Ok(records
            .iter()
            .filter(|record| record.status.is_queued())
            .take(limit.unwrap_or(usize::MAX))
            .map(|record| JobInfo::from_record(record, now))
            .collect())
    }

    pub async fn job_details(&self, id: JobId) -> Result<JobDetails, QueueError> {
        let record = self.store.get(id).await?.ok_or(QueueError::NotFound(id))?;
        Ok(JobDetails::from_record(&record, self.clock.now()))
    }
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_panic() {
        format!("job panicked: {}", panic_message(&*err.into_panic()))
    } else {
        "job was cancelled".to_string()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
