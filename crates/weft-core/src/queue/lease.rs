//! Leases and the reclaim sweep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{JobId, JobRecord, QueueError, QueueEvent, Transition};
use crate::ports::{EventSink, JobStore, StatusGuard};

pub const EXCEEDED_MAX_ATTEMPTS: &str = "exceeded maximum attempts";

/// A worker's claim on a reserved job.
///
/// The `attempt` number is the reservation's identity: every write made on
/// behalf of the lease is guarded on it, so once the job has been reclaimed
/// (and possibly re-reserved) the old lease can no longer change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub job_id: JobId,
    pub attempt: u32,
    pub reserved_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl Lease {
    /// Build the lease for a record that was just reserved.
    ///
    /// Returns `None` if the record is not reserved.
    pub fn for_record(record: &JobRecord) -> Option<Self> {
        Some(Self {
            job_id: record.id,
            attempt: record.attempt,
            reserved_at: record.reserved_at?,
            deadline: record.reserved_deadline?,
        })
    }

    pub fn guard(&self) -> StatusGuard {
        StatusGuard::reservation(self.attempt)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline < now
    }

    pub fn lost(&self) -> QueueError {
        QueueError::LeaseLost {
            id: self.job_id,
            attempt: self.attempt,
        }
    }
}

/// What a reclaim sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReclaimReport {
    /// Returned to waiting.
    pub requeued: Vec<JobId>,

    /// Failed for running out of attempts.
    pub failed: Vec<JobId>,

    /// Already moved by someone else between lookup and update.
    pub skipped: usize,
}

impl ReclaimReport {
    pub fn is_empty(&self) -> bool {
        self.requeued.is_empty() && self.failed.is_empty() && self.skipped == 0
    }
}

/// Return every expired reservation to waiting, or fail it if it has used
/// `max_attempts` reservations.
///
/// Each update is guarded on the attempt seen at lookup time, so running the
/// sweep twice (or concurrently) never moves a job twice.
pub async fn reclaim_expired(
    store: &dyn JobStore,
    events: &dyn EventSink,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> Result<ReclaimReport, QueueError> {
    let mut report = ReclaimReport::default();

    for record in store.find_expired_reservations(now).await? {
        let guard = StatusGuard::reservation(record.attempt);
        let exhausted = record.attempt >= max_attempts;
        let transition = if exhausted {
            Transition::Fail {
                error: EXCEEDED_MAX_ATTEMPTS.to_string(),
            }
        } else {
            Transition::Reclaim { now }
        };

        match store.update_status(record.id, guard, transition).await {
            Ok(Some(_)) if exhausted => {
                warn!(job_id = %record.id, attempt = record.attempt, "lease expired; out of attempts");
                events.emit(&QueueEvent::Failed {
                    id: record.id,
                    attempt: record.attempt,
                    error: EXCEEDED_MAX_ATTEMPTS.to_string(),
                });
                report.failed.push(record.id);
            }
            Ok(Some(_)) => {
                info!(job_id = %record.id, attempt = record.attempt, "lease expired; job requeued");
                events.emit(&QueueEvent::Reclaimed {
                    id: record.id,
                    attempt: record.attempt,
                });
                report.requeued.push(record.id);
            }
            Ok(None) | Err(QueueError::NotFound(_)) => {
                debug!(job_id = %record.id, "expired lease already handled elsewhere");
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobStatus;
    use crate::impls::InMemoryJobStore;
    use crate::ports::NoopEventSink;
    use chrono::{Duration, TimeZone};
    use ulid::Ulid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    async fn reserved_job(store: &InMemoryJobStore, now: DateTime<Utc>) -> Lease {
        let id = JobId::from_ulid(Ulid::new());
        store
            .insert(JobRecord::new(id, vec![], "r", now).with_ttr(10))
            .await
            .unwrap();
        let record = store
            .update_status(
                id,
                StatusGuard::status(JobStatus::Waiting),
                Transition::Reserve { now },
            )
            .await
            .unwrap()
            .unwrap();
        Lease::for_record(&record).unwrap()
    }

    #[tokio::test]
    async fn live_leases_are_left_alone() {
        let store = InMemoryJobStore::new();
        reserved_job(&store, t0()).await;

        let report = reclaim_expired(&store, &NoopEventSink, t0() + Duration::seconds(10), 3)
            .await
            .unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn expired_lease_is_requeued_once() {
        let store = InMemoryJobStore::new();
        let lease = reserved_job(&store, t0()).await;
        let later = t0() + Duration::seconds(11);

        let report = reclaim_expired(&store, &NoopEventSink, later, 3).await.unwrap();
        assert_eq!(report.requeued, vec![lease.job_id]);

        let record = store.get(lease.job_id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Waiting);
        assert_eq!(record.due_at, later);
        assert_eq!(record.attempt, 1);

        // Second sweep is a no-op.
        let again = reclaim_expired(&store, &NoopEventSink, later, 3).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(store.get(lease.job_id).await.unwrap().unwrap().attempt, 1);
    }

    #[tokio::test]
    async fn exhausted_job_fails() {
        let store = InMemoryJobStore::new();
        let lease = reserved_job(&store, t0()).await;

        let report = reclaim_expired(&store, &NoopEventSink, t0() + Duration::seconds(11), 1)
            .await
            .unwrap();
        assert_eq!(report.failed, vec![lease.job_id]);

        let record = store.get(lease.job_id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error.as_deref(), Some(EXCEEDED_MAX_ATTEMPTS));
        record.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn lease_built_from_record_matches_deadline() {
        let store = InMemoryJobStore::new();
        let lease = reserved_job(&store, t0()).await;
        assert_eq!(lease.attempt, 1);
        assert_eq!(lease.reserved_at, t0());
        assert_eq!(lease.deadline, t0() + Duration::seconds(10));
        assert!(!lease.is_expired(lease.deadline));
    }
}
