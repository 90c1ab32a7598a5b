//! Dispatcher: picks and reserves the next eligible job.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::lease::Lease;
use crate::domain::{JobRecord, JobStatus, QueueError, Transition};
use crate::ports::{JobStore, StatusGuard};

/// Reserve the next eligible job at `now`.
///
/// Looks up the first waiting job by `(due_at, priority, id)` and tries to
/// CAS it to reserved. Losing the race to another worker triggers a fresh
/// lookup, at most `contention_retries` times, after which the caller is
/// told there is nothing to do and should poll again later.
pub async fn reserve_next(
    store: &dyn JobStore,
    now: DateTime<Utc>,
    contention_retries: u32,
) -> Result<Option<(Lease, JobRecord)>, QueueError> {
    for round in 0..=contention_retries {
        let Some(candidate) = store.find_next_eligible(now).await? else {
            return Ok(None);
        };

        let reserved = match store
            .update_status(
                candidate.id,
                StatusGuard::status(JobStatus::Waiting),
                Transition::Reserve { now },
            )
            .await
        {
            Ok(reserved) => reserved,
            // Released between lookup and reservation.
            Err(QueueError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        if let Some(record) = reserved
            && let Some(lease) = Lease::for_record(&record)
        {
            return Ok(Some((lease, record)));
        }
        debug!(job_id = %candidate.id, round, "lost reservation race");
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobId;
    use crate::impls::InMemoryJobStore;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicU32, Ordering};
    use ulid::Ulid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn id(n: u64) -> JobId {
        JobId::from_ulid(Ulid::from_parts(1_700_000_000_000 + n, 0))
    }

    #[tokio::test]
    async fn reserves_in_due_then_priority_then_id_order() {
        let store = InMemoryJobStore::new();
        // A(T, 5), B(T, 1), C(T-1, 9)
        store
            .insert(JobRecord::new(id(1), vec![], "A", t0()).with_priority(5))
            .await
            .unwrap();
        store
            .insert(JobRecord::new(id(2), vec![], "B", t0()).with_priority(1))
            .await
            .unwrap();
        store
            .insert(
                JobRecord::new(id(3), vec![], "C", t0())
                    .with_priority(9)
                    .with_due_at(t0() - Duration::seconds(1)),
            )
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Some((lease, record)) = reserve_next(&store, t0(), 3).await.unwrap() {
            assert_eq!(lease.job_id, record.id);
            seen.push(record.description);
        }
        assert_eq!(seen, vec!["C", "B", "A"]);
    }

    #[tokio::test]
    async fn empty_store_yields_nothing() {
        let store = InMemoryJobStore::new();
        assert!(reserve_next(&store, t0(), 3).await.unwrap().is_none());
    }

    /// Store wrapper whose CAS always loses, as if another worker always won.
    struct AlwaysContended {
        inner: InMemoryJobStore,
        lookups: AtomicU32,
    }

    #[async_trait]
    impl JobStore for AlwaysContended {
        async fn insert(&self, record: JobRecord) -> Result<(), QueueError> {
            self.inner.insert(record).await
        }
        async fn update_status(
            &self,
            _id: JobId,
            _guard: StatusGuard,
            _transition: Transition,
        ) -> Result<Option<JobRecord>, QueueError> {
            Ok(None)
        }
        async fn update_progress(
            &self,
            id: JobId,
            attempt: u32,
            progress: u8,
            label: Option<String>,
        ) -> Result<bool, QueueError> {
            self.inner.update_progress(id, attempt, progress, label).await
        }
        async fn find_next_eligible(
            &self,
            now: DateTime<Utc>,
        ) -> Result<Option<JobRecord>, QueueError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_next_eligible(now).await
        }
        async fn find_expired_reservations(
            &self,
            now: DateTime<Utc>,
        ) -> Result<Vec<JobRecord>, QueueError> {
            self.inner.find_expired_reservations(now).await
        }
        async fn count(&self, status: JobStatus) -> Result<usize, QueueError> {
            self.inner.count(status).await
        }
        async fn list_jobs(
            &self,
            limit: Option<usize>,
            status: Option<JobStatus>,
        ) -> Result<Vec<JobRecord>, QueueError> {
            self.inner.list_jobs(limit, status).await
        }
        async fn get(&self, id: JobId) -> Result<Option<JobRecord>, QueueError> {
            self.inner.get(id).await
        }
        async fn delete(&self, id: JobId) -> Result<bool, QueueError> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn contention_gives_up_after_bounded_retries() {
        let store = AlwaysContended {
            inner: InMemoryJobStore::new(),
            lookups: AtomicU32::new(0),
        };
        store
            .insert(JobRecord::new(id(1), vec![], "x", t0()))
            .await
            .unwrap();

        let out = reserve_next(&store, t0(), 3).await.unwrap();
        assert!(out.is_none());
        assert_eq!(store.lookups.load(Ordering::SeqCst), 4);
    }
}
