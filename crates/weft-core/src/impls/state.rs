//! Store state shared by the in-memory and file-backed stores.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::domain::{JobId, JobRecord, JobStatus, QueueError, Transition};
use crate::ports::StatusGuard;

type EligibilityKey = (DateTime<Utc>, i32, JobId);

/// Records plus an ordered index of waiting jobs.
///
/// Invariant: `waiting` holds exactly the eligibility keys of the records
/// whose status is `Waiting`.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    records: HashMap<JobId, JobRecord>,
    waiting: BTreeSet<EligibilityKey>,
}

impl StoreState {
    pub(crate) fn from_records(
        records: impl IntoIterator<Item = JobRecord>,
    ) -> Result<Self, QueueError> {
        let mut state = Self::default();
        for record in records {
            state.insert(record)?;
        }
        Ok(state)
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &JobRecord> {
        self.records.values()
    }

    pub(crate) fn insert(&mut self, record: JobRecord) -> Result<(), QueueError> {
        if self.records.contains_key(&record.id) {
            return Err(QueueError::storage(format!("duplicate job id {}", record.id)));
        }
        if record.status == JobStatus::Waiting {
            self.waiting.insert(record.eligibility_key());
        }
        self.records.insert(record.id, record);
        Ok(())
    }

    pub(crate) fn update_status(
        &mut self,
        id: JobId,
        guard: StatusGuard,
        transition: &Transition,
    ) -> Result<Option<JobRecord>, QueueError> {
        let record = self.records.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        if !guard.matches(record) {
            return Ok(None);
        }

        let old_key = record.eligibility_key();
        let was_waiting = record.status == JobStatus::Waiting;
        record.apply(transition)?;

        if was_waiting {
            self.waiting.remove(&old_key);
        }
        if record.status == JobStatus::Waiting {
            self.waiting.insert(record.eligibility_key());
        }
        Ok(Some(record.clone()))
    }

    pub(crate) fn update_progress(
        &mut self,
        id: JobId,
        attempt: u32,
        progress: u8,
        label: Option<String>,
    ) -> Result<bool, QueueError> {
        let record = self.records.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        if !StatusGuard::reservation(attempt).matches(record) {
            return Ok(false);
        }
        record.set_progress(progress, label);
        Ok(true)
    }

    pub(crate) fn find_next_eligible(&self, now: DateTime<Utc>) -> Option<JobRecord> {
        // The index is ordered by due_at first, so only the head can be due.
        let (due_at, _, id) = self.waiting.first()?;
        if *due_at > now {
            return None;
        }
        self.records.get(id).cloned()
    }

    pub(crate) fn find_expired_reservations(&self, now: DateTime<Utc>) -> Vec<JobRecord> {
        let mut expired: Vec<JobRecord> = self
            .records
            .values()
            .filter(|r| r.is_lease_expired(now))
            .cloned()
            .collect();
        expired.sort_by_key(|r| (r.reserved_deadline, r.id));
        expired
    }

    pub(crate) fn count(&self, status: JobStatus) -> usize {
        if status == JobStatus::Waiting {
            return self.waiting.len();
        }
        self.records.values().filter(|r| r.status == status).count()
    }

    pub(crate) fn list(&self, limit: Option<usize>, status: Option<JobStatus>) -> Vec<JobRecord> {
        let mut jobs: Vec<&JobRecord> = self
            .records
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .collect();
        jobs.sort_by_key(|r| (r.priority, r.id));
        jobs.into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub(crate) fn get(&self, id: JobId) -> Option<JobRecord> {
        self.records.get(&id).cloned()
    }

    pub(crate) fn delete(&mut self, id: JobId) -> bool {
        let Some(record) = self.records.remove(&id) else {
            return false;
        };
        if record.status == JobStatus::Waiting {
            self.waiting.remove(&record.eligibility_key());
        }
        true
    }
}
