//! QueueBuilder - wiring a JobQueue from its parts.
//!
//! Every dependency is handed in explicitly; anything left unset gets a
//! default (in-memory store, system clock, ULID ids, no events).

use std::sync::Arc;

use super::queue::JobQueue;
use crate::config::{ConfigError, QueueConfig};
use crate::impls::InMemoryJobStore;
use crate::ports::{Clock, EventSink, IdGenerator, JobStore, NoopEventSink, SystemClock, UlidGenerator};
use crate::typed::{Handler, Job, JobRegistry, RegistryError};

/// Builds a `JobQueue`.
///
/// # Example
/// ```ignore
/// let queue = QueueBuilder::new()
///     .store(Arc::new(JsonFileStore::open("jobs.json")?))
///     .register::<SendMail, _>(SendMailHandler)?
///     .expect_jobs(&[SendMail::TYPE])
///     .build()?;
/// ```
///
/// # Fail-fast
/// `build()` checks the config and that every job type named in
/// `expect_jobs()` has a handler, so a misconfigured worker refuses to start
/// instead of failing jobs one by one.
pub struct QueueBuilder {
    store: Option<Arc<dyn JobStore>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    events: Arc<dyn EventSink>,
    config: QueueConfig,
    registry: JobRegistry,
    expected_jobs: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing job types: {0:?}. These jobs were expected but have no handler.")]
    MissingJobTypes(Vec<String>),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl QueueBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            clock: None,
            ids: None,
            events: Arc::new(NoopEventSink),
            config: QueueConfig::default(),
            registry: JobRegistry::new(),
            expected_jobs: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to a `UlidGenerator` over the queue's clock.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn register<T: Job, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    /// Job types that must have a handler by the time `build()` runs.
    pub fn expect_jobs(mut self, job_types: &[&str]) -> Self {
        self.expected_jobs = Some(job_types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<JobQueue, BuildError> {
        self.config.validate()?;

        if let Some(expected) = &self.expected_jobs {
            let missing: Vec<String> = expected
                .iter()
                .filter(|job_type| !self.registry.contains(job_type))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingJobTypes(missing));
            }
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))) as Arc<dyn IdGenerator>);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryJobStore::new()) as Arc<dyn JobStore>);

        Ok(JobQueue::from_parts(
            store,
            clock,
            ids,
            self.registry,
            self.events,
            self.config,
        ))
    }
}

impl Default for QueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}
