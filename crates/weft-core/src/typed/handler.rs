//! Handler trait - the code that runs a job.
//!
//! - `Handler<T>` is what applications implement: typed, one per job type.
//! - `DynHandler` is the object-safe form the registry stores; the payload
//!   is decoded from JSON before the typed handler sees it.

use std::marker::PhantomData;

use async_trait::async_trait;

use super::context::JobContext;
use super::job::Job;
use crate::domain::JobError;

/// Runs jobs of type `T`.
///
/// # Example
/// ```ignore
/// struct ResizeImageHandler;
///
/// #[async_trait]
/// impl Handler<ResizeImage> for ResizeImageHandler {
///     async fn execute(&self, job: ResizeImage, ctx: &JobContext) -> Result<(), JobError> {
///         ctx.set_progress(50, Some("resizing")).await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<T: Job>: Send + Sync {
    async fn execute(&self, job: T, ctx: &JobContext) -> Result<(), JobError>;
}

/// Object-safe handler keyed by job type name.
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn execute_dyn(&self, data: serde_json::Value, ctx: &JobContext)
    -> Result<(), JobError>;

    fn job_type(&self) -> &str;
}

/// Adapter from `Handler<T>` to `DynHandler`.
pub struct TypedHandler<T: Job, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Job, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Job, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn execute_dyn(
        &self,
        data: serde_json::Value,
        ctx: &JobContext,
    ) -> Result<(), JobError> {
        let job: T = serde_json::from_value(data).map_err(|e| {
            JobError::with_source(format!("could not decode {} payload", T::TYPE), e)
        })?;
        self.handler.execute(job, ctx).await
    }

    fn job_type(&self) -> &str {
        T::TYPE
    }
}
