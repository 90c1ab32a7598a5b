//! Built-in jobs for driving the queue from the shell.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use weft_core::{Handler, Job, JobContext, JobError};

/// Logs its message.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Echo {
    pub(crate) message: String,
}

impl Job for Echo {
    const TYPE: &'static str = "echo";

    fn describe(&self) -> String {
        format!("echo {:?}", self.message)
    }
}

pub(crate) struct EchoHandler;

#[async_trait]
impl Handler<Echo> for EchoHandler {
    async fn execute(&self, job: Echo, ctx: &JobContext) -> Result<(), JobError> {
        info!(job_id = %ctx.job_id(), message = %job.message, "echo");
        ctx.set_progress(100, Some("echoed")).await?;
        Ok(())
    }
}

/// Sleeps for `millis`, reporting progress in `steps` increments.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Sleep {
    pub(crate) millis: u64,
    #[serde(default = "default_steps")]
    pub(crate) steps: u32,
}

fn default_steps() -> u32 {
    4
}

/// Progress is a percentage, so finer steps than this add nothing.
const MAX_STEPS: u32 = 100;

impl Job for Sleep {
    const TYPE: &'static str = "sleep";
}

pub(crate) struct SleepHandler;

#[async_trait]
impl Handler<Sleep> for SleepHandler {
    async fn execute(&self, job: Sleep, ctx: &JobContext) -> Result<(), JobError> {
        let steps = job.steps.clamp(1, MAX_STEPS);
        let step = Duration::from_millis(job.millis / u64::from(steps));
        for done in 1..=steps {
            tokio::time::sleep(step).await;
            let progress = (done * 100 / steps) as i32;
            ctx.set_progress(progress, Some(&format!("step {done}/{steps}")))
                .await?;
        }
        Ok(())
    }
}

/// Always fails with `reason`.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Fail {
    #[serde(default = "default_reason")]
    pub(crate) reason: String,
}

fn default_reason() -> String {
    "asked to fail".to_string()
}

impl Job for Fail {
    const TYPE: &'static str = "fail";
}

pub(crate) struct FailHandler;

#[async_trait]
impl Handler<Fail> for FailHandler {
    async fn execute(&self, job: Fail, _ctx: &JobContext) -> Result<(), JobError> {
        Err(JobError::new(job.reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weft_core::{JobEnvelope, JobStatus, PushOptions, QueueBuilder};

    #[tokio::test]
    async fn built_in_jobs_run() {
        let queue = QueueBuilder::new()
            .register::<Echo, _>(EchoHandler)
            .unwrap()
            .register::<Sleep, _>(SleepHandler)
            .unwrap()
            .register::<Fail, _>(FailHandler)
            .unwrap()
            .build()
            .unwrap();

        let echo = queue
            .push_envelope(JobEnvelope::new("echo", json!({ "message": "hi" })), PushOptions::new())
            .await
            .unwrap();
        let sleep = queue
            .push_envelope(JobEnvelope::new("sleep", json!({ "millis": 8 })), PushOptions::new())
            .await
            .unwrap();
        let fail = queue
            .push_envelope(JobEnvelope::new("fail", json!({})), PushOptions::new())
            .await
            .unwrap();

        let summary = queue.run().await.unwrap();
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);

        let sleep = queue.job_details(sleep).await.unwrap();
        assert_eq!(sleep.progress_label.as_deref(), Some("step 4/4"));
        assert_eq!(queue.job_details(echo).await.unwrap().status, JobStatus::Done);

        let fail = queue.job_details(fail).await.unwrap();
        assert_eq!(fail.error.as_deref(), Some("asked to fail"));
    }

    #[tokio::test]
    async fn sleep_caps_its_step_count() {
        let queue = QueueBuilder::new()
            .register::<Sleep, _>(SleepHandler)
            .unwrap()
            .build()
            .unwrap();

        let id = queue
            .push_envelope(
                JobEnvelope::new("sleep", json!({ "millis": 0, "steps": u32::MAX })),
                PushOptions::new(),
            )
            .await
            .unwrap();

        let summary = queue.run().await.unwrap();
        assert_eq!(summary.completed, 1);

        let details = queue.job_details(id).await.unwrap();
        assert_eq!(details.status, JobStatus::Done);
        assert_eq!(details.progress_label.as_deref(), Some("step 100/100"));
    }
}
