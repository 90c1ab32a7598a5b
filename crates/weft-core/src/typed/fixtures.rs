//! Job types and handlers shared by the crate's tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::context::JobContext;
use super::handler::Handler;
use super::job::Job;
use crate::domain::{JobError, QueueEvent};
use crate::ports::EventSink;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Greet {
    pub name: String,
}

impl Job for Greet {
    const TYPE: &'static str = "test.greet.v1";

    fn describe(&self) -> String {
        format!("Greeting {}", self.name)
    }
}

/// Records the names it greeted, in execution order.
#[derive(Default, Clone)]
pub struct GreetHandler {
    pub seen: Arc<Mutex<Vec<String>>>,
}

impl GreetHandler {
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Handler<Greet> for GreetHandler {
    async fn execute(&self, job: Greet, ctx: &JobContext) -> Result<(), JobError> {
        ctx.set_progress(50, Some("greeting")).await?;
        self.seen.lock().unwrap().push(job.name);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explode {
    pub reason: String,
}

impl Job for Explode {
    const TYPE: &'static str = "test.explode.v1";
}

pub struct ExplodeHandler;

#[async_trait]
impl Handler<Explode> for ExplodeHandler {
    async fn execute(&self, job: Explode, _ctx: &JobContext) -> Result<(), JobError> {
        let cause = std::io::Error::new(std::io::ErrorKind::Other, job.reason);
        Err(JobError::with_source("explode job failed", cause))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Panicky;

impl Job for Panicky {
    const TYPE: &'static str = "test.panic.v1";
}

pub struct PanickyHandler;

#[async_trait]
impl Handler<Panicky> for PanickyHandler {
    async fn execute(&self, _job: Panicky, _ctx: &JobContext) -> Result<(), JobError> {
        panic!("handler blew up");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nap {
    pub millis: u64,
}

impl Job for Nap {
    const TYPE: &'static str = "test.nap.v1";
}

pub struct NapHandler;

#[async_trait]
impl Handler<Nap> for NapHandler {
    async fn execute(&self, job: Nap, _ctx: &JobContext) -> Result<(), JobError> {
        tokio::time::sleep(Duration::from_millis(job.millis)).await;
        Ok(())
    }
}

/// Event sink that keeps everything it is given.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<QueueEvent>>,
}

impl RecordingSink {
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }

    pub fn events(&self) -> Vec<QueueEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &QueueEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
