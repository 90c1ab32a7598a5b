mod args;
mod jobs;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;
use weft_core::impls::JsonFileStore;
use weft_core::ports::TracingEventSink;
use weft_core::{JobEnvelope, JobQueue, PushOptions, QueueBuilder, QueueConfig, WorkerGroup};

use crate::args::{Args, Command};
use crate::jobs::{Echo, EchoHandler, Fail, FailHandler, Sleep, SleepHandler};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logging
    if args.debug {
        tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .init();
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    if let Err(error) = begin(args).await {
        error!("command failed: {error:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn begin(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => QueueConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => QueueConfig::default(),
    };
    let queue = Arc::new(open_queue(&args, config).await?);

    match args.command {
        Command::Push {
            job_type,
            data,
            description,
            priority,
            delay,
            ttr,
        } => {
            let data: serde_json::Value =
                serde_json::from_str(&data).context("--data must be JSON")?;
            let mut options = PushOptions::new().delay(Duration::from_secs(delay));
            if let Some(priority) = priority {
                options = options.priority(priority);
            }
            if let Some(ttr) = ttr {
                options = options.ttr(ttr);
            }
            if let Some(description) = description {
                options = options.description(description);
            }
            let id = queue
                .push_envelope(JobEnvelope::new(job_type, data), options)
                .await
                .context("pushing job")?;
            println!("{id}");
        }
        Command::Run => {
            let summary = queue.run().await.context("running queue")?;
            print_json(&summary)?;
        }
        Command::Work { workers } => {
            let workers = workers.unwrap_or(queue.config().workers);
            work(queue, workers).await?;
        }
        Command::Info { limit } => {
            print_json(&queue.counts().await?)?;
            for info in queue.job_info(limit).await? {
                println!("{}", serde_json::to_string(&info)?);
            }
        }
        Command::Details { id } => {
            let details = queue
                .job_details(id)
                .await
                .with_context(|| format!("looking up {id}"))?;
            print_json(&details)?;
        }
        Command::Retry { id } => {
            queue
                .retry(id)
                .await
                .with_context(|| format!("retrying {id}"))?;
        }
        Command::RetryAll => {
            let retried = queue.retry_all().await?;
            println!("{retried}");
        }
        Command::Release { id } => {
            queue
                .release(id)
                .await
                .with_context(|| format!("releasing {id}"))?;
        }
        Command::ReleaseAll => {
            let released = queue.release_all().await?;
            println!("{released}");
        }
    }
    Ok(())
}

async fn open_queue(args: &Args, config: QueueConfig) -> Result<JobQueue> {
    let store = JsonFileStore::open(&args.store)
        .await
        .with_context(|| format!("opening store {}", args.store.display()))?;

    let queue = QueueBuilder::new()
        .store(Arc::new(store))
        .events(Arc::new(TracingEventSink))
        .config(config)
        .register::<Echo, _>(EchoHandler)?
        .register::<Sleep, _>(SleepHandler)?
        .register::<Fail, _>(FailHandler)?
        .build()?;
    Ok(queue)
}

async fn work(queue: Arc<JobQueue>, workers: usize) -> Result<()> {
    let group = WorkerGroup::spawn(workers, queue);
    info!(workers, "working; ctrl-c to stop");

    if let Err(error) = signal::ctrl_c().await {
        warn!(%error, "could not listen for ctrl-c; stopping");
    }
    info!("shutting down");
    group.shutdown_and_join().await;
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
