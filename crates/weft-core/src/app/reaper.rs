//! ReaperLoop - periodic reclaim of expired leases.
//!
//! Reservation already sweeps when `sweep_on_reserve` is set; the reaper
//! covers idle periods and queues configured without it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::queue::JobQueue;

pub struct ReaperLoop {
    queue: Arc<JobQueue>,
    interval: Duration,
}

impl ReaperLoop {
    pub fn new(queue: Arc<JobQueue>, interval: Duration) -> Self {
        Self { queue, interval }
    }

    /// Sweep every `interval` until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            match self.queue.reclaim_expired().await {
                Ok(report) if report.is_empty() => {}
                Ok(report) => info!(
                    requeued = report.requeued.len(),
                    failed = report.failed.len(),
                    skipped = report.skipped,
                    "reaper reclaimed expired leases"
                ),
                Err(e) => error!(error = %e, "reaper sweep failed"),
            }
        }
        debug!("reaper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::QueueBuilder;
    use crate::config::QueueConfig;
    use crate::domain::JobStatus;
    use crate::ports::ManualClock;
    use crate::typed::fixtures::{Greet, GreetHandler};
    use chrono::Utc;

    #[tokio::test]
    async fn reaper_requeues_expired_leases() {
        let clock = ManualClock::new(Utc::now());
        let queue = QueueBuilder::new()
            .clock(Arc::new(clock.clone()))
            .config(QueueConfig {
                sweep_on_reserve: false,
                ..QueueConfig::default()
            })
            .register::<Greet, _>(GreetHandler::default())
            .unwrap()
            .build()
            .unwrap();
        let queue = Arc::new(queue);

        let id = queue
            .push_with(
                &Greet { name: "r".into() },
                crate::app::PushOptions::new().ttr(1),
            )
            .await
            .unwrap();
        queue.reserve_next().await.unwrap().unwrap();
        clock.advance(chrono::Duration::seconds(2));

        let (tx, rx) = watch::channel(false);
        let reaper = tokio::spawn(
            ReaperLoop::new(Arc::clone(&queue), Duration::from_millis(5)).run(rx),
        );

        let mut status = JobStatus::Reserved;
        for _ in 0..100 {
            status = queue.job_details(id).await.unwrap().status;
            if status == JobStatus::Waiting {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(status, JobStatus::Waiting);

        tx.send(true).unwrap();
        reaper.await.unwrap();
    }
}
