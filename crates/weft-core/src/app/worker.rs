//! WorkerGroup - background workers draining a JobQueue.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::queue::JobQueue;
use super::reaper::ReaperLoop;

/// Handle on a set of worker loops plus their reaper.
/// - `request_shutdown()` stops every loop from taking new leases
/// - `shutdown_and_join()` also waits for in-flight jobs to finish
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers and one reaper.
    pub fn spawn(n: usize, queue: Arc<JobQueue>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n + 1);
        for worker_id in 0..n {
            let queue = Arc::clone(&queue);
            let rx = shutdown_rx.clone();
            joins.push(tokio::spawn(worker_loop(worker_id, queue, rx)));
        }

        let reaper = ReaperLoop::new(Arc::clone(&queue), queue.config().reap_interval());
        joins.push(tokio::spawn(reaper.run(shutdown_rx)));

        info!(workers = n, "worker group started");
        Self { shutdown_tx, joins }
    }

    /// Running jobs are not cancelled; loops exit once their current job is
    /// recorded.
    pub fn request_shutdown(&self) {
        // Receivers may already be gone.
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                error!(error = %e, "worker task ended abnormally");
            }
        }
        info!("worker group stopped");
    }
}

async fn worker_loop(worker_id: usize, queue: Arc<JobQueue>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut idle_polls = 0u32;
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let notified = queue.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let reserved = match queue.reserve_next().await {
            Ok(reserved) => reserved,
            Err(e) => {
                error!(worker_id, error = %e, "reserve failed");
                None
            }
        };

        if let Some((lease, record)) = reserved {
            idle_polls = 0;
            // Storage errors while recording are logged; the lease expires
            // and the reaper takes the job back.
            if let Err(e) = queue.execute(lease, record).await {
                error!(worker_id, job_id = %lease.job_id, error = %e, "could not record job result");
            }
            continue;
        }

        idle_polls = idle_polls.saturating_add(1);
        let pause = queue.backoff().next_delay(idle_polls);
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = &mut notified => idle_polls = 0,
            _ = tokio::time::sleep(pause) => {}
        }
    }
    debug!(worker_id, "worker stopped");
}
