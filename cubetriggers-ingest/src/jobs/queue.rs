//! In-process job queues
//!
//! One sequential worker task per queue, fed over unbounded channels.
//! Delivery contract (shared with any external transport that might
//! replace this): at-least-once, bounded retries with exponential
//! backoff, import jobs get 3 attempts with a 2s base, aggregate jobs 2
//! attempts with a 5s base and a fixed start delay so the import that
//! scheduled them has normally finished committing.

use cubetriggers_common::config::Config;
use cubetriggers_common::events::EventBus;
use cubetriggers_common::{Error, Result};
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::jobs::{AggregateProcessor, ComputeAggregatesJob, ImportProcessor, ProcessImportJob};

struct DelayedJob<T> {
    job: T,
    run_at: Instant,
}

/// Handle for enqueueing background jobs
///
/// Dropping the handle (or calling [`JobQueue::shutdown`]) closes the
/// queues; the workers drain what was already enqueued and exit.
pub struct JobQueue {
    import_tx: mpsc::UnboundedSender<ProcessImportJob>,
    aggregate_tx: mpsc::UnboundedSender<DelayedJob<ComputeAggregatesJob>>,
    workers: Vec<JoinHandle<()>>,
    aggregate_delay: Duration,
}

impl JobQueue {
    /// Spawn the worker tasks and return the enqueue handle
    pub fn start(db: SqlitePool, event_bus: EventBus, config: Config) -> Self {
        let (import_tx, import_rx) = mpsc::unbounded_channel();
        let (aggregate_tx, aggregate_rx) = mpsc::unbounded_channel();

        let aggregate_delay = Duration::from_millis(config.aggregate_delay_ms);

        let import_worker = tokio::spawn(run_import_worker(
            import_rx,
            ImportProcessor::new(db.clone(), event_bus.clone(), config.clone()),
            config.import_max_attempts.max(1),
            config.import_backoff_ms,
        ));

        let aggregate_worker = tokio::spawn(run_aggregate_worker(
            aggregate_rx,
            AggregateProcessor::new(db, event_bus),
            config.aggregate_max_attempts.max(1),
            config.aggregate_backoff_ms,
        ));

        Self {
            import_tx,
            aggregate_tx,
            workers: vec![import_worker, aggregate_worker],
            aggregate_delay,
        }
    }

    /// Queue an import processing job
    pub fn enqueue_import(&self, job: ProcessImportJob) -> Result<()> {
        tracing::info!(import_run_id = %job.import_run_id, "Queued import processing job");
        self.import_tx
            .send(job)
            .map_err(|_| Error::Internal("Import queue is shut down".to_string()))
    }

    /// Queue an aggregate computation job, delayed by the configured interval
    pub fn enqueue_aggregates(&self, job: ComputeAggregatesJob) -> Result<()> {
        tracing::info!(import_run_id = %job.import_run_id, "Queued aggregate computation job");
        self.aggregate_tx
            .send(DelayedJob {
                job,
                run_at: Instant::now() + self.aggregate_delay,
            })
            .map_err(|_| Error::Internal("Aggregate queue is shut down".to_string()))
    }

    /// Close the queues and wait for the workers to drain and exit
    pub async fn shutdown(self) {
        drop(self.import_tx);
        drop(self.aggregate_tx);
        for worker in self.workers {
            if let Err(err) = worker.await {
                tracing::error!(error = %err, "Queue worker panicked");
            }
        }
    }
}

async fn run_import_worker(
    mut rx: mpsc::UnboundedReceiver<ProcessImportJob>,
    processor: ImportProcessor,
    max_attempts: u32,
    backoff_ms: u64,
) {
    while let Some(job) = rx.recv().await {
        let mut attempt = 1u32;
        loop {
            let final_attempt = attempt >= max_attempts;
            match processor.process(&job, final_attempt).await {
                Ok(()) => break,
                Err(err) if final_attempt => {
                    tracing::error!(
                        import_run_id = %job.import_run_id,
                        attempt,
                        error = %err,
                        "Import job failed permanently"
                    );
                    break;
                }
                Err(err) => {
                    let backoff = backoff_ms * 2u64.pow(attempt - 1);
                    tracing::warn!(
                        import_run_id = %job.import_run_id,
                        attempt,
                        backoff_ms = backoff,
                        error = %err,
                        "Import job failed, will retry"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
            }
        }
    }
    tracing::debug!("Import queue worker exiting");
}

async fn run_aggregate_worker(
    mut rx: mpsc::UnboundedReceiver<DelayedJob<ComputeAggregatesJob>>,
    processor: AggregateProcessor,
    max_attempts: u32,
    backoff_ms: u64,
) {
    while let Some(delayed) = rx.recv().await {
        tokio::time::sleep_until(delayed.run_at).await;
        let job = delayed.job;

        let mut attempt = 1u32;
        loop {
            match processor.process(&job).await {
                Ok(()) => break,
                Err(err) if attempt >= max_attempts => {
                    tracing::error!(
                        import_run_id = %job.import_run_id,
                        attempt,
                        error = %err,
                        "Aggregate job failed permanently"
                    );
                    break;
                }
                Err(err) => {
                    let backoff = backoff_ms * 2u64.pow(attempt - 1);
                    tracing::warn!(
                        import_run_id = %job.import_run_id,
                        attempt,
                        backoff_ms = backoff,
                        error = %err,
                        "Aggregate job failed, will retry"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
            }
        }
    }
    tracing::debug!("Aggregate queue worker exiting");
}
