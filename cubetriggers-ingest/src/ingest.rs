//! Import entry point
//!
//! The "triggering request": upserts the source, creates the PENDING
//! run, and schedules both background jobs. Everything after this point
//! happens on the queue workers.

use cubetriggers_common::db::models::ImportRun;
use cubetriggers_common::Result;
use sqlx::SqlitePool;

use crate::db::{import_runs, sources};
use crate::jobs::{ComputeAggregatesJob, JobQueue, ProcessImportJob};

/// Parameters for starting an algorithm import
#[derive(Debug, Clone)]
pub struct StartImportRequest {
    /// Source name; the upsert key
    pub source_name: String,
    pub source_url: Option<String>,
    pub description: Option<String>,
    /// Raw text containing algorithms, one per line
    pub algorithms_text: String,
}

/// Start importing algorithms from text
///
/// Returns the PENDING run immediately; progress and completion arrive on
/// the event bus. The aggregate job is scheduled alongside the import job
/// with the configured delay rather than on an explicit completion
/// signal.
pub async fn start_import(
    pool: &SqlitePool,
    queue: &JobQueue,
    request: StartImportRequest,
) -> Result<ImportRun> {
    let source = sources::upsert_source(
        pool,
        &request.source_name,
        request.description.as_deref(),
        request.source_url.as_deref(),
    )
    .await?;

    let run = ImportRun::new(source.id);
    import_runs::save_run(pool, &run).await?;

    tracing::info!(
        import_run_id = %run.id,
        source = %source.name,
        "Created import run"
    );

    queue.enqueue_import(ProcessImportJob {
        import_run_id: run.id,
        source_id: source.id,
        algorithms_text: request.algorithms_text,
    })?;

    queue.enqueue_aggregates(ComputeAggregatesJob {
        import_run_id: run.id,
    })?;

    Ok(run)
}
