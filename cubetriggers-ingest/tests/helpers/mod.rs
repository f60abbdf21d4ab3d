//! Shared test helpers: in-memory database and import driving

#![allow(dead_code)]

use cubetriggers_common::config::Config;
use cubetriggers_common::db::models::{ImportRun, Source};
use cubetriggers_common::events::EventBus;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use cubetriggers_ingest::db::{import_runs, sources};
use cubetriggers_ingest::jobs::{ImportProcessor, ProcessImportJob};

/// In-memory database with the full schema
///
/// A single connection, so every statement sees the same memory database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    cubetriggers_common::db::init_tables(&pool)
        .await
        .expect("schema bootstrap");
    pool
}

/// Config tuned for tests: short triggers, per-algorithm progress, fast retries
pub fn test_config() -> Config {
    Config {
        ngram_min_length: 2,
        ngram_max_length: 3,
        progress_batch_size: 1,
        aggregate_delay_ms: 25,
        import_backoff_ms: 1,
        aggregate_backoff_ms: 1,
        ..Config::default()
    }
}

/// Create a source and a PENDING run for it
pub async fn create_pending_run(pool: &SqlitePool, source_name: &str) -> (Source, ImportRun) {
    let source = sources::upsert_source(pool, source_name, None, None)
        .await
        .expect("source upsert");
    let run = ImportRun::new(source.id);
    import_runs::save_run(pool, &run).await.expect("run save");
    (source, run)
}

/// Drive one import to its terminal state through the orchestrator
pub async fn run_import(
    pool: &SqlitePool,
    event_bus: &EventBus,
    config: Config,
    source_name: &str,
    text: &str,
) -> ImportRun {
    let (source, run) = create_pending_run(pool, source_name).await;

    let processor = ImportProcessor::new(pool.clone(), event_bus.clone(), config);
    processor
        .process(
            &ProcessImportJob {
                import_run_id: run.id,
                source_id: source.id,
                algorithms_text: text.to_string(),
            },
            true,
        )
        .await
        .expect("import succeeds");

    import_runs::require_run(pool, run.id).await.expect("run reloads")
}
