//! Database access for the CubeTriggers core
//!
//! SQLite via sqlx. UUIDs are stored as TEXT, timestamps as RFC3339 TEXT.

pub mod models;

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Opens (creating if missing) the database file and bootstraps the schema.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create core tables if they don't exist
///
/// The unique constraints here are load-bearing: canonical dedup of
/// algorithms and ngrams, and idempotent re-import of occurrences, rest
/// entirely on them (concurrent imports may race on the same canonical
/// text and must converge to one row).
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_runs (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL REFERENCES sources(id),
            status TEXT NOT NULL,
            total_algorithms INTEGER NOT NULL DEFAULT 0,
            processed_algorithms INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            started_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS algorithms (
            id TEXT PRIMARY KEY,
            normalized_moves TEXT NOT NULL UNIQUE,
            move_count INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS algorithm_occurrences (
            id TEXT PRIMARY KEY,
            algorithm_id TEXT NOT NULL REFERENCES algorithms(id),
            source_id TEXT NOT NULL REFERENCES sources(id),
            import_run_id TEXT NOT NULL REFERENCES import_runs(id),
            alg_type TEXT NOT NULL,
            original_moves TEXT NOT NULL,
            case_name TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ngrams (
            id TEXT PRIMARY KEY,
            moves TEXT NOT NULL UNIQUE,
            length INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ngram_occurrences (
            id TEXT PRIMARY KEY,
            ngram_id TEXT NOT NULL REFERENCES ngrams(id),
            algorithm_id TEXT NOT NULL REFERENCES algorithms(id),
            position INTEGER NOT NULL,
            UNIQUE (ngram_id, algorithm_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // alg_type / source_id may be NULL ("all values of that dimension").
    // SQLite treats NULLs as distinct in UNIQUE constraints, so aggregate
    // upserts go through an IS-based lookup instead of ON CONFLICT.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ngram_aggregates (
            id TEXT PRIMARY KEY,
            ngram_id TEXT NOT NULL REFERENCES ngrams(id),
            alg_type TEXT,
            source_id TEXT,
            total_occurrences INTEGER NOT NULL DEFAULT 0,
            algorithm_coverage INTEGER NOT NULL DEFAULT 0,
            source_coverage INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_algorithm_occurrences_import_run
         ON algorithm_occurrences(import_run_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_algorithm_occurrences_algorithm
         ON algorithm_occurrences(algorithm_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_ngram_occurrences_ngram
         ON ngram_occurrences(ngram_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_ngram_aggregates_lookup
         ON ngram_aggregates(ngram_id, alg_type, source_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized");

    Ok(())
}
