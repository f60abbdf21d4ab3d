//! Import run persistence
//!
//! The ImportRun state machine lives on the model
//! (`cubetriggers_common::db::models::ImportRun`); this module only moves
//! it in and out of the store. The orchestrator is the sole writer after
//! creation.

use cubetriggers_common::db::models::ImportRun;
use cubetriggers_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};

/// Persist a run, inserting or overwriting its mutable fields
pub async fn save_run(pool: &SqlitePool, run: &ImportRun) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO import_runs
            (id, source_id, status, total_algorithms, processed_algorithms,
             error_message, started_at, ended_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            total_algorithms = excluded.total_algorithms,
            processed_algorithms = excluded.processed_algorithms,
            error_message = excluded.error_message,
            ended_at = excluded.ended_at
        "#,
    )
    .bind(run.id.to_string())
    .bind(run.source_id.to_string())
    .bind(run.status.as_str())
    .bind(run.total_algorithms as i64)
    .bind(run.processed_algorithms as i64)
    .bind(run.error_message.as_deref())
    .bind(run.started_at.to_rfc3339())
    .bind(run.ended_at.map(|dt| dt.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a run by id
pub async fn load_run(pool: &SqlitePool, run_id: Uuid) -> Result<Option<ImportRun>> {
    let row = sqlx::query(
        r#"
        SELECT id, source_id, status, total_algorithms, processed_algorithms,
               error_message, started_at, ended_at
        FROM import_runs
        WHERE id = ?
        "#,
    )
    .bind(run_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(decode_run).transpose()
}

/// Load a run, failing when it does not exist
pub async fn require_run(pool: &SqlitePool, run_id: Uuid) -> Result<ImportRun> {
    load_run(pool, run_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Import run {}", run_id)))
}

/// Most recent runs for one source, newest first
pub async fn recent_runs_for_source(
    pool: &SqlitePool,
    source_id: Uuid,
    limit: usize,
) -> Result<Vec<ImportRun>> {
    let rows = sqlx::query(
        r#"
        SELECT id, source_id, status, total_algorithms, processed_algorithms,
               error_message, started_at, ended_at
        FROM import_runs
        WHERE source_id = ?
        ORDER BY started_at DESC
        LIMIT ?
        "#,
    )
    .bind(source_id.to_string())
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(decode_run).collect()
}

fn decode_run(row: sqlx::sqlite::SqliteRow) -> Result<ImportRun> {
    let status: String = row.get("status");
    let ended_at: Option<String> = row.get("ended_at");

    Ok(ImportRun {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        source_id: parse_uuid(&row.get::<String, _>("source_id"))?,
        status: cubetriggers_common::ImportStatus::from_str(&status)?,
        total_algorithms: row.get::<i64, _>("total_algorithms") as usize,
        processed_algorithms: row.get::<i64, _>("processed_algorithms") as usize,
        error_message: row.get("error_message"),
        started_at: parse_timestamp(&row.get::<String, _>("started_at"))?,
        ended_at: ended_at.as_deref().map(parse_timestamp).transpose()?,
    })
}
