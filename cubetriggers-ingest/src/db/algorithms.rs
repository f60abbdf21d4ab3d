//! Canonical algorithm and occurrence operations

use chrono::Utc;
use cubetriggers_common::db::models::{Algorithm, AlgorithmOccurrence};
use cubetriggers_common::{AlgType, Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};

/// Insert-if-absent upsert of a canonical algorithm by its normalized text
///
/// An existing row is left untouched (canonical rows are immutable after
/// creation). Returns the row plus whether this call created it; the
/// unique constraint makes concurrent racing inserts of the same text
/// converge to one row.
pub async fn find_or_create_algorithm(
    pool: &SqlitePool,
    normalized_moves: &str,
    move_count: usize,
) -> Result<(Algorithm, bool)> {
    let result = sqlx::query(
        r#"
        INSERT INTO algorithms (id, normalized_moves, move_count, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(normalized_moves) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(normalized_moves)
    .bind(move_count as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    let created = result.rows_affected() > 0;

    let row = sqlx::query(
        "SELECT id, normalized_moves, move_count, created_at FROM algorithms
         WHERE normalized_moves = ?",
    )
    .bind(normalized_moves)
    .fetch_one(pool)
    .await?;

    let algorithm = Algorithm {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        normalized_moves: row.get("normalized_moves"),
        move_count: row.get::<i64, _>("move_count") as usize,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    };

    Ok((algorithm, created))
}

/// Record one appearance of an algorithm in one import (immutable)
pub async fn create_occurrence(
    pool: &SqlitePool,
    algorithm_id: Uuid,
    source_id: Uuid,
    import_run_id: Uuid,
    alg_type: AlgType,
    original_moves: &str,
    case_name: Option<&str>,
) -> Result<AlgorithmOccurrence> {
    let occurrence = AlgorithmOccurrence {
        id: Uuid::new_v4(),
        algorithm_id,
        source_id,
        import_run_id,
        alg_type,
        original_moves: original_moves.to_string(),
        case_name: case_name.map(str::to_string),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO algorithm_occurrences
            (id, algorithm_id, source_id, import_run_id, alg_type, original_moves, case_name, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(occurrence.id.to_string())
    .bind(occurrence.algorithm_id.to_string())
    .bind(occurrence.source_id.to_string())
    .bind(occurrence.import_run_id.to_string())
    .bind(occurrence.alg_type.as_str())
    .bind(&occurrence.original_moves)
    .bind(occurrence.case_name.as_deref())
    .bind(occurrence.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(occurrence)
}

/// Count provenance rows for one algorithm (test/inspection helper)
pub async fn count_occurrences(pool: &SqlitePool, algorithm_id: Uuid) -> Result<usize> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM algorithm_occurrences WHERE algorithm_id = ?")
            .bind(algorithm_id.to_string())
            .fetch_one(pool)
            .await?;
    Ok(count as usize)
}

/// Fetch a canonical algorithm by its normalized text
pub async fn get_algorithm_by_moves(
    pool: &SqlitePool,
    normalized_moves: &str,
) -> Result<Algorithm> {
    let row = sqlx::query(
        "SELECT id, normalized_moves, move_count, created_at FROM algorithms
         WHERE normalized_moves = ?",
    )
    .bind(normalized_moves)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Algorithm '{}'", normalized_moves)))?;

    Ok(Algorithm {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        normalized_moves: row.get("normalized_moves"),
        move_count: row.get::<i64, _>("move_count") as usize,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}
