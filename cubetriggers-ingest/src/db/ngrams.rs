//! Canonical ngram (trigger) and occurrence operations

use chrono::Utc;
use cubetriggers_common::db::models::Ngram;
use cubetriggers_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};

/// Insert-if-absent upsert of a canonical ngram by its move text
///
/// Same dedup rule as algorithms; returns whether this call created the
/// row (the per-run new-trigger counter is built from this flag).
pub async fn find_or_create_ngram(
    pool: &SqlitePool,
    moves: &str,
    length: usize,
) -> Result<(Ngram, bool)> {
    let result = sqlx::query(
        r#"
        INSERT INTO ngrams (id, moves, length, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(moves) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(moves)
    .bind(length as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    let created = result.rows_affected() > 0;

    let row = sqlx::query("SELECT id, moves, length, created_at FROM ngrams WHERE moves = ?")
        .bind(moves)
        .fetch_one(pool)
        .await?;

    let ngram = Ngram {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        moves: row.get("moves"),
        length: row.get::<i64, _>("length") as usize,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    };

    Ok((ngram, created))
}

/// Insert-if-absent upsert of one (ngram, algorithm, position) occurrence
///
/// `position` is the byte offset of the sub-sequence's first match in the
/// algorithm's canonical text; a sub-sequence repeating inside one
/// algorithm collapses to this single first-position row. Re-importing
/// the same algorithm hits the unique key and is a no-op.
pub async fn upsert_occurrence(
    pool: &SqlitePool,
    ngram_id: Uuid,
    algorithm_id: Uuid,
    position: usize,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ngram_occurrences (id, ngram_id, algorithm_id, position)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(ngram_id, algorithm_id, position) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(ngram_id.to_string())
    .bind(algorithm_id.to_string())
    .bind(position as i64)
    .execute(pool)
    .await?;

    Ok(())
}

/// Occurrence (algorithm_id, position) pairs for one ngram (test/inspection helper)
pub async fn occurrences_for_ngram(
    pool: &SqlitePool,
    ngram_id: Uuid,
) -> Result<Vec<(Uuid, usize)>> {
    let rows = sqlx::query(
        "SELECT algorithm_id, position FROM ngram_occurrences
         WHERE ngram_id = ? ORDER BY algorithm_id, position",
    )
    .bind(ngram_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok((
                parse_uuid(&row.get::<String, _>("algorithm_id"))?,
                row.get::<i64, _>("position") as usize,
            ))
        })
        .collect()
}

/// Fetch a canonical ngram by its move text
pub async fn get_ngram_by_moves(pool: &SqlitePool, moves: &str) -> Result<Option<Ngram>> {
    let row = sqlx::query("SELECT id, moves, length, created_at FROM ngrams WHERE moves = ?")
        .bind(moves)
        .fetch_optional(pool)
        .await?;

    row.map(|row| {
        Ok(Ngram {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            moves: row.get("moves"),
            length: row.get::<i64, _>("length") as usize,
            created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        })
    })
    .transpose()
}
