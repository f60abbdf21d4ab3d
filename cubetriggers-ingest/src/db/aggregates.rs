//! NgramAggregate recomputation queries and the trigger ranking query
//!
//! A NULL in the alg_type/source_id columns means "all values of that
//! dimension". SQLite treats NULLs as distinct under UNIQUE, so the
//! aggregate upsert uses an IS-based lookup instead of ON CONFLICT.

use chrono::Utc;
use cubetriggers_common::db::models::NgramAggregate;
use cubetriggers_common::{AlgType, Result};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};

/// Ngrams touched by one import, found by joining occurrences back to the
/// run's algorithm occurrences
pub async fn affected_ngram_ids(pool: &SqlitePool, import_run_id: Uuid) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT n.id
        FROM ngrams n
        JOIN ngram_occurrences no ON no.ngram_id = n.id
        JOIN algorithm_occurrences ao ON ao.algorithm_id = no.algorithm_id
        WHERE ao.import_run_id = ?
        "#,
    )
    .bind(import_run_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| parse_uuid(&row.get::<String, _>("id")))
        .collect()
}

/// Recompute and upsert the aggregate row for one dimension key
///
/// The occurrence filter keeps a NgramOccurrence when its owning
/// algorithm has at least one AlgorithmOccurrence matching the
/// category/source constraint; a fully unconstrained key counts every
/// occurrence. Always a full recomputation, so re-running for the same
/// import is idempotent.
pub async fn recompute_aggregate(
    pool: &SqlitePool,
    ngram_id: Uuid,
    alg_type: Option<AlgType>,
    source_id: Option<Uuid>,
) -> Result<NgramAggregate> {
    let ngram = ngram_id.to_string();
    let at = alg_type.map(|t| t.as_str().to_string());
    let src = source_id.map(|s| s.to_string());

    let total_occurrences: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM ngram_occurrences no
        WHERE no.ngram_id = ?
          AND ((? IS NULL AND ? IS NULL) OR EXISTS (
              SELECT 1 FROM algorithm_occurrences ao
              WHERE ao.algorithm_id = no.algorithm_id
                AND (? IS NULL OR ao.alg_type = ?)
                AND (? IS NULL OR ao.source_id = ?)))
        "#,
    )
    .bind(&ngram)
    .bind(&at)
    .bind(&src)
    .bind(&at)
    .bind(&at)
    .bind(&src)
    .bind(&src)
    .fetch_one(pool)
    .await?;

    let algorithm_coverage: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT no.algorithm_id)
        FROM ngram_occurrences no
        WHERE no.ngram_id = ?
          AND ((? IS NULL AND ? IS NULL) OR EXISTS (
              SELECT 1 FROM algorithm_occurrences ao
              WHERE ao.algorithm_id = no.algorithm_id
                AND (? IS NULL OR ao.alg_type = ?)
                AND (? IS NULL OR ao.source_id = ?)))
        "#,
    )
    .bind(&ngram)
    .bind(&at)
    .bind(&src)
    .bind(&at)
    .bind(&at)
    .bind(&src)
    .bind(&src)
    .fetch_one(pool)
    .await?;

    let source_coverage: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT ao.source_id)
        FROM ngram_occurrences no
        JOIN algorithm_occurrences ao ON ao.algorithm_id = no.algorithm_id
        WHERE no.ngram_id = ?
          AND (? IS NULL OR ao.alg_type = ?)
          AND (? IS NULL OR ao.source_id = ?)
        "#,
    )
    .bind(&ngram)
    .bind(&at)
    .bind(&at)
    .bind(&src)
    .bind(&src)
    .fetch_one(pool)
    .await?;

    let aggregate = NgramAggregate {
        id: Uuid::new_v4(),
        ngram_id,
        alg_type,
        source_id,
        total_occurrences: total_occurrences as usize,
        algorithm_coverage: algorithm_coverage as usize,
        source_coverage: source_coverage as usize,
        updated_at: Utc::now(),
    };

    upsert_aggregate(pool, &aggregate).await?;
    Ok(aggregate)
}

/// Upsert an aggregate row keyed by (ngram, alg_type-or-null, source-or-null)
async fn upsert_aggregate(pool: &SqlitePool, aggregate: &NgramAggregate) -> Result<()> {
    let at = aggregate.alg_type.map(|t| t.as_str().to_string());
    let src = aggregate.source_id.map(|s| s.to_string());

    let existing: Option<String> = sqlx::query_scalar(
        "SELECT id FROM ngram_aggregates
         WHERE ngram_id = ? AND alg_type IS ? AND source_id IS ?",
    )
    .bind(aggregate.ngram_id.to_string())
    .bind(&at)
    .bind(&src)
    .fetch_optional(pool)
    .await?;

    match existing {
        Some(id) => {
            sqlx::query(
                "UPDATE ngram_aggregates
                 SET total_occurrences = ?, algorithm_coverage = ?, source_coverage = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(aggregate.total_occurrences as i64)
            .bind(aggregate.algorithm_coverage as i64)
            .bind(aggregate.source_coverage as i64)
            .bind(aggregate.updated_at.to_rfc3339())
            .bind(id)
            .execute(pool)
            .await?;
        }
        None => {
            sqlx::query(
                r#"
                INSERT INTO ngram_aggregates
                    (id, ngram_id, alg_type, source_id,
                     total_occurrences, algorithm_coverage, source_coverage, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(aggregate.id.to_string())
            .bind(aggregate.ngram_id.to_string())
            .bind(&at)
            .bind(&src)
            .bind(aggregate.total_occurrences as i64)
            .bind(aggregate.algorithm_coverage as i64)
            .bind(aggregate.source_coverage as i64)
            .bind(aggregate.updated_at.to_rfc3339())
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

/// Load one aggregate row by dimension key
pub async fn get_aggregate(
    pool: &SqlitePool,
    ngram_id: Uuid,
    alg_type: Option<AlgType>,
    source_id: Option<Uuid>,
) -> Result<Option<NgramAggregate>> {
    let row = sqlx::query(
        r#"
        SELECT id, ngram_id, alg_type, source_id,
               total_occurrences, algorithm_coverage, source_coverage, updated_at
        FROM ngram_aggregates
        WHERE ngram_id = ? AND alg_type IS ? AND source_id IS ?
        "#,
    )
    .bind(ngram_id.to_string())
    .bind(alg_type.map(|t| t.as_str().to_string()))
    .bind(source_id.map(|s| s.to_string()))
    .fetch_optional(pool)
    .await?;

    row.map(decode_aggregate).transpose()
}

/// Filters for the trigger ranking query
#[derive(Debug, Clone, Default)]
pub struct TriggerFilters {
    /// Trigger length in moves
    pub length: Option<usize>,
    pub alg_type: Option<AlgType>,
    pub source_id: Option<Uuid>,
    /// Minimum total occurrences; floored at 1 so empty aggregates never rank
    pub min_occurrences: Option<usize>,
}

/// One ranked trigger with its aggregate statistics
#[derive(Debug, Clone)]
pub struct TriggerStat {
    pub moves: String,
    pub length: usize,
    pub aggregate: NgramAggregate,
}

/// Most common triggers under the given filters
///
/// Filter-to-key resolution: each absent dimension filter selects the
/// NULL ("all") side of the aggregate key, never a sum across rows. An
/// unfiltered query therefore reads only the all/all wildcard rows.
pub async fn top_triggers(
    pool: &SqlitePool,
    filters: &TriggerFilters,
    limit: usize,
) -> Result<Vec<TriggerStat>> {
    let at = filters.alg_type.map(|t| t.as_str().to_string());
    let src = filters.source_id.map(|s| s.to_string());
    let min_occurrences = filters.min_occurrences.unwrap_or(1).max(1) as i64;
    let length = filters.length.map(|l| l as i64);

    let rows = sqlx::query(
        r#"
        SELECT a.id, a.ngram_id, a.alg_type, a.source_id,
               a.total_occurrences, a.algorithm_coverage, a.source_coverage, a.updated_at,
               n.moves, n.length
        FROM ngram_aggregates a
        JOIN ngrams n ON n.id = a.ngram_id
        WHERE a.alg_type IS ? AND a.source_id IS ?
          AND a.total_occurrences >= ?
          AND (? IS NULL OR n.length = ?)
        ORDER BY a.total_occurrences DESC, n.moves ASC
        LIMIT ?
        "#,
    )
    .bind(&at)
    .bind(&src)
    .bind(min_occurrences)
    .bind(length)
    .bind(length)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let moves: String = row.get("moves");
            let length = row.get::<i64, _>("length") as usize;
            Ok(TriggerStat {
                moves,
                length,
                aggregate: decode_aggregate(row)?,
            })
        })
        .collect()
}

fn decode_aggregate(row: sqlx::sqlite::SqliteRow) -> Result<NgramAggregate> {
    let alg_type: Option<String> = row.get("alg_type");
    let source_id: Option<String> = row.get("source_id");

    Ok(NgramAggregate {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        ngram_id: parse_uuid(&row.get::<String, _>("ngram_id"))?,
        alg_type: alg_type.as_deref().map(AlgType::from_str).transpose()?,
        source_id: source_id.as_deref().map(parse_uuid).transpose()?,
        total_occurrences: row.get::<i64, _>("total_occurrences") as usize,
        algorithm_coverage: row.get::<i64, _>("algorithm_coverage") as usize,
        source_coverage: row.get::<i64, _>("source_coverage") as usize,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}
