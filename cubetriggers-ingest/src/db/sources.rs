//! Source (provenance bucket) operations

use chrono::Utc;
use cubetriggers_common::db::models::Source;
use cubetriggers_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};

/// Upsert a source by name
///
/// First import referencing a new name creates the row; a re-import with
/// the same name overwrites description/URL. Sources are never deleted by
/// the core.
pub async fn upsert_source(
    pool: &SqlitePool,
    name: &str,
    description: Option<&str>,
    url: Option<&str>,
) -> Result<Source> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO sources (id, name, description, url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET
            description = excluded.description,
            url = excluded.url,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(description)
    .bind(url)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get_source_by_name(pool, name)
        .await?
        .ok_or_else(|| Error::Internal(format!("Source '{}' vanished after upsert", name)))
}

/// Fetch a source by its unique name
pub async fn get_source_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Source>> {
    let row = sqlx::query(
        "SELECT id, name, description, url, created_at, updated_at FROM sources WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.map(decode_source).transpose()
}

/// All known source ids, for the aggregate dimension cross-product
pub async fn list_source_ids(pool: &SqlitePool) -> Result<Vec<Uuid>> {
    let rows = sqlx::query("SELECT id FROM sources ORDER BY name")
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| parse_uuid(&row.get::<String, _>("id")))
        .collect()
}

fn decode_source(row: sqlx::sqlite::SqliteRow) -> Result<Source> {
    Ok(Source {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        name: row.get("name"),
        description: row.get("description"),
        url: row.get("url"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}
