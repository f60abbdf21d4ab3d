//! Storage operations for the import pipeline
//!
//! Thin sqlx repositories over the shared schema. The only mutation
//! discipline for canonical rows (sources, algorithms, ngrams) is
//! idempotent upsert by unique key; nothing here assumes exclusive
//! ownership of those tables across concurrent jobs.

pub mod aggregates;
pub mod algorithms;
pub mod import_runs;
pub mod ngrams;
pub mod retry;
pub mod sources;

pub use retry::retry_on_lock;

use chrono::{DateTime, Utc};
use cubetriggers_common::{Error, Result};
use uuid::Uuid;

/// Decode a TEXT uuid column value
pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Malformed uuid in store: {}", e)))
}

/// Decode an RFC3339 TEXT timestamp column value
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Malformed timestamp in store: {}", e)))
}
