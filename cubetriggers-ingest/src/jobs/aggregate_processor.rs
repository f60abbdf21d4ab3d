//! Aggregate recomputation
//!
//! Consumes one aggregate job: for every ngram touched by the import,
//! recomputes occurrence statistics across the full dimension
//! cross-product ({all, each category} x {all, each known source}).
//! Correctness over efficiency: this is a full recomputation every time,
//! so re-running for the same import is idempotent and a partially failed
//! earlier attempt leaves nothing inconsistent behind.

use cubetriggers_common::events::{EventBus, TriggerEvent};
use cubetriggers_common::{AlgType, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{aggregates, import_runs, sources};
use crate::jobs::ComputeAggregatesJob;

/// Aggregate engine for one queue worker
pub struct AggregateProcessor {
    db: SqlitePool,
    event_bus: EventBus,
}

impl AggregateProcessor {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self { db, event_bus }
    }

    /// Recompute aggregates for every ngram touched by one import
    ///
    /// Runs after the import is expected to have committed; there is no
    /// explicit completion handshake with the orchestrator. Errors are
    /// returned to the queue runner for retry; no status is recorded on
    /// the aggregate side.
    pub async fn process(&self, job: &ComputeAggregatesJob) -> Result<()> {
        tracing::info!(import_run_id = %job.import_run_id, "Computing aggregates");

        let affected = aggregates::affected_ngram_ids(&self.db, job.import_run_id).await?;
        let source_ids = sources::list_source_ids(&self.db).await?;

        tracing::info!(
            import_run_id = %job.import_run_id,
            ngrams = affected.len(),
            sources = source_ids.len(),
            "Recomputing aggregate cross-product"
        );

        for ngram_id in &affected {
            self.recompute_ngram(*ngram_id, &source_ids).await?;
        }

        // The run may have failed or vanished; the update event still
        // describes whatever statistics are now committed
        let source_id = import_runs::load_run(&self.db, job.import_run_id)
            .await?
            .map(|run| run.source_id);

        self.event_bus.emit_lossy(TriggerEvent::TriggersUpdated {
            source_id,
            timestamp: chrono::Utc::now(),
        });

        tracing::info!(
            import_run_id = %job.import_run_id,
            ngrams = affected.len(),
            "Aggregate computation completed"
        );

        Ok(())
    }

    /// All dimension combinations for one ngram, wildcards included
    async fn recompute_ngram(&self, ngram_id: Uuid, source_ids: &[Uuid]) -> Result<()> {
        // Global (all categories, all sources)
        aggregates::recompute_aggregate(&self.db, ngram_id, None, None).await?;

        // Per-category, all sources
        for alg_type in AlgType::ALL {
            aggregates::recompute_aggregate(&self.db, ngram_id, Some(alg_type), None).await?;
        }

        // Per-source, and per-source-per-category
        for source_id in source_ids {
            aggregates::recompute_aggregate(&self.db, ngram_id, None, Some(*source_id)).await?;

            for alg_type in AlgType::ALL {
                aggregates::recompute_aggregate(&self.db, ngram_id, Some(alg_type), Some(*source_id))
                    .await?;
            }
        }

        Ok(())
    }
}
