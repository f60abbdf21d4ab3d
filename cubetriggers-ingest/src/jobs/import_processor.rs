//! Import orchestration
//!
//! Consumes one import job: parses the raw text, persists canonical
//! algorithms + provenance, extracts and persists triggers, and drives
//! the ImportRun state machine while broadcasting progress.

use cubetriggers_common::config::Config;
use cubetriggers_common::db::models::ImportRun;
use cubetriggers_common::events::{EventBus, TriggerEvent};
use cubetriggers_common::{Error, ImportStatus, Result};
use sqlx::SqlitePool;

use crate::db::{algorithms, import_runs, ngrams, retry_on_lock};
use crate::jobs::ProcessImportJob;
use crate::parser::{self, ParsedAlgorithm};

/// Percentage shown while a run is processing
///
/// Parsing and setup occupy the first 5%; processing maps onto the
/// remaining 90% as floor(processed/total * 90) + 5.
pub fn progress_percentage(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 5;
    }
    (processed * 90 / total + 5) as u8
}

/// Import orchestrator for one queue worker
pub struct ImportProcessor {
    db: SqlitePool,
    event_bus: EventBus,
    config: Config,
}

impl ImportProcessor {
    pub fn new(db: SqlitePool, event_bus: EventBus, config: Config) -> Self {
        Self {
            db,
            event_bus,
            config,
        }
    }

    /// Process one import job
    ///
    /// Individual line-parse rejections are not failures; any other error
    /// fails the whole run and is returned to the queue runner so its
    /// retry policy can act. `final_attempt` controls whether a failure
    /// is recorded as the run's terminal FAILED state (earlier attempts
    /// leave the run in PROCESSING for the redelivery to re-enter).
    pub async fn process(&self, job: &ProcessImportJob, final_attempt: bool) -> Result<()> {
        tracing::info!(
            import_run_id = %job.import_run_id,
            source_id = %job.source_id,
            "Processing import"
        );

        match self.run_import(job).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.handle_failure(job, &err, final_attempt).await;
                Err(err)
            }
        }
    }

    async fn run_import(&self, job: &ProcessImportJob) -> Result<()> {
        let mut run = import_runs::require_run(&self.db, job.import_run_id).await?;

        run.transition_to(ImportStatus::Processing)?;
        import_runs::save_run(&self.db, &run).await?;
        self.emit_progress(&run, None, "Parsing algorithms...".to_string());

        let parsed = parser::parse_algorithms_text(&job.algorithms_text);
        run.total_algorithms = parsed.len();
        import_runs::save_run(&self.db, &run).await?;

        tracing::info!(
            import_run_id = %run.id,
            algorithms = parsed.len(),
            "Parsed import text"
        );

        let mut new_triggers_count = 0;

        for parsed_alg in &parsed {
            new_triggers_count += self.persist_algorithm(job, parsed_alg).await?;
            run.processed_algorithms += 1;

            // Progress is persisted and broadcast in batches, not per
            // algorithm, to keep write traffic bounded
            if run.processed_algorithms % self.config.progress_batch_size == 0 {
                import_runs::save_run(&self.db, &run).await?;
                self.emit_progress(
                    &run,
                    Some(parsed_alg.original_moves.clone()),
                    format!(
                        "Processing algorithm {}/{}",
                        run.processed_algorithms, run.total_algorithms
                    ),
                );
            }
        }

        run.transition_to(ImportStatus::Completed)?;
        import_runs::save_run(&self.db, &run).await?;

        tracing::info!(
            import_run_id = %run.id,
            processed = run.processed_algorithms,
            new_triggers = new_triggers_count,
            duration_ms = run.duration_ms(),
            "Import completed"
        );

        self.event_bus.emit_lossy(TriggerEvent::ImportCompleted {
            import_run_id: run.id,
            total_algorithms: run.total_algorithms,
            processed_algorithms: run.processed_algorithms,
            new_triggers_count,
            duration_ms: run.duration_ms(),
            timestamp: chrono::Utc::now(),
        });

        Ok(())
    }

    /// Persist one parsed algorithm and its triggers
    ///
    /// Returns the number of canonical Ngram rows created for the first
    /// time. Each storage call is individually retried on SQLite lock
    /// contention; every statement here is either idempotent or a single
    /// insert, so statement-level retry is safe.
    async fn persist_algorithm(
        &self,
        job: &ProcessImportJob,
        parsed: &ParsedAlgorithm,
    ) -> Result<usize> {
        let max_wait_ms = self.config.database_max_lock_wait_ms;

        let (algorithm, _) = retry_on_lock("find_or_create_algorithm", max_wait_ms, || async {
            algorithms::find_or_create_algorithm(
                &self.db,
                &parsed.normalized_moves,
                parsed.move_count,
            )
            .await
        })
        .await?;

        retry_on_lock("create_algorithm_occurrence", max_wait_ms, || async {
            algorithms::create_occurrence(
                &self.db,
                algorithm.id,
                job.source_id,
                job.import_run_id,
                parsed.alg_type,
                &parsed.original_moves,
                parsed.case_name.as_deref(),
            )
            .await
        })
        .await?;

        let extracted = parser::extract_ngrams(
            &parsed.normalized_moves,
            self.config.ngram_min_length,
            self.config.ngram_max_length,
        );

        let mut new_triggers = 0;

        for moves in &extracted {
            let length = parser::normalize::count_moves(moves);

            let (ngram, created) = retry_on_lock("find_or_create_ngram", max_wait_ms, || async {
                ngrams::find_or_create_ngram(&self.db, moves, length).await
            })
            .await?;
            if created {
                new_triggers += 1;
            }

            // First match only: a window repeating later in the same
            // algorithm records no second occurrence
            let position = parsed.normalized_moves.find(moves.as_str()).ok_or_else(|| {
                Error::Internal(format!(
                    "Extracted ngram '{}' not found in its own algorithm",
                    moves
                ))
            })?;

            retry_on_lock("upsert_ngram_occurrence", max_wait_ms, || async {
                ngrams::upsert_occurrence(&self.db, ngram.id, algorithm.id, position).await
            })
            .await?;
        }

        Ok(new_triggers)
    }

    /// Record a run failure and broadcast it
    ///
    /// The failure notification goes out on every failed attempt; the
    /// terminal FAILED status + message are only written once the queue
    /// runner is out of redeliveries.
    async fn handle_failure(&self, job: &ProcessImportJob, err: &Error, final_attempt: bool) {
        tracing::error!(
            import_run_id = %job.import_run_id,
            error = %err,
            final_attempt,
            "Import failed"
        );

        let run = match import_runs::load_run(&self.db, job.import_run_id).await {
            Ok(Some(run)) => run,
            Ok(None) => {
                tracing::error!(import_run_id = %job.import_run_id, "Failed run not found in store");
                return;
            }
            Err(load_err) => {
                tracing::error!(
                    import_run_id = %job.import_run_id,
                    error = %load_err,
                    "Could not load run to record failure"
                );
                return;
            }
        };

        let mut run: ImportRun = run;

        if final_attempt && !run.is_terminal() {
            if let Err(fail_err) = run.fail(err.to_string()) {
                tracing::error!(import_run_id = %run.id, error = %fail_err, "Invalid failure transition");
            } else if let Err(save_err) = import_runs::save_run(&self.db, &run).await {
                tracing::error!(import_run_id = %run.id, error = %save_err, "Could not persist FAILED status");
            }
        }

        self.event_bus.emit_lossy(TriggerEvent::ImportFailed {
            import_run_id: run.id,
            message: err.to_string(),
            processed_algorithms: run.processed_algorithms,
            total_algorithms: run.total_algorithms,
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_progress(&self, run: &ImportRun, current_algorithm: Option<String>, status: String) {
        self.event_bus.emit_lossy(TriggerEvent::ImportProgress {
            import_run_id: run.id,
            total_algorithms: run.total_algorithms,
            processed_algorithms: run.processed_algorithms,
            current_algorithm,
            status,
            percentage: progress_percentage(run.processed_algorithms, run.total_algorithms),
            timestamp: chrono::Utc::now(),
        });
    }
}
