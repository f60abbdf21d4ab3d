//! Row models for the core entities
//!
//! Canonical entities (Algorithm, Ngram) are deduplicated by a unique
//! text key and never mutated after creation. Occurrence rows are the
//! provenance records; ImportRun is the per-batch state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AlgType, Error, ImportStatus, Result};

/// Provenance bucket; upserted by name on each import referencing it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Canonical deduplicated move sequence
///
/// `normalized_moves` uniquely identifies exactly one row; subsequent
/// imports of the same canonical text only add occurrences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Algorithm {
    pub id: Uuid,
    pub normalized_moves: String,
    pub move_count: usize,
    pub created_at: DateTime<Utc>,
}

/// One appearance of an algorithm in one import; immutable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmOccurrence {
    pub id: Uuid,
    pub algorithm_id: Uuid,
    pub source_id: Uuid,
    pub import_run_id: Uuid,
    /// Category at the time of this import (label text is untrusted, so
    /// the same algorithm may carry different categories across imports)
    pub alg_type: AlgType,
    pub original_moves: String,
    pub case_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Canonical contiguous sub-sequence of moves (a trigger)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ngram {
    pub id: Uuid,
    pub moves: String,
    /// Length in moves, not characters
    pub length: usize,
    pub created_at: DateTime<Utc>,
}

/// One (ngram, algorithm, position) appearance
///
/// `position` is the byte offset of the sub-sequence's first match in the
/// algorithm's canonical text. A sub-sequence repeating inside one
/// algorithm collapses to a single row at the first position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NgramOccurrence {
    pub id: Uuid,
    pub ngram_id: Uuid,
    pub algorithm_id: Uuid,
    pub position: usize,
}

/// Materialized rollup for one (ngram, category-or-all, source-or-all) key
///
/// A None dimension means "all values of that dimension"; the all/all row
/// is the global statistic. Fully recomputed after every affected import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NgramAggregate {
    pub id: Uuid,
    pub ngram_id: Uuid,
    pub alg_type: Option<AlgType>,
    pub source_id: Option<Uuid>,
    pub total_occurrences: usize,
    /// Distinct algorithms containing this ngram under the key's filter
    pub algorithm_coverage: usize,
    /// Distinct sources reachable from those algorithms' occurrences
    pub source_coverage: usize,
    pub updated_at: DateTime<Utc>,
}

/// State-machine record for one import batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRun {
    pub id: Uuid,
    pub source_id: Uuid,
    pub status: ImportStatus,
    pub total_algorithms: usize,
    pub processed_algorithms: usize,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ImportRun {
    /// Create a new run in PENDING state
    pub fn new(source_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            status: ImportStatus::Pending,
            total_algorithms: 0,
            processed_algorithms: 0,
            error_message: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new status, enforcing the state machine
    ///
    /// COMPLETED and FAILED are terminal; an attempt to leave them is an
    /// error rather than a silent overwrite. Entering PROCESSING resets
    /// the processed count; entering a terminal state stamps `ended_at`.
    pub fn transition_to(&mut self, next: ImportStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidInput(format!(
                "Invalid import run transition: {} -> {}",
                self.status, next
            )));
        }

        self.status = next;
        match next {
            ImportStatus::Processing => {
                self.processed_algorithms = 0;
            }
            ImportStatus::Completed | ImportStatus::Failed => {
                self.ended_at = Some(Utc::now());
            }
            ImportStatus::Pending => {}
        }
        Ok(())
    }

    /// Record a failure message alongside the FAILED transition
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition_to(ImportStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Whether this run has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock duration, using now() while the run is still open
    pub fn duration_ms(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_run() -> ImportRun {
        ImportRun::new(Uuid::new_v4())
    }

    #[test]
    fn run_walks_the_happy_path() {
        let mut run = pending_run();
        assert_eq!(run.status, ImportStatus::Pending);

        run.transition_to(ImportStatus::Processing).unwrap();
        assert_eq!(run.status, ImportStatus::Processing);
        assert!(run.ended_at.is_none());

        run.processed_algorithms = 7;
        run.total_algorithms = 7;
        run.transition_to(ImportStatus::Completed).unwrap();
        assert!(run.is_terminal());
        assert!(run.ended_at.is_some());
    }

    #[test]
    fn entering_processing_resets_processed_count() {
        let mut run = pending_run();
        run.processed_algorithms = 42;
        run.transition_to(ImportStatus::Processing).unwrap();
        assert_eq!(run.processed_algorithms, 0);
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut run = pending_run();
        run.transition_to(ImportStatus::Processing).unwrap();
        run.transition_to(ImportStatus::Completed).unwrap();

        assert!(run.transition_to(ImportStatus::Processing).is_err());
        assert!(run.transition_to(ImportStatus::Failed).is_err());
        assert_eq!(run.status, ImportStatus::Completed);
    }

    #[test]
    fn fail_records_message_and_end_time() {
        let mut run = pending_run();
        run.transition_to(ImportStatus::Processing).unwrap();
        run.fail("store unavailable").unwrap();

        assert_eq!(run.status, ImportStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("store unavailable"));
        assert!(run.ended_at.is_some());
    }

    #[test]
    fn pending_run_may_fail_without_processing() {
        let mut run = pending_run();
        run.fail("malformed payload").unwrap();
        assert_eq!(run.status, ImportStatus::Failed);
    }
}
