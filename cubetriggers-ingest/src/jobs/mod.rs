//! Background job payloads and processors
//!
//! Two queues: import processing and aggregate computation. Payloads are
//! serializable so the transport can be swapped without touching the
//! processors; the contract is at-least-once delivery with bounded
//! retries and exponential backoff.

pub mod aggregate_processor;
pub mod import_processor;
pub mod queue;

pub use aggregate_processor::AggregateProcessor;
pub use import_processor::ImportProcessor;
pub use queue::JobQueue;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Import queue payload: one pending run plus its raw text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessImportJob {
    pub import_run_id: Uuid,
    pub source_id: Uuid,
    pub algorithms_text: String,
}

/// Aggregate queue payload: recompute statistics touched by one import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeAggregatesJob {
    pub import_run_id: Uuid,
}
