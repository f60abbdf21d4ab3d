//! cubetriggers-ingest library interface
//!
//! The analytical core of CubeTriggers: algorithm parsing and
//! normalization, trigger (n-gram) extraction, the import orchestration
//! state machine, and the aggregate recomputation engine. The binary in
//! `main.rs` wires these onto a CLI; tests drive them directly.

pub mod db;
pub mod ingest;
pub mod jobs;
pub mod parser;

pub use ingest::{start_import, StartImportRequest};
