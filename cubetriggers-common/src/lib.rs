//! # CubeTriggers Common Library
//!
//! Shared code for the CubeTriggers analytical core:
//! - Domain enums (AlgType, ImportStatus)
//! - Database schema bootstrap and row models
//! - Event types (TriggerEvent) and EventBus
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use types::{AlgType, ImportStatus};
