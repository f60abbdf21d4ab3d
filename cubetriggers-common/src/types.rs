//! Closed domain enums shared across the core
//!
//! These are hand-defined tagged types, converted to/from TEXT at the
//! storage boundary via `as_str`/`FromStr`. The persistence schema never
//! dictates their definition.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Algorithm category assigned from the case label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlgType {
    /// First two layers
    F2l,
    /// Orientation of the last layer
    Oll,
    /// Permutation of the last layer
    Pll,
    /// Corners of the last layer (Roux)
    Cmll,
    /// Corners + orientation of the last layer
    Coll,
    /// ZB last layer
    Zbll,
    /// Last six edges (Roux)
    Lse,
    /// No label, or label matched no keyword group
    Other,
}

impl AlgType {
    /// All categories, in classifier precedence order
    pub const ALL: [AlgType; 8] = [
        AlgType::F2l,
        AlgType::Coll,
        AlgType::Oll,
        AlgType::Pll,
        AlgType::Cmll,
        AlgType::Lse,
        AlgType::Zbll,
        AlgType::Other,
    ];

    /// Storage/wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgType::F2l => "F2L",
            AlgType::Oll => "OLL",
            AlgType::Pll => "PLL",
            AlgType::Cmll => "CMLL",
            AlgType::Coll => "COLL",
            AlgType::Zbll => "ZBLL",
            AlgType::Lse => "LSE",
            AlgType::Other => "OTHER",
        }
    }
}

impl fmt::Display for AlgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "F2L" => Ok(AlgType::F2l),
            "OLL" => Ok(AlgType::Oll),
            "PLL" => Ok(AlgType::Pll),
            "CMLL" => Ok(AlgType::Cmll),
            "COLL" => Ok(AlgType::Coll),
            "ZBLL" => Ok(AlgType::Zbll),
            "LSE" => Ok(AlgType::Lse),
            "OTHER" => Ok(AlgType::Other),
            other => Err(Error::InvalidInput(format!("Unknown algorithm type: {}", other))),
        }
    }
}

/// Import run lifecycle status
///
/// PENDING → PROCESSING → {COMPLETED | FAILED}; terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImportStatus {
    /// Created by the triggering request, not yet picked up by a worker
    Pending,
    /// Import job is running
    Processing,
    /// All parsed algorithms persisted
    Completed,
    /// Run aborted with an error message
    Failed,
}

impl ImportStatus {
    /// Storage/wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "PENDING",
            ImportStatus::Processing => "PROCESSING",
            ImportStatus::Completed => "COMPLETED",
            ImportStatus::Failed => "FAILED",
        }
    }

    /// Whether this status is terminal (no transition may leave it)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportStatus::Completed | ImportStatus::Failed)
    }

    /// Whether the state machine permits `self` → `next`
    pub fn can_transition_to(&self, next: ImportStatus) -> bool {
        match (self, next) {
            (ImportStatus::Pending, ImportStatus::Processing) => true,
            // Re-entry on job redelivery; resets the processed count
            (ImportStatus::Processing, ImportStatus::Processing) => true,
            (ImportStatus::Processing, ImportStatus::Completed) => true,
            (ImportStatus::Processing, ImportStatus::Failed) => true,
            // A run that never reached PROCESSING can still fail outright
            (ImportStatus::Pending, ImportStatus::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ImportStatus::Pending),
            "PROCESSING" => Ok(ImportStatus::Processing),
            "COMPLETED" => Ok(ImportStatus::Completed),
            "FAILED" => Ok(ImportStatus::Failed),
            other => Err(Error::InvalidInput(format!("Unknown import status: {}", other))),
        }
    }
}
