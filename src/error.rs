//! Per-item failure reporting shared by batch operations
//!
//! Batch operations (bulk inserts, similarity batches, pipeline steps) never
//! abort on a single bad item. Each failure is recorded here and the batch
//! carries on.

use serde::Serialize;

/// Failure category for a single item in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Content or node lookup missed
    NotFound,
    /// Embedding or extraction call failed
    Computation,
    /// Store write or read failed
    Persistence,
    /// Input rejected before any work was done
    Validation,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::NotFound => "not_found",
            FailureKind::Computation => "computation",
            FailureKind::Persistence => "persistence",
            FailureKind::Validation => "validation",
        };
        f.write_str(s)
    }
}

/// One failed item within a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    /// Identifier of the failed item (content id, or "a|b" for pairs)
    pub id: String,
    pub kind: FailureKind,
    pub message: String,
}

impl ItemFailure {
    pub fn new(id: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            message: message.into(),
        }
    }
}
