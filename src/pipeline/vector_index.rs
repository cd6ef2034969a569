//! Vector index collaborator
//!
//! Points are keyed by a caller-chosen UUID, so upserting the same id twice
//! replaces the stored vector instead of adding a second point.

use crate::graph::Metadata;
use crate::similarity::cosine_similarity;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use uuid::Uuid;

/// Errors from a vector index backend
#[derive(Debug, Error)]
pub enum VectorIndexError {
    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("vector index backend error: {0}")]
    Backend(String),
}

/// A stored vector and its payload
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: Metadata,
}

/// Trait for storing and querying embedding vectors
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the point with this id
    fn upsert(&self, id: Uuid, vector: Vec<f32>, payload: Metadata) -> Result<(), VectorIndexError>;

    fn retrieve(&self, id: &Uuid) -> Result<Option<VectorPoint>, VectorIndexError>;

    /// Nearest points by cosine similarity, best first
    fn search(&self, query: &[f32], limit: usize) -> Result<Vec<(Uuid, f32)>, VectorIndexError>;
}

/// In-memory vector index
///
/// Thread-safe via RwLock; search is a linear cosine scan.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    points: RwLock<HashMap<Uuid, VectorPoint>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> VectorIndexError {
    VectorIndexError::Backend("vector index lock poisoned".to_string())
}

impl VectorIndex for InMemoryVectorIndex {
    fn upsert(&self, id: Uuid, vector: Vec<f32>, payload: Metadata) -> Result<(), VectorIndexError> {
        let mut points = self.points.write().map_err(|_| poisoned())?;
        if let Some(dim) = points.values().next().map(|p| p.vector.len()) {
            if dim != vector.len() {
                return Err(VectorIndexError::DimensionMismatch {
                    expected: dim,
                    got: vector.len(),
                });
            }
        }
        points.insert(id, VectorPoint { id, vector, payload });
        Ok(())
    }

    fn retrieve(&self, id: &Uuid) -> Result<Option<VectorPoint>, VectorIndexError> {
        Ok(self.points.read().map_err(|_| poisoned())?.get(id).cloned())
    }

    fn search(&self, query: &[f32], limit: usize) -> Result<Vec<(Uuid, f32)>, VectorIndexError> {
        let points = self.points.read().map_err(|_| poisoned())?;
        let mut scored: Vec<(Uuid, f32)> = points
            .values()
            .map(|p| (p.id, cosine_similarity(query, &p.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(limit);
        Ok(scored)
    }
}
