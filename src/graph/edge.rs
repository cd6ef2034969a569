//! Edge representation: typed, weighted, directed relationships

use super::node::{Metadata, MetadataValue, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(Uuid);

impl EdgeId {
    /// Create a new random EdgeId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an EdgeId from its hyphenated string form
    pub fn parse_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Well-known relationship types
pub mod relationship {
    pub const SIMILAR_TO: &str = "similar_to";
    pub const REFERENCES: &str = "references";
    pub const FOLLOWED_BY: &str = "followed_by";
    pub const PRECEDED_BY: &str = "preceded_by";
    pub const CONCURRENT_WITH: &str = "concurrent_with";
    pub const CONTAINS_ENTITIES: &str = "contains_entities";

    /// Relationship types traversal follows in both directions
    pub const SYMMETRIC: &[&str] = &[SIMILAR_TO, CONCURRENT_WITH];

    /// Relationship types that place content on a timeline
    pub const TEMPORAL: &[&str] = &[FOLLOWED_BY, PRECEDED_BY, CONCURRENT_WITH];

    pub fn is_symmetric(relationship: &str) -> bool {
        SYMMETRIC.contains(&relationship)
    }

    pub fn is_temporal(relationship: &str) -> bool {
        TEMPORAL.contains(&relationship)
    }
}

/// A directed edge between two nodes
///
/// Storage keeps at most one edge per (source, target, relationship).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    /// Type of relationship (e.g., "similar_to", "references")
    pub relationship: String,
    /// Relationship strength (0.0 - 1.0)
    pub strength: f32,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    /// Create a new edge with zero strength
    pub fn new(source: NodeId, target: NodeId, relationship: impl Into<String>) -> Self {
        Self {
            id: EdgeId::new(),
            source,
            target,
            relationship: relationship.into(),
            strength: 0.0,
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }

    /// Set the strength, clamped into [0, 1]
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength.clamp(0.0, 1.0);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether traversal may walk this edge from `node`
    ///
    /// Forward always; backward only for symmetric relationship types.
    pub fn walkable_from(&self, node: &NodeId) -> Option<NodeId> {
        if &self.source == node {
            Some(self.target)
        } else if &self.target == node && relationship::is_symmetric(&self.relationship) {
            Some(self.source)
        } else {
            None
        }
    }
}
