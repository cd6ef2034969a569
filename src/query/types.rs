//! Query types and result structures

use crate::graph::{ContentType, Node};
use serde::Serialize;

/// Direction for edge lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Edges where the node is the source
    #[default]
    Outgoing,
    /// Edges where the node is the target
    Incoming,
    /// Either endpoint
    Both,
}

/// One node yielded by breadth-first traversal
#[derive(Debug, Clone)]
pub struct Visit {
    pub node: Node,
    /// Hops from the start node (0 for the start itself)
    pub depth: usize,
    /// Content ids from the start node to this one, inclusive
    pub path: Vec<String>,
    /// Relationship of the edge used to reach this node
    pub relationship: Option<String>,
    /// Strength of the edge used to reach this node
    pub via_strength: Option<f32>,
}

/// A path found by all-paths search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathMatch {
    /// Content ids from source to target, inclusive
    pub path: Vec<String>,
    /// Number of edges
    pub length: usize,
    /// Mean strength of the path's edges (0.0 for an empty path)
    pub avg_strength: f32,
}

/// A node scored by related-content ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedItem {
    pub content_id: String,
    pub content_type: ContentType,
    pub title: Option<String>,
    pub depth: usize,
    pub score: f32,
    pub relationship: Option<String>,
    pub path: Vec<String>,
}

/// A neighbour placed on the timeline relative to a centre node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub content_id: String,
    pub title: Option<String>,
    pub relationship: String,
    pub strength: f32,
    /// RFC 3339 event time used for ordering and windowing
    pub event_time: String,
}

/// Temporal neighbourhood of one node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineContext {
    pub content_id: String,
    pub event_time: String,
    pub before: Vec<TimelineEntry>,
    pub after: Vec<TimelineEntry>,
    pub concurrent: Vec<TimelineEntry>,
    pub related: Vec<RelatedItem>,
}
