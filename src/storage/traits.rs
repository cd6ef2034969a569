//! Storage trait definitions

use super::records::{
    Content, ContentFilter, EntityRelationship, ExtractedEntity, SimilarityCacheEntry, TimelineEvent,
};
use crate::graph::{Edge, Node, NodeId};
use crate::query::Direction;
use chrono::{DateTime, Utc};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Invalid metadata on {owner}: {reason}")]
    InvalidMetadata { owner: String, reason: String },

    #[error("Connection lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable storage of graph nodes and edges
///
/// Implementations must be thread-safe (Send + Sync). Inserts are
/// idempotent: a second insert of the same content id, or of the same
/// (source, target, relationship) triplet, leaves the store unchanged.
pub trait GraphStore: Send + Sync {
    // === Node Operations ===

    /// Insert a node, ignoring it if its content id already exists.
    /// Returns whether a row was written.
    fn insert_node(&self, node: &Node) -> StorageResult<bool>;

    /// Insert many nodes in one transaction. Returns rows written.
    fn insert_nodes(&self, nodes: &[Node]) -> StorageResult<usize>;

    fn get_node(&self, id: &NodeId) -> StorageResult<Option<Node>>;

    fn get_node_by_content(&self, content_id: &str) -> StorageResult<Option<Node>>;

    /// All nodes, in insertion order
    fn all_nodes(&self) -> StorageResult<Vec<Node>>;

    // === Edge Operations ===

    /// Insert an edge, ignoring it if the triplet already exists.
    /// Returns whether a row was written.
    fn insert_edge(&self, edge: &Edge) -> StorageResult<bool>;

    /// Insert many edges in one transaction. Returns rows written.
    fn insert_edges(&self, edges: &[Edge]) -> StorageResult<usize>;

    fn find_edge(
        &self,
        source: &NodeId,
        target: &NodeId,
        relationship: &str,
    ) -> StorageResult<Option<Edge>>;

    /// Edges touching a node, in insertion order
    fn get_edges_by_node(&self, id: &NodeId, direction: Direction) -> StorageResult<Vec<Edge>>;

    /// All edges, in insertion order
    fn all_edges(&self) -> StorageResult<Vec<Edge>>;
}

/// Read access to the external content store
pub trait ContentStore: Send + Sync {
    fn get_content(&self, id: &str) -> StorageResult<Option<Content>>;

    /// Content ids matching the filter, in insertion order
    fn list_content_ids(&self, filter: &ContentFilter) -> StorageResult<Vec<String>>;

    /// Case-insensitive substring search over title and body
    fn search_content(&self, query: &str, filter: &ContentFilter) -> StorageResult<Vec<Content>>;
}

/// Persistent similarity score cache keyed by pair hash
pub trait SimilarityCache: Send + Sync {
    fn get_similarity(&self, pair_hash: &str) -> StorageResult<Option<SimilarityCacheEntry>>;

    /// Insert or replace the entry for its pair hash
    fn put_similarity(&self, entry: &SimilarityCacheEntry) -> StorageResult<()>;

    /// Delete entries created before `older_than`, or all entries.
    /// Returns rows deleted.
    fn clear_similarities(&self, older_than: Option<DateTime<Utc>>) -> StorageResult<usize>;

    /// All defined cached scores
    fn similarity_scores(&self) -> StorageResult<Vec<f32>>;
}

/// Persistence for enrichment pipeline output and idempotency markers
pub trait EnrichmentStore: Send + Sync {
    /// Whether an entity extraction record for the document was written at or after `since`
    fn has_entity_record(&self, document_id: &str, since: DateTime<Utc>) -> StorageResult<bool>;

    /// Replace the document's entities and relationships and stamp its extraction record.
    /// Returns entity rows written.
    fn store_entities(
        &self,
        document_id: &str,
        entities: &[ExtractedEntity],
        relationships: &[EntityRelationship],
    ) -> StorageResult<usize>;

    /// Entity row count, for one document or overall
    fn entity_count(&self, document_id: Option<&str>) -> StorageResult<usize>;

    fn is_vectorized(&self, document_id: &str) -> StorageResult<bool>;

    fn mark_vectorized(&self, document_id: &str, point_id: &Uuid) -> StorageResult<()>;

    fn has_timeline_event(&self, document_id: &str) -> StorageResult<bool>;

    /// Insert a document's events in one transaction
    ///
    /// Events whose hash already exists are skipped; returns how many were
    /// written. On error nothing is written, so the document stays unmarked.
    fn insert_timeline_events(&self, events: &[TimelineEvent]) -> StorageResult<usize>;

    /// Timeline row count, for one document or overall
    fn timeline_event_count(&self, document_id: Option<&str>) -> StorageResult<usize>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
