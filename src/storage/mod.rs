//! Storage backends for Tessera
//!
//! Storage is split into four traits: `GraphStore` (nodes and edges),
//! `ContentStore` (the external content the graph refers to),
//! `SimilarityCache`, and `EnrichmentStore`. `SqliteStore` implements all
//! four over one database file.

mod records;
mod sqlite;
mod sqlite_records;
mod sqlite_vec;
mod traits;

pub use records::{
    Content, ContentFilter, EntityRelationship, ExtractedEntity, SimilarityCacheEntry, TimelineEvent,
};
pub use sqlite::SqliteStore;
pub use traits::{
    ContentStore, EnrichmentStore, GraphStore, OpenStore, SimilarityCache, StorageError, StorageResult,
};

#[cfg(feature = "embeddings")]
pub use sqlite_vec::{SqliteVecIndex, DEFAULT_EMBEDDING_DIMENSIONS};
