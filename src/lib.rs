//! Tessera: Content Relationship Graph
//!
//! Builds and queries a graph of relationships between ingested content
//! (messages, documents, extracted entities), scores pairwise similarity
//! from embeddings, and runs an idempotent multi-step enrichment pipeline
//! that feeds both.
//!
//! # Core Concepts
//!
//! - **Nodes**: One per piece of content, addressed by content id
//! - **Edges**: Typed, weighted relationships; `similar_to` and
//!   `concurrent_with` are walked in both directions
//! - **Traversal**: BFS, all-paths, PageRank, related content, timeline
//!   context and visualization export over a per-call snapshot
//! - **Enrichment**: entities, embeddings and timeline events per document,
//!   skipped on re-runs
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tessera::{ContentGraph, ContentType, GraphTraversal, Metadata, OpenStore, SqliteStore};
//!
//! let store = Arc::new(SqliteStore::open_in_memory().unwrap());
//! let graph = ContentGraph::new(store.clone(), store.clone());
//! graph.add_node("a", ContentType::Document, Some("A"), Metadata::new()).unwrap();
//! graph.add_node("b", ContentType::Document, Some("B"), Metadata::new()).unwrap();
//! graph.add_edge("a", "b", "references", 0.5, Metadata::new()).unwrap();
//!
//! let traversal = GraphTraversal::new(store);
//! let reached: Vec<String> = traversal
//!     .bfs("a", 2, None)
//!     .unwrap()
//!     .map(|visit| visit.node.content_id)
//!     .collect();
//! assert_eq!(reached, vec!["a", "b"]);
//! ```

pub mod config;
pub mod error;
mod graph;
pub mod pipeline;
pub mod query;
pub mod similarity;
pub mod storage;

pub use config::{ConfigError, TesseraConfig};
pub use error::{FailureKind, ItemFailure};
pub use graph::{
    relationship, BatchReport, ContentGraph, ContentType, Edge, EdgeId, EdgeSpec, GraphError,
    GraphResult, GraphStats, Metadata, MetadataValue, Node, NodeId, NodeSpec,
};
pub use pipeline::{
    CancellationToken, EnrichmentPipeline, EntityExtractor, InMemoryVectorIndex, PatternEntityExtractor,
    PipelineConfig, PipelineReport, PipelineStepResult, Step, VectorIndex,
};
pub use query::{Direction, ExportFormat, GraphTraversal, PageRankConfig, PageRankResult};
pub use similarity::{EmbeddingService, SimilarityConfig, SimilarityEngine, SimilarityError};
pub use storage::{
    Content, ContentStore, EnrichmentStore, GraphStore, OpenStore, SimilarityCache, SqliteStore, StorageError,
    StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
