//! Query system for Tessera content graphs
//!
//! Traversal algorithms run over a [`GraphSnapshot`] loaded from the store
//! at the start of each call, so every result is a pure function of the
//! graph contents at that moment.

mod export;
mod path;
mod rank;
mod related;
mod snapshot;
mod traverse;
mod types;

pub use export::{ExportFormat, VizLink, VizNode, Visualization, DEFAULT_EXPORT_NODES};
pub use path::find_all_paths;
pub use rank::{pagerank, PageRankConfig, PageRankResult};
pub use related::{event_time, find_related_content, get_timeline_context};
pub use snapshot::GraphSnapshot;
pub use traverse::Bfs;
pub use types::{Direction, PathMatch, RelatedItem, TimelineContext, TimelineEntry, Visit};

use crate::graph::GraphResult;
use crate::storage::GraphStore;
use chrono::Duration;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Read-only algorithms over a graph store
#[derive(Clone)]
pub struct GraphTraversal {
    store: Arc<dyn GraphStore>,
}

impl GraphTraversal {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Load the current graph contents
    pub fn snapshot(&self) -> GraphResult<Arc<GraphSnapshot>> {
        let snapshot = GraphSnapshot::load(self.store.as_ref())?;
        debug!(
            nodes = snapshot.node_count(),
            edges = snapshot.edge_count(),
            "graph snapshot loaded"
        );
        Ok(Arc::new(snapshot))
    }

    /// Lazy breadth-first traversal from a piece of content
    pub fn bfs(&self, start: &str, max_depth: usize, relationships: Option<&[&str]>) -> GraphResult<Bfs> {
        Ok(Bfs::new(self.snapshot()?, start, max_depth, owned(relationships)))
    }

    /// Up to `max_paths` simple paths between two pieces of content
    pub fn find_all_paths(
        &self,
        source: &str,
        target: &str,
        max_paths: usize,
        max_depth: usize,
    ) -> GraphResult<Vec<PathMatch>> {
        let snapshot = self.snapshot()?;
        let (Some(s), Some(t)) = (snapshot.index_of(source), snapshot.index_of(target)) else {
            return Ok(Vec::new());
        };
        Ok(path::find_all_paths(&snapshot, s, t, max_paths, max_depth))
    }

    pub fn pagerank(&self, config: &PageRankConfig) -> GraphResult<PageRankResult> {
        let snapshot = self.snapshot()?;
        let result = rank::pagerank(&snapshot, config);
        debug!(
            iterations = result.iterations,
            converged = result.converged,
            "pagerank finished"
        );
        Ok(result)
    }

    pub fn find_related_content(
        &self,
        content_id: &str,
        relationships: Option<&[&str]>,
        max_depth: usize,
        limit: usize,
    ) -> GraphResult<Vec<RelatedItem>> {
        Ok(related::find_related_content(
            self.snapshot()?,
            content_id,
            owned(relationships),
            max_depth,
            limit,
        ))
    }

    /// Temporal neighbourhood of a node; `None` if the content has no node
    pub fn get_timeline_context(
        &self,
        content_id: &str,
        window: Option<Duration>,
        include_related: bool,
    ) -> GraphResult<Option<TimelineContext>> {
        Ok(related::get_timeline_context(
            self.snapshot()?,
            content_id,
            window,
            include_related,
        ))
    }

    /// Induced subgraph over the given content ids, or the top nodes by PageRank
    pub fn visualization(&self, node_ids: Option<&[String]>) -> GraphResult<Visualization> {
        let snapshot = self.snapshot()?;
        let ranks = rank::pagerank(&snapshot, &PageRankConfig::default());
        Ok(Visualization::build(&snapshot, &ranks, node_ids))
    }

    pub fn export_for_visualization(&self, node_ids: Option<&[String]>, format: ExportFormat) -> GraphResult<Value> {
        Ok(self.visualization(node_ids)?.render(format))
    }
}

impl std::fmt::Debug for GraphTraversal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphTraversal").finish_non_exhaustive()
    }
}

fn owned(relationships: Option<&[&str]>) -> Option<Vec<String>> {
    relationships.map(|rels| rels.iter().map(|r| r.to_string()).collect())
}
