//! ContentGraph: node/edge creation and lookup over a `GraphStore`

use super::edge::{Edge, EdgeId};
use super::node::{ContentType, Metadata, Node, NodeId};
use crate::error::{FailureKind, ItemFailure};
use crate::query::Direction;
use crate::storage::{ContentStore, GraphStore, StorageError};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur in graph operations
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Edge strength out of range [0, 1]: {0}")]
    InvalidStrength(f32),

    #[error("Persistence error: {0}")]
    Persistence(StorageError),
}

impl From<StorageError> for GraphError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidMetadata { owner, reason } => {
                GraphError::InvalidMetadata(format!("{}: {}", owner, reason))
            }
            other => GraphError::Persistence(other),
        }
    }
}

impl GraphError {
    /// Failure category for batch reports
    pub fn kind(&self) -> FailureKind {
        match self {
            GraphError::NotFound(_) => FailureKind::NotFound,
            GraphError::InvalidMetadata(_) | GraphError::InvalidStrength(_) => FailureKind::Validation,
            GraphError::Persistence(_) => FailureKind::Persistence,
        }
    }
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Input for bulk node creation
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub content_id: String,
    pub content_type: ContentType,
    pub title: Option<String>,
    pub metadata: Metadata,
}

impl NodeSpec {
    pub fn new(content_id: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            content_id: content_id.into(),
            content_type,
            title: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Input for bulk edge creation
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    pub source: String,
    pub target: String,
    pub relationship: String,
    pub strength: f32,
    pub metadata: Metadata,
}

impl EdgeSpec {
    pub fn new(source: impl Into<String>, target: impl Into<String>, relationship: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relationship: relationship.into(),
            strength: 0.0,
            metadata: Metadata::new(),
        }
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }
}

/// Outcome of a bulk insert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub total: usize,
    pub inserted: usize,
    /// Items that already existed
    pub ignored: usize,
    /// Items that could not be inserted at all
    pub failures: Vec<ItemFailure>,
}

/// Node and edge counts by type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_type: BTreeMap<String, usize>,
    pub edges_by_relationship: BTreeMap<String, usize>,
}

/// The main content graph handle
///
/// Creates nodes and edges, resolving unknown endpoints against the
/// external content store (auto-vivification). Both collaborators are
/// injected; there is no shared global instance.
#[derive(Clone)]
pub struct ContentGraph {
    store: Arc<dyn GraphStore>,
    content: Arc<dyn ContentStore>,
}

impl ContentGraph {
    pub fn new(store: Arc<dyn GraphStore>, content: Arc<dyn ContentStore>) -> Self {
        Self { store, content }
    }

    /// The underlying graph store
    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Add a node for a piece of content
    ///
    /// Idempotent: if the content id already has a node, nothing is written
    /// and the existing node's id is returned.
    pub fn add_node(
        &self,
        content_id: &str,
        content_type: ContentType,
        title: Option<&str>,
        metadata: Metadata,
    ) -> GraphResult<NodeId> {
        let mut node = Node::new(content_id, content_type);
        node.title = title.map(str::to_string);
        node.metadata = metadata;

        if self.store.insert_node(&node)? {
            debug!(content_id, node_id = %node.id, "node added");
            return Ok(node.id);
        }

        self.store
            .get_node_by_content(content_id)?
            .map(|existing| existing.id)
            .ok_or_else(|| GraphError::NotFound(content_id.to_string()))
    }

    /// Add an edge between two pieces of content
    ///
    /// Endpoints without a node are created from the content store; if
    /// either cannot be resolved the call fails with `NotFound`. Idempotent
    /// on (source, target, relationship): an existing edge's id is returned.
    pub fn add_edge(
        &self,
        source_content_id: &str,
        target_content_id: &str,
        relationship: &str,
        strength: f32,
        metadata: Metadata,
    ) -> GraphResult<EdgeId> {
        if !(0.0..=1.0).contains(&strength) {
            return Err(GraphError::InvalidStrength(strength));
        }

        let (source, target) = self.resolve_endpoints(source_content_id, target_content_id)?;

        if let Some(existing) = self.store.find_edge(&source.id, &target.id, relationship)? {
            return Ok(existing.id);
        }

        let mut edge = Edge::new(source.id, target.id, relationship).with_strength(strength);
        edge.metadata = metadata;

        if self.store.insert_edge(&edge)? {
            Ok(edge.id)
        } else {
            // Lost a race with another writer; report the stored edge
            self.store
                .find_edge(&source.id, &target.id, relationship)?
                .map(|e| e.id)
                .ok_or_else(|| GraphError::NotFound(format!("{}->{}", source_content_id, target_content_id)))
        }
    }

    pub fn get_node_by_content(&self, content_id: &str) -> GraphResult<Option<Node>> {
        Ok(self.store.get_node_by_content(content_id)?)
    }

    pub fn get_edges_by_node(&self, node_id: &NodeId, direction: Direction) -> GraphResult<Vec<Edge>> {
        Ok(self.store.get_edges_by_node(node_id, direction)?)
    }

    /// Bulk node creation, one transaction per `batch_size` items
    pub fn batch_add_nodes(&self, items: &[NodeSpec], batch_size: usize) -> GraphResult<BatchReport> {
        let mut report = BatchReport {
            total: items.len(),
            ..Default::default()
        };

        for chunk in items.chunks(batch_size.max(1)) {
            let nodes: Vec<Node> = chunk
                .iter()
                .map(|spec| {
                    let mut node = Node::new(spec.content_id.clone(), spec.content_type.clone());
                    node.title = spec.title.clone();
                    node.metadata = spec.metadata.clone();
                    node
                })
                .collect();
            let inserted = self.store.insert_nodes(&nodes)?;
            report.inserted += inserted;
            report.ignored += nodes.len() - inserted;
        }

        debug!(total = report.total, inserted = report.inserted, "batch nodes added");
        Ok(report)
    }

    /// Bulk edge creation, one transaction per `batch_size` items
    ///
    /// Items whose endpoints cannot be resolved are recorded as failures;
    /// the rest of the batch is still written.
    pub fn batch_add_edges(&self, items: &[EdgeSpec], batch_size: usize) -> GraphResult<BatchReport> {
        let mut report = BatchReport {
            total: items.len(),
            ..Default::default()
        };

        for chunk in items.chunks(batch_size.max(1)) {
            let mut edges = Vec::with_capacity(chunk.len());
            for spec in chunk {
                match self.edge_from_spec(spec) {
                    Ok(edge) => edges.push(edge),
                    Err(e) => {
                        warn!(source = %spec.source, target = %spec.target, error = %e, "edge skipped");
                        report.failures.push(ItemFailure::new(
                            format!("{}|{}", spec.source, spec.target),
                            e.kind(),
                            e.to_string(),
                        ));
                    }
                }
            }
            let inserted = self.store.insert_edges(&edges)?;
            report.inserted += inserted;
            report.ignored += edges.len() - inserted;
        }

        debug!(
            total = report.total,
            inserted = report.inserted,
            failed = report.failures.len(),
            "batch edges added"
        );
        Ok(report)
    }

    /// Shortest path between two pieces of content, as content ids
    ///
    /// Breadth-first over the store with a visited set. Forward edges are
    /// always walkable, symmetric relationship types in both directions.
    /// Among equally short paths the first discovered wins.
    pub fn find_shortest_path(
        &self,
        source_content_id: &str,
        target_content_id: &str,
        max_depth: usize,
    ) -> GraphResult<Option<Vec<String>>> {
        let Some(source) = self.store.get_node_by_content(source_content_id)? else {
            return Ok(None);
        };
        let Some(target) = self.store.get_node_by_content(target_content_id)? else {
            return Ok(None);
        };
        if source.id == target.id {
            return Ok(Some(vec![source.content_id]));
        }

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut predecessors: HashMap<NodeId, NodeId> = HashMap::new();
        let mut queue: VecDeque<(NodeId, usize)> = VecDeque::new();

        visited.insert(source.id);
        queue.push_back((source.id, 0));

        let mut found = false;
        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for edge in self.store.get_edges_by_node(&current, Direction::Both)? {
                let Some(neighbor) = edge.walkable_from(&current) else {
                    continue;
                };
                if !visited.insert(neighbor) {
                    continue;
                }
                predecessors.insert(neighbor, current);
                if neighbor == target.id {
                    found = true;
                    break;
                }
                queue.push_back((neighbor, depth + 1));
            }
            if found {
                break;
            }
        }

        if !found {
            return Ok(None);
        }

        // Walk backwards from target to source
        let mut ids = vec![target.id];
        let mut current = target.id;
        while let Some(pred) = predecessors.get(&current) {
            ids.push(*pred);
            current = *pred;
        }
        ids.reverse();

        let mut path = Vec::with_capacity(ids.len());
        for id in ids {
            let node = self
                .store
                .get_node(&id)?
                .ok_or_else(|| GraphError::NotFound(id.to_string()))?;
            path.push(node.content_id);
        }
        Ok(Some(path))
    }

    /// Node and edge counts by content type and relationship type
    pub fn graph_stats(&self) -> GraphResult<GraphStats> {
        let nodes = self.store.all_nodes()?;
        let edges = self.store.all_edges()?;

        let mut stats = GraphStats {
            node_count: nodes.len(),
            edge_count: edges.len(),
            ..Default::default()
        };
        for node in &nodes {
            *stats.nodes_by_type.entry(node.content_type.to_string()).or_default() += 1;
        }
        for edge in &edges {
            *stats.edges_by_relationship.entry(edge.relationship.clone()).or_default() += 1;
        }
        Ok(stats)
    }

    /// Existing node for the content id, or a new one built from the content store
    /// Resolve both endpoints before writing either, so a missing target
    /// never leaves an auto-created source behind
    fn resolve_endpoints(&self, source: &str, target: &str) -> GraphResult<(Node, Node)> {
        let source = self.lookup_endpoint(source)?;
        let target = self.lookup_endpoint(target)?;
        Ok((self.materialize(source)?, self.materialize(target)?))
    }

    /// Stored node for `content_id`, or an unsaved one built from its content
    fn lookup_endpoint(&self, content_id: &str) -> GraphResult<Endpoint> {
        if let Some(node) = self.store.get_node_by_content(content_id)? {
            return Ok(Endpoint::Stored(node));
        }

        let content = self
            .content
            .get_content(content_id)?
            .ok_or_else(|| GraphError::NotFound(content_id.to_string()))?;

        let mut node = Node::new(content.id.clone(), content.content_type.clone());
        node.title = content.title.clone();
        node.metadata = content.metadata.clone();
        Ok(Endpoint::Pending(node))
    }

    fn materialize(&self, endpoint: Endpoint) -> GraphResult<Node> {
        let node = match endpoint {
            Endpoint::Stored(node) => return Ok(node),
            Endpoint::Pending(node) => node,
        };
        if self.store.insert_node(&node)? {
            debug!(content_id = %node.content_id, "node auto-created from content store");
            return Ok(node);
        }

        self.store
            .get_node_by_content(&node.content_id)?
            .ok_or_else(|| GraphError::NotFound(node.content_id.clone()))
    }

    fn edge_from_spec(&self, spec: &EdgeSpec) -> GraphResult<Edge> {
        if !(0.0..=1.0).contains(&spec.strength) {
            return Err(GraphError::InvalidStrength(spec.strength));
        }
        let (source, target) = self.resolve_endpoints(&spec.source, &spec.target)?;
        let mut edge = Edge::new(source.id, target.id, spec.relationship.clone()).with_strength(spec.strength);
        edge.metadata = spec.metadata.clone();
        Ok(edge)
    }
}

enum Endpoint {
    Stored(Node),
    Pending(Node),
}

impl std::fmt::Debug for ContentGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentGraph").finish_non_exhaustive()
    }
}
