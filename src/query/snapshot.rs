//! Arena snapshot of the graph for traversal algorithms
//!
//! Nodes and edges are loaded once per call and addressed by integer
//! handles. Adjacency lists hold edge indices, so relationship cycles in
//! the data never turn into reference cycles.

use crate::graph::{relationship, Edge, Node, NodeId};
use crate::storage::{GraphStore, StorageResult};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    by_content: HashMap<String, usize>,
    /// (neighbour, edge) pairs traversal may follow, in edge insertion order
    walk: Vec<Vec<(usize, usize)>>,
    /// Stored-direction adjacency, as edge indices
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    /// (source, target) node indices per edge
    endpoints: Vec<(usize, usize)>,
}

impl GraphSnapshot {
    /// Load every node and edge from the store
    pub fn load(store: &dyn GraphStore) -> StorageResult<Self> {
        Ok(Self::from_parts(store.all_nodes()?, store.all_edges()?))
    }

    /// Build from already-loaded parts; edges with unknown endpoints are dropped
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let by_id: HashMap<NodeId, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
        let by_content = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.content_id.clone(), i))
            .collect();

        let n = nodes.len();
        let mut snapshot = Self {
            nodes,
            edges: Vec::with_capacity(edges.len()),
            by_content,
            walk: vec![Vec::new(); n],
            outgoing: vec![Vec::new(); n],
            incoming: vec![Vec::new(); n],
            endpoints: Vec::with_capacity(edges.len()),
        };

        for edge in edges {
            let (Some(&src), Some(&tgt)) = (by_id.get(&edge.source), by_id.get(&edge.target)) else {
                continue;
            };
            let e = snapshot.edges.len();
            snapshot.walk[src].push((tgt, e));
            if relationship::is_symmetric(&edge.relationship) && src != tgt {
                snapshot.walk[tgt].push((src, e));
            }
            snapshot.outgoing[src].push(e);
            snapshot.incoming[tgt].push(e);
            snapshot.endpoints.push((src, tgt));
            snapshot.edges.push(edge);
        }

        snapshot
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn edge(&self, idx: usize) -> &Edge {
        &self.edges[idx]
    }

    /// Index of the node for a content id
    pub fn index_of(&self, content_id: &str) -> Option<usize> {
        self.by_content.get(content_id).copied()
    }

    /// Source and target node indices of an edge
    pub fn endpoints(&self, edge: usize) -> (usize, usize) {
        self.endpoints[edge]
    }

    /// Walkable (neighbour, edge) pairs, optionally restricted to relationship types
    pub fn neighbors<'a>(
        &'a self,
        idx: usize,
        relationships: Option<&'a [String]>,
    ) -> impl Iterator<Item = (usize, usize)> + 'a {
        self.walk[idx].iter().copied().filter(move |&(_, e)| match relationships {
            Some(allowed) => allowed.iter().any(|r| r == &self.edges[e].relationship),
            None => true,
        })
    }

    /// Edge indices leaving a node in stored direction
    pub fn outgoing(&self, idx: usize) -> &[usize] {
        &self.outgoing[idx]
    }

    /// Edge indices entering a node in stored direction
    pub fn incoming(&self, idx: usize) -> &[usize] {
        &self.incoming[idx]
    }
}
