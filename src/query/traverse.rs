//! Lazy breadth-first traversal

use super::snapshot::GraphSnapshot;
use super::types::Visit;
use std::collections::VecDeque;
use std::sync::Arc;

/// A queued frontier entry
#[derive(Debug, Clone)]
struct Frame {
    node: usize,
    depth: usize,
    path: Vec<usize>,
    via: Option<usize>,
}

/// Breadth-first iterator over a graph snapshot
///
/// A node is marked visited when dequeued, so the same node may sit in
/// the frontier more than once but is yielded only at the first dequeue
/// (its minimal depth). Each iterator is independent; a fresh call
/// re-seeds from the start node.
#[derive(Debug, Clone)]
pub struct Bfs {
    snapshot: Arc<GraphSnapshot>,
    queue: VecDeque<Frame>,
    visited: Vec<bool>,
    max_depth: usize,
    relationships: Option<Vec<String>>,
}

impl Bfs {
    /// Traverse from `start`; an unknown start yields nothing
    pub fn new(
        snapshot: Arc<GraphSnapshot>,
        start: &str,
        max_depth: usize,
        relationships: Option<Vec<String>>,
    ) -> Self {
        let mut queue = VecDeque::new();
        if let Some(idx) = snapshot.index_of(start) {
            queue.push_back(Frame {
                node: idx,
                depth: 0,
                path: vec![idx],
                via: None,
            });
        }
        let visited = vec![false; snapshot.node_count()];

        Self {
            snapshot,
            queue,
            visited,
            max_depth,
            relationships,
        }
    }

    fn expand(&mut self, frame: &Frame) {
        if frame.depth >= self.max_depth {
            return;
        }
        let next: Vec<(usize, usize)> = self
            .snapshot
            .neighbors(frame.node, self.relationships.as_deref())
            .filter(|&(n, _)| !self.visited[n])
            .collect();

        for (neighbor, edge) in next {
            let mut path = frame.path.clone();
            path.push(neighbor);
            self.queue.push_back(Frame {
                node: neighbor,
                depth: frame.depth + 1,
                path,
                via: Some(edge),
            });
        }
    }
}

impl Iterator for Bfs {
    type Item = Visit;

    fn next(&mut self) -> Option<Visit> {
        while let Some(frame) = self.queue.pop_front() {
            if self.visited[frame.node] {
                continue;
            }
            self.visited[frame.node] = true;
            self.expand(&frame);

            let via = frame.via.map(|e| self.snapshot.edge(e));
            return Some(Visit {
                node: self.snapshot.node(frame.node).clone(),
                depth: frame.depth,
                path: frame
                    .path
                    .iter()
                    .map(|&i| self.snapshot.node(i).content_id.clone())
                    .collect(),
                relationship: via.map(|e| e.relationship.clone()),
                via_strength: via.map(|e| e.strength),
            });
        }
        None
    }
}
