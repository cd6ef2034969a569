//! PageRank over the stored edge direction

use super::snapshot::GraphSnapshot;
use std::collections::HashMap;

/// PageRank parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRankConfig {
    pub damping: f64,
    pub max_iterations: usize,
    /// Stop once the largest per-node change drops below this
    pub epsilon: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            epsilon: 1e-4,
        }
    }
}

impl PageRankConfig {
    pub fn damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }
}

/// PageRank scores keyed by content id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRankResult {
    pub scores: HashMap<String, f64>,
    pub iterations: usize,
    pub converged: bool,
}

impl PageRankResult {
    /// The `n` highest-scoring content ids, ties broken by content id
    pub fn top(&self, n: usize) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self.scores.iter().map(|(k, v)| (k.clone(), *v)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }

    pub fn score(&self, content_id: &str) -> Option<f64> {
        self.scores.get(content_id).copied()
    }
}

/// Compute PageRank
///
/// `score[v] = (1 - d) / N + d * sum(score[u] / outdegree(u))` over edges
/// `u -> v`. Dangling nodes contribute no forward mass; the final scores
/// are normalized to sum to 1.
pub fn pagerank(snapshot: &GraphSnapshot, config: &PageRankConfig) -> PageRankResult {
    let n = snapshot.node_count();
    if n == 0 {
        return PageRankResult {
            converged: true,
            ..Default::default()
        };
    }

    // Incoming source indices and out-degrees, built once
    let incoming: Vec<Vec<usize>> = (0..n)
        .map(|v| snapshot.incoming(v).iter().map(|&e| snapshot.endpoints(e).0).collect())
        .collect();
    let out_degree: Vec<usize> = (0..n).map(|u| snapshot.outgoing(u).len()).collect();

    let base = (1.0 - config.damping) / n as f64;
    let mut scores = vec![1.0 / n as f64; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iterations {
        iterations += 1;
        let mut next = vec![0.0; n];
        let mut max_delta: f64 = 0.0;

        for v in 0..n {
            let inbound: f64 = incoming[v]
                .iter()
                .map(|&u| scores[u] / out_degree[u] as f64)
                .sum();
            next[v] = base + config.damping * inbound;
            max_delta = max_delta.max((next[v] - scores[v]).abs());
        }

        scores = next;
        if max_delta < config.epsilon {
            converged = true;
            break;
        }
    }

    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        for s in &mut scores {
            *s /= total;
        }
    }

    PageRankResult {
        scores: (0..n)
            .map(|i| (snapshot.node(i).content_id.clone(), scores[i]))
            .collect(),
        iterations,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{relationship, ContentType, Edge, Node};

    fn snapshot(ids: &[&str], links: &[(usize, usize)]) -> GraphSnapshot {
        let nodes: Vec<Node> = ids.iter().map(|id| Node::new(*id, ContentType::Document)).collect();
        let edges = links
            .iter()
            .map(|&(s, t)| Edge::new(nodes[s].id, nodes[t].id, relationship::REFERENCES))
            .collect();
        GraphSnapshot::from_parts(nodes, edges)
    }

    #[test]
    fn test_empty_graph() {
        let result = pagerank(&GraphSnapshot::default(), &PageRankConfig::default());
        assert!(result.scores.is_empty());
        assert!(result.converged);
    }

    #[test]
    fn test_cycle_is_uniform() {
        let g = snapshot(&["a", "b", "c"], &[(0, 1), (1, 2), (2, 0)]);
        let result = pagerank(&g, &PageRankConfig::default());

        assert!(result.converged);
        for score in result.scores.values() {
            assert!((score - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_scores_sum_to_one() {
        let g = snapshot(&["a", "b", "c", "d"], &[(0, 1), (0, 2), (2, 1), (3, 1)]);
        let result = pagerank(&g, &PageRankConfig::default());

        let sum: f64 = result.scores.values().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert_eq!(result.top(1)[0].0, "b");
    }

    #[test]
    fn test_iteration_budget() {
        let g = snapshot(&["a", "b", "c"], &[(0, 1), (1, 2)]);
        let result = pagerank(&g, &PageRankConfig::default().max_iterations(1).epsilon(0.0));

        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
    }
}
