//! All-paths search

use super::snapshot::GraphSnapshot;
use super::types::PathMatch;
use std::collections::VecDeque;

/// Enumerate simple paths from `source` to `target`
///
/// Breadth-first over partial paths, so shorter paths are found first. A
/// node already on the current path is never re-entered; the same node
/// may still appear in several returned paths. Stops after `max_paths`
/// paths or when the frontier is exhausted. Results are sorted by length
/// ascending, then average edge strength descending.
///
/// Paths are distinct node sequences. Where parallel edges join the same
/// two nodes, only the strongest is followed.
pub fn find_all_paths(
    snapshot: &GraphSnapshot,
    source: usize,
    target: usize,
    max_paths: usize,
    max_depth: usize,
) -> Vec<PathMatch> {
    let mut found: Vec<PathMatch> = Vec::new();
    if max_paths == 0 {
        return found;
    }
    if source == target {
        found.push(PathMatch {
            path: vec![snapshot.node(source).content_id.clone()],
            length: 0,
            avg_strength: 0.0,
        });
        return found;
    }

    // (current node, node path, edge path)
    let mut queue: VecDeque<(usize, Vec<usize>, Vec<usize>)> = VecDeque::new();
    queue.push_back((source, vec![source], Vec::new()));

    while let Some((current, nodes, edges)) = queue.pop_front() {
        if edges.len() >= max_depth {
            continue;
        }
        for (neighbor, edge) in strongest_hops(snapshot, current) {
            if nodes.contains(&neighbor) {
                continue;
            }
            let mut next_nodes = nodes.clone();
            next_nodes.push(neighbor);
            let mut next_edges = edges.clone();
            next_edges.push(edge);

            if neighbor == target {
                found.push(to_match(snapshot, &next_nodes, &next_edges));
                if found.len() >= max_paths {
                    sort_paths(&mut found);
                    return found;
                }
            } else {
                queue.push_back((neighbor, next_nodes, next_edges));
            }
        }
    }

    sort_paths(&mut found);
    found
}

/// One (neighbour, edge) per neighbour, keeping the strongest parallel edge
fn strongest_hops(snapshot: &GraphSnapshot, current: usize) -> Vec<(usize, usize)> {
    let mut hops: Vec<(usize, usize)> = Vec::new();
    for (neighbor, edge) in snapshot.neighbors(current, None) {
        match hops.iter_mut().find(|(n, _)| *n == neighbor) {
            Some(hop) => {
                if snapshot.edge(edge).strength > snapshot.edge(hop.1).strength {
                    hop.1 = edge;
                }
            }
            None => hops.push((neighbor, edge)),
        }
    }
    hops
}

fn to_match(snapshot: &GraphSnapshot, nodes: &[usize], edges: &[usize]) -> PathMatch {
    let total: f32 = edges.iter().map(|&e| snapshot.edge(e).strength).sum();
    PathMatch {
        path: nodes.iter().map(|&n| snapshot.node(n).content_id.clone()).collect(),
        length: edges.len(),
        avg_strength: if edges.is_empty() { 0.0 } else { total / edges.len() as f32 },
    }
}

fn sort_paths(paths: &mut [PathMatch]) {
    paths.sort_by(|a, b| {
        a.length
            .cmp(&b.length)
            .then_with(|| b.avg_strength.total_cmp(&a.avg_strength))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{relationship, ContentType, Edge, Node};
    use std::collections::HashSet;

    /// a -> b -> d, a -> c -> d, a -> d, b <-> c (similar_to)
    fn create_diamond() -> GraphSnapshot {
        let nodes: Vec<Node> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| Node::new(*id, ContentType::Document))
            .collect();
        let id = |i: usize| nodes[i].id;
        let edges = vec![
            Edge::new(id(0), id(1), relationship::REFERENCES).with_strength(0.2),
            Edge::new(id(1), id(3), relationship::REFERENCES).with_strength(0.2),
            Edge::new(id(0), id(2), relationship::REFERENCES).with_strength(0.9),
            Edge::new(id(2), id(3), relationship::REFERENCES).with_strength(0.9),
            Edge::new(id(0), id(3), relationship::REFERENCES).with_strength(0.1),
            Edge::new(id(1), id(2), relationship::SIMILAR_TO).with_strength(0.5),
        ];
        GraphSnapshot::from_parts(nodes, edges)
    }

    #[test]
    fn test_paths_sorted_by_length_then_strength() {
        let snapshot = create_diamond();
        let (a, d) = (snapshot.index_of("a").unwrap(), snapshot.index_of("d").unwrap());
        let paths = find_all_paths(&snapshot, a, d, 10, 5);

        assert_eq!(paths[0].path, vec!["a", "d"]);
        assert_eq!(paths[1].path, vec!["a", "c", "d"]);
        assert_eq!(paths[2].path, vec!["a", "b", "d"]);
        assert_eq!(paths.len(), 5);
        assert!(paths.windows(2).all(|w| w[0].length <= w[1].length));
    }

    #[test]
    fn test_paths_never_repeat_a_node() {
        let snapshot = create_diamond();
        let (a, d) = (snapshot.index_of("a").unwrap(), snapshot.index_of("d").unwrap());

        for found in find_all_paths(&snapshot, a, d, 100, 10) {
            let unique: HashSet<&String> = found.path.iter().collect();
            assert_eq!(unique.len(), found.path.len(), "repeated node in {:?}", found.path);
        }
    }

    #[test]
    fn test_max_paths_and_depth() {
        let snapshot = create_diamond();
        let (a, d) = (snapshot.index_of("a").unwrap(), snapshot.index_of("d").unwrap());

        assert_eq!(find_all_paths(&snapshot, a, d, 2, 5).len(), 2);
        assert_eq!(find_all_paths(&snapshot, a, d, 10, 1).len(), 1);
        assert!(find_all_paths(&snapshot, d, a, 10, 5).is_empty());
    }

    #[test]
    fn test_parallel_edges_yield_one_path() {
        let nodes = vec![Node::new("a", ContentType::Document), Node::new("b", ContentType::Document)];
        let (a, b) = (nodes[0].id, nodes[1].id);
        let edges = vec![
            Edge::new(a, b, relationship::REFERENCES).with_strength(0.5),
            Edge::new(a, b, relationship::SIMILAR_TO).with_strength(0.9),
            Edge::new(b, a, relationship::SIMILAR_TO).with_strength(0.9),
        ];
        let snapshot = GraphSnapshot::from_parts(nodes, edges);
        let (a, b) = (snapshot.index_of("a").unwrap(), snapshot.index_of("b").unwrap());

        let paths = find_all_paths(&snapshot, a, b, 10, 3);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].path, vec!["a", "b"]);
        assert!((paths[0].avg_strength - 0.9).abs() < 1e-6);

        // A single distinct path cannot fill a larger budget with copies
        assert_eq!(find_all_paths(&snapshot, a, b, 2, 3).len(), 1);
    }

    #[test]
    fn test_source_equals_target() {
        let snapshot = create_diamond();
        let a = snapshot.index_of("a").unwrap();
        let paths = find_all_paths(&snapshot, a, a, 10, 5);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].length, 0);
    }
}
