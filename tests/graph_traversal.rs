//! End-to-end traversal over a persisted graph
//!
//! Builds small graphs through `ContentGraph` on a SQLite store and checks
//! the algorithms `GraphTraversal` exposes over them.

mod common;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tessera::{
    relationship, ContentGraph, ContentType, ExportFormat, GraphError, GraphTraversal, Metadata, OpenStore,
    PageRankConfig, SqliteStore,
};

fn graph() -> (ContentGraph, GraphTraversal, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let graph = ContentGraph::new(store.clone(), store.clone());
    let traversal = GraphTraversal::new(store.clone());
    (graph, traversal, store)
}

fn node(graph: &ContentGraph, id: &str) {
    graph
        .add_node(id, ContentType::Document, Some(&id.to_uppercase()), Metadata::new())
        .unwrap();
}

fn dated(graph: &ContentGraph, id: &str, date: &str) {
    let mut metadata = Metadata::new();
    metadata.insert("date".to_string(), date.into());
    graph.add_node(id, ContentType::Email, None, metadata).unwrap();
}

/// A–B (0.9 similar_to), B–C (0.8 similar_to), A–D (0.3 references)
fn abcd() -> (ContentGraph, GraphTraversal) {
    let (graph, traversal, _) = graph();
    for id in ["A", "B", "C", "D"] {
        node(&graph, id);
    }
    graph.add_edge("A", "B", relationship::SIMILAR_TO, 0.9, Metadata::new()).unwrap();
    graph.add_edge("B", "C", relationship::SIMILAR_TO, 0.8, Metadata::new()).unwrap();
    graph.add_edge("A", "D", relationship::REFERENCES, 0.3, Metadata::new()).unwrap();
    (graph, traversal)
}

#[test]
fn bfs_depths_follow_shortest_hops() {
    let (_, traversal) = abcd();
    let visits: Vec<_> = traversal.bfs("A", 2, None).unwrap().collect();

    let depths: HashMap<String, usize> = visits
        .iter()
        .map(|v| (v.node.content_id.clone(), v.depth))
        .collect();
    assert_eq!(depths.len(), 4);
    assert_eq!(depths["A"], 0);
    assert_eq!(depths["B"], 1);
    assert_eq!(depths["D"], 1);
    assert_eq!(depths["C"], 2);

    let order: Vec<&str> = visits.iter().map(|v| v.node.content_id.as_str()).collect();
    assert_eq!(order, vec!["A", "B", "D", "C"]);
    let c = visits.iter().find(|v| v.node.content_id == "C").unwrap();
    assert_eq!(c.path, vec!["A", "B", "C"]);
}

#[test]
fn bfs_respects_depth_and_relationship_filter() {
    let (_, traversal) = abcd();

    let shallow: Vec<String> = traversal
        .bfs("A", 1, None)
        .unwrap()
        .map(|v| v.node.content_id)
        .collect();
    assert_eq!(shallow, vec!["A", "B", "D"]);

    let similar_only: Vec<String> = traversal
        .bfs("A", 3, Some(&[relationship::SIMILAR_TO][..]))
        .unwrap()
        .map(|v| v.node.content_id)
        .collect();
    assert_eq!(similar_only, vec!["A", "B", "C"]);
}

#[test]
fn bfs_from_unknown_node_is_empty() {
    let (_, traversal) = abcd();
    assert_eq!(traversal.bfs("nowhere", 5, None).unwrap().count(), 0);
}

#[test]
fn bfs_never_repeats_a_node() {
    use rand::{Rng, SeedableRng};

    let (graph, traversal, _) = graph();
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let ids: Vec<String> = (0..25).map(|i| format!("n{}", i)).collect();
    for id in &ids {
        node(&graph, id);
    }
    for _ in 0..80 {
        let a = &ids[rng.gen_range(0..ids.len())];
        let b = &ids[rng.gen_range(0..ids.len())];
        let rel = if rng.gen_bool(0.5) {
            relationship::SIMILAR_TO
        } else {
            relationship::REFERENCES
        };
        graph.add_edge(a, b, rel, rng.gen_range(0.0..=1.0), Metadata::new()).unwrap();
    }

    let mut seen = HashSet::new();
    let mut last_depth = 0;
    for visit in traversal.bfs("n0", 6, None).unwrap() {
        assert!(seen.insert(visit.node.content_id.clone()), "{} visited twice", visit.node.content_id);
        assert!(visit.depth >= last_depth, "depths are non-decreasing");
        assert_eq!(visit.path.len(), visit.depth + 1);
        last_depth = visit.depth;
    }

    for found in traversal.find_all_paths("n0", "n1", 20, 5).unwrap() {
        let unique: HashSet<&String> = found.path.iter().collect();
        assert_eq!(unique.len(), found.path.len(), "path revisits a node: {:?}", found.path);
    }
}

#[test]
fn all_paths_sorted_by_length_then_strength() {
    let (graph, traversal, _) = graph();
    for id in ["s", "x", "y", "t"] {
        node(&graph, id);
    }
    graph.add_edge("s", "x", relationship::REFERENCES, 0.2, Metadata::new()).unwrap();
    graph.add_edge("x", "t", relationship::REFERENCES, 0.2, Metadata::new()).unwrap();
    graph.add_edge("s", "y", relationship::REFERENCES, 0.9, Metadata::new()).unwrap();
    graph.add_edge("y", "t", relationship::REFERENCES, 0.9, Metadata::new()).unwrap();
    graph.add_edge("s", "t", relationship::REFERENCES, 0.1, Metadata::new()).unwrap();

    let paths = traversal.find_all_paths("s", "t", 10, 4).unwrap();
    let shapes: Vec<Vec<&str>> = paths
        .iter()
        .map(|p| p.path.iter().map(String::as_str).collect())
        .collect();
    assert_eq!(shapes, vec![vec!["s", "t"], vec!["s", "y", "t"], vec!["s", "x", "t"]]);
    assert_eq!(paths[0].length, 1);
    assert!((paths[1].avg_strength - 0.9).abs() < 1e-6);

    assert_eq!(traversal.find_all_paths("s", "t", 2, 4).unwrap().len(), 2);
}

#[test]
fn all_paths_are_distinct_node_sequences() {
    let (graph, traversal, _) = graph();
    node(&graph, "A");
    node(&graph, "B");
    graph.add_edge("A", "B", relationship::REFERENCES, 0.5, Metadata::new()).unwrap();
    graph.add_edge("A", "B", relationship::SIMILAR_TO, 0.9, Metadata::new()).unwrap();
    graph.add_edge("B", "A", relationship::SIMILAR_TO, 0.9, Metadata::new()).unwrap();

    let paths = traversal.find_all_paths("A", "B", 2, 3).unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].path, vec!["A".to_string(), "B".to_string()]);
    assert!((paths[0].avg_strength - 0.9).abs() < 1e-6);
}

#[test]
fn pagerank_two_node_fixed_point() {
    let (graph, traversal, _) = graph();
    node(&graph, "A");
    node(&graph, "B");
    graph.add_edge("A", "B", relationship::REFERENCES, 1.0, Metadata::new()).unwrap();

    let result = traversal.pagerank(&PageRankConfig::default().damping(0.85)).unwrap();
    assert!(result.converged);

    // A = (1 - d) / 2, B = A + d * A, normalized
    let a = 0.075_f64;
    let b = a + 0.85 * a;
    let expected_a = a / (a + b);
    let expected_b = b / (a + b);
    assert!((result.score("A").unwrap() - expected_a).abs() < 1e-4);
    assert!((result.score("B").unwrap() - expected_b).abs() < 1e-4);
    assert!((result.scores.values().sum::<f64>() - 1.0).abs() < 1e-9);
    assert_eq!(result.top(1)[0].0, "B");
}

#[test]
fn related_content_scores_by_strength_and_depth() {
    let (_, traversal) = abcd();
    let related = traversal.find_related_content("A", None, 2, 10).unwrap();

    let scores: Vec<(&str, f32)> = related.iter().map(|r| (r.content_id.as_str(), r.score)).collect();
    assert_eq!(scores.len(), 3);
    assert_eq!(scores[0].0, "B");
    assert!((scores[0].1 - 0.45).abs() < 1e-6);
    assert_eq!(scores[1].0, "C");
    assert!((scores[1].1 - 0.8 / 3.0).abs() < 1e-6);
    assert_eq!(scores[2].0, "D");
    assert!((scores[2].1 - 0.15).abs() < 1e-6);

    let top = traversal.find_related_content("A", None, 2, 1).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].content_id, "B");
}

#[test]
fn timeline_context_partitions_neighbours() {
    let (graph, traversal, _) = graph();
    dated(&graph, "mon", "2024-03-04T09:00:00Z");
    dated(&graph, "tue", "2024-03-05T09:00:00Z");
    dated(&graph, "tue-2", "2024-03-05T10:00:00Z");
    dated(&graph, "fri", "2024-03-08T09:00:00Z");
    dated(&graph, "note", "2024-03-05T12:00:00Z");

    graph.add_edge("tue", "fri", relationship::FOLLOWED_BY, 0.7, Metadata::new()).unwrap();
    graph.add_edge("mon", "tue", relationship::FOLLOWED_BY, 0.7, Metadata::new()).unwrap();
    graph.add_edge("tue-2", "tue", relationship::CONCURRENT_WITH, 0.9, Metadata::new()).unwrap();
    graph.add_edge("tue", "note", relationship::REFERENCES, 0.6, Metadata::new()).unwrap();

    let context = traversal.get_timeline_context("tue", None, true).unwrap().unwrap();
    let ids = |entries: &[tessera::query::TimelineEntry]| -> Vec<String> {
        entries.iter().map(|e| e.content_id.clone()).collect()
    };
    assert_eq!(ids(&context.before), vec!["mon"]);
    assert_eq!(ids(&context.after), vec!["fri"]);
    assert_eq!(ids(&context.concurrent), vec!["tue-2"]);
    assert_eq!(context.related.len(), 1);
    assert_eq!(context.related[0].content_id, "note");

    let narrow = traversal
        .get_timeline_context("tue", Some(chrono::Duration::hours(36)), false)
        .unwrap()
        .unwrap();
    assert_eq!(ids(&narrow.before), vec!["mon"]);
    assert!(narrow.after.is_empty(), "friday is outside the window");
    assert!(narrow.related.is_empty());

    assert!(traversal.get_timeline_context("ghost", None, false).unwrap().is_none());
}

#[test]
fn export_selected_nodes_in_both_formats() {
    let (graph, traversal) = abcd();
    // Reverse duplicate of A–B collapses into one link
    graph.add_edge("B", "A", relationship::REFERENCES, 0.4, Metadata::new()).unwrap();

    let selection = vec!["A".to_string(), "B".to_string(), "C".to_string()];
    let viz = traversal.visualization(Some(&selection)).unwrap();
    let ids: Vec<&str> = viz.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
    assert_eq!(viz.links.len(), 2, "A–D dropped, B→A merged into A–B");
    assert_eq!(viz.links[0].relationship, relationship::SIMILAR_TO);
    for n in &viz.nodes {
        assert!((10.0..=100.0).contains(&n.value));
    }
    assert!(viz.nodes.iter().any(|n| (n.value - 100.0).abs() < 1e-9));

    let node_link = traversal
        .export_for_visualization(Some(&selection), ExportFormat::NodeLink)
        .unwrap();
    assert_eq!(node_link["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(node_link["links"][0]["source"], "A");

    let cytoscape = traversal
        .export_for_visualization(Some(&selection), ExportFormat::Cytoscape)
        .unwrap();
    assert_eq!(cytoscape["elements"]["nodes"][1]["data"]["id"], "B");
    assert_eq!(cytoscape["elements"]["edges"].as_array().unwrap().len(), 2);
}

#[test]
fn export_defaults_to_ranked_nodes() {
    let (_, traversal) = abcd();
    let value = traversal.export_for_visualization(None, ExportFormat::default()).unwrap();
    assert_eq!(value["nodes"].as_array().unwrap().len(), 4);
    assert_eq!(value["links"].as_array().unwrap().len(), 3);
}

#[test]
fn node_and_edge_creation_is_idempotent() {
    let (graph, _, _) = graph();
    let first = graph
        .add_node("doc", ContentType::Document, Some("Doc"), Metadata::new())
        .unwrap();
    let again = graph
        .add_node("doc", ContentType::Document, Some("Renamed"), Metadata::new())
        .unwrap();
    assert_eq!(first, again);
    node(&graph, "other");

    let e1 = graph.add_edge("doc", "other", relationship::REFERENCES, 0.5, Metadata::new()).unwrap();
    let e2 = graph.add_edge("doc", "other", relationship::REFERENCES, 0.9, Metadata::new()).unwrap();
    assert_eq!(e1, e2);

    let stats = graph.graph_stats().unwrap();
    assert_eq!(stats.node_count, 2);
    assert_eq!(stats.edge_count, 1);
}

#[test]
fn edges_to_unknown_content_fail() {
    let (graph, _, _) = graph();
    node(&graph, "known");
    let err = graph
        .add_edge("known", "missing", relationship::REFERENCES, 0.5, Metadata::new())
        .unwrap_err();
    assert!(matches!(err, GraphError::NotFound(_)));
}

#[test]
fn edges_auto_create_nodes_from_content() {
    let store = common::store_with(&[("m1", "first"), ("m2", "second")]);
    let graph = ContentGraph::new(store.clone(), store.clone());
    graph.add_edge("m1", "m2", relationship::FOLLOWED_BY, 0.5, Metadata::new()).unwrap();

    let node = graph.get_node_by_content("m2").unwrap().unwrap();
    assert_eq!(node.content_type, ContentType::Email);
    assert_eq!(graph.find_shortest_path("m1", "m2", 3).unwrap(), Some(vec!["m1".into(), "m2".into()]));
}

#[test]
fn graph_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.db");
    {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let graph = ContentGraph::new(store.clone(), store);
        node(&graph, "A");
        node(&graph, "B");
        graph.add_edge("A", "B", relationship::REFERENCES, 0.5, Metadata::new()).unwrap();
    }

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let traversal = GraphTraversal::new(store);
    let reached: Vec<String> = traversal.bfs("A", 1, None).unwrap().map(|v| v.node.content_id).collect();
    assert_eq!(reached, vec!["A", "B"]);
}
