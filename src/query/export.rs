//! Subgraph export for visualization front-ends

use super::rank::PageRankResult;
use super::snapshot::GraphSnapshot;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::str::FromStr;

/// Nodes selected when the caller does not name any
pub const DEFAULT_EXPORT_NODES: usize = 50;

/// Output layout for exported subgraphs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// `{ "nodes": [...], "links": [...] }` (d3 force layout)
    #[default]
    NodeLink,
    /// `{ "elements": { "nodes": [{data}], "edges": [{data}] } }`
    Cytoscape,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node-link" | "nodelink" | "d3" => Ok(ExportFormat::NodeLink),
            "cytoscape" => Ok(ExportFormat::Cytoscape),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VizNode {
    pub id: String,
    pub label: String,
    /// Content type, used for colouring
    pub group: String,
    /// Display size scaled from PageRank into [10, 100]
    pub value: f64,
    pub pagerank: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VizLink {
    pub source: String,
    pub target: String,
    pub relationship: String,
    pub strength: f32,
}

/// An induced subgraph ready for rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Visualization {
    pub nodes: Vec<VizNode>,
    pub links: Vec<VizLink>,
}

impl Visualization {
    /// Build from a node selection (content ids) or the top nodes by PageRank
    ///
    /// Only edges with both endpoints selected are kept, and each
    /// unordered endpoint pair appears once (first stored edge wins).
    pub fn build(snapshot: &GraphSnapshot, ranks: &PageRankResult, node_ids: Option<&[String]>) -> Self {
        let selected: Vec<usize> = match node_ids {
            Some(ids) => {
                let mut seen = HashSet::new();
                ids.iter()
                    .filter_map(|id| snapshot.index_of(id))
                    .filter(|idx| seen.insert(*idx))
                    .collect()
            }
            None => ranks
                .top(DEFAULT_EXPORT_NODES)
                .iter()
                .filter_map(|(id, _)| snapshot.index_of(id))
                .collect(),
        };

        let max_score = selected
            .iter()
            .filter_map(|&i| ranks.score(&snapshot.node(i).content_id))
            .fold(0.0_f64, f64::max);

        let nodes = selected
            .iter()
            .map(|&i| {
                let node = snapshot.node(i);
                let pagerank = ranks.score(&node.content_id).unwrap_or(0.0);
                let value = if max_score > 0.0 {
                    10.0 + 90.0 * pagerank / max_score
                } else {
                    10.0
                };
                VizNode {
                    id: node.content_id.clone(),
                    label: node.label().to_string(),
                    group: node.content_type.to_string(),
                    value,
                    pagerank,
                }
            })
            .collect();

        let members: HashSet<usize> = selected.iter().copied().collect();
        let mut pairs: HashSet<(usize, usize)> = HashSet::new();
        let mut links = Vec::new();
        for (e, edge) in snapshot.edges().iter().enumerate() {
            let (src, tgt) = snapshot.endpoints(e);
            if !members.contains(&src) || !members.contains(&tgt) {
                continue;
            }
            if !pairs.insert((src.min(tgt), src.max(tgt))) {
                continue;
            }
            links.push(VizLink {
                source: snapshot.node(src).content_id.clone(),
                target: snapshot.node(tgt).content_id.clone(),
                relationship: edge.relationship.clone(),
                strength: edge.strength,
            });
        }

        Self { nodes, links }
    }

    /// Render in the requested layout
    pub fn render(&self, format: ExportFormat) -> Value {
        match format {
            ExportFormat::NodeLink => json!({
                "nodes": self.nodes,
                "links": self.links,
            }),
            ExportFormat::Cytoscape => {
                let nodes: Vec<Value> = self
                    .nodes
                    .iter()
                    .map(|n| json!({ "data": n }))
                    .collect();
                let edges: Vec<Value> = self
                    .links
                    .iter()
                    .enumerate()
                    .map(|(i, l)| {
                        json!({
                            "data": {
                                "id": format!("e{}", i),
                                "source": l.source,
                                "target": l.target,
                                "relationship": l.relationship,
                                "strength": l.strength,
                            }
                        })
                    })
                    .collect();
                json!({ "elements": { "nodes": nodes, "edges": edges } })
            }
        }
    }
}
