//! Related-content ranking and temporal context

use super::snapshot::GraphSnapshot;
use super::traverse::Bfs;
use super::types::{RelatedItem, TimelineContext, TimelineEntry};
use crate::graph::{relationship, Node};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Strength assumed for a hop without a recorded edge strength
const DEFAULT_HOP_STRENGTH: f32 = 0.5;

/// Related items returned alongside a timeline context
const TIMELINE_RELATED_LIMIT: usize = 10;

/// Rank nodes reachable from `content_id`
///
/// Each node found by BFS (excluding the start) scores
/// `(1 / (depth + 1)) * strength_of_last_hop`. Returns the top `limit`
/// by descending score; equal scores keep discovery order.
pub fn find_related_content(
    snapshot: Arc<GraphSnapshot>,
    content_id: &str,
    relationships: Option<Vec<String>>,
    max_depth: usize,
    limit: usize,
) -> Vec<RelatedItem> {
    let mut related: Vec<RelatedItem> = Bfs::new(snapshot, content_id, max_depth, relationships)
        .filter(|visit| visit.depth > 0)
        .map(|visit| {
            let strength = visit.via_strength.unwrap_or(DEFAULT_HOP_STRENGTH);
            RelatedItem {
                score: strength / (visit.depth as f32 + 1.0),
                content_id: visit.node.content_id,
                content_type: visit.node.content_type,
                title: visit.node.title,
                depth: visit.depth,
                relationship: visit.relationship,
                path: visit.path,
            }
        })
        .collect();

    related.sort_by(|a, b| b.score.total_cmp(&a.score));
    related.truncate(limit);
    related
}

/// When a node happened: metadata `date` if it parses as RFC 3339, else creation time
pub fn event_time(node: &Node) -> DateTime<Utc> {
    node.metadata
        .get("date")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(node.created_at)
}

/// Partition temporal edges touching a node into before / after / concurrent
///
/// `followed_by` from the centre puts the neighbour after it; `preceded_by`
/// puts it before; the reverse stored direction flips the side.
/// `concurrent_with` is concurrent either way. With a `window`, neighbours
/// whose event time is further than the window from the centre are
/// dropped. `include_related` adds depth-1 `similar_to`/`references`
/// neighbours.
pub fn get_timeline_context(
    snapshot: Arc<GraphSnapshot>,
    content_id: &str,
    window: Option<Duration>,
    include_related: bool,
) -> Option<TimelineContext> {
    let center = snapshot.index_of(content_id)?;
    let center_time = event_time(snapshot.node(center));

    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut concurrent = Vec::new();

    let touching = snapshot.outgoing(center).iter().chain(snapshot.incoming(center));
    for &e in touching {
        let edge = snapshot.edge(e);
        if !relationship::is_temporal(&edge.relationship) {
            continue;
        }
        let (src, tgt) = snapshot.endpoints(e);
        let center_is_source = src == center;
        let other = if center_is_source { tgt } else { src };
        if other == center {
            continue;
        }

        let neighbour = snapshot.node(other);
        let neighbour_time = event_time(neighbour);
        if let Some(window) = window {
            if (neighbour_time - center_time).abs() > window {
                continue;
            }
        }

        let entry = TimelineEntry {
            content_id: neighbour.content_id.clone(),
            title: neighbour.title.clone(),
            relationship: edge.relationship.clone(),
            strength: edge.strength,
            event_time: neighbour_time.to_rfc3339(),
        };

        match (edge.relationship.as_str(), center_is_source) {
            (relationship::FOLLOWED_BY, true) | (relationship::PRECEDED_BY, false) => after.push(entry),
            (relationship::PRECEDED_BY, true) | (relationship::FOLLOWED_BY, false) => before.push(entry),
            _ => concurrent.push(entry),
        }
    }

    for list in [&mut before, &mut after, &mut concurrent] {
        list.sort_by(|a, b| a.event_time.cmp(&b.event_time));
        list.dedup_by(|a, b| a.content_id == b.content_id);
    }

    let related = if include_related {
        let filter = vec![relationship::SIMILAR_TO.to_string(), relationship::REFERENCES.to_string()];
        find_related_content(snapshot.clone(), content_id, Some(filter), 1, TIMELINE_RELATED_LIMIT)
    } else {
        Vec::new()
    };

    Some(TimelineContext {
        content_id: content_id.to_string(),
        event_time: center_time.to_rfc3339(),
        before,
        after,
        concurrent,
        related,
    })
}
