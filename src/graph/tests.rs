//! Serialization tests with stored-shape fixtures

use serde_json::{json, Value};

/// Fixture: node as written by the export and the CLI
fn node_fixture() -> Value {
    json!({
        "id": "0f8c1d7e-3a52-4f7e-9a0b-6d1f2c3b4a59",
        "content_id": "msg-1042",
        "content_type": "email",
        "title": "Quarterly planning",
        "metadata": {
            "sender": "alice@example.com",
            "thread_size": 4,
            "score": 0.25,
            "flagged": false
        },
        "created_at": "2025-03-01T10:00:00Z"
    })
}

/// Fixture: edge as written by the export and the CLI
fn edge_fixture() -> Value {
    json!({
        "id": "6a3e2b10-99c4-4c84-8e7d-4b1e5a7f0c21",
        "source": "0f8c1d7e-3a52-4f7e-9a0b-6d1f2c3b4a59",
        "target": "1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e5f",
        "relationship": "similar_to",
        "strength": 0.82,
        "metadata": {},
        "created_at": "2025-03-01T10:05:00Z"
    })
}

#[cfg(test)]
mod serialization_tests {
    use super::*;
    use crate::graph::{
        edge::{relationship, Edge},
        node::{parse_metadata, ContentType, MetadataValue, Node, NodeId},
    };

    #[test]
    fn node_id_serializes_as_string() {
        let id = NodeId::parse_str("0f8c1d7e-3a52-4f7e-9a0b-6d1f2c3b4a59").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"0f8c1d7e-3a52-4f7e-9a0b-6d1f2c3b4a59\"");
    }

    #[test]
    fn content_type_serializes_lowercase() {
        let json = serde_json::to_string(&ContentType::Email).unwrap();
        assert_eq!(json, "\"email\"");

        let json = serde_json::to_string(&ContentType::Other("voicemail".into())).unwrap();
        assert_eq!(json, "\"voicemail\"");
    }

    #[test]
    fn content_type_unknown_survives_as_other() {
        let ct: ContentType = serde_json::from_str("\"voicemail\"").unwrap();
        assert_eq!(ct, ContentType::Other("voicemail".to_string()));

        let ct: ContentType = serde_json::from_str("\"document\"").unwrap();
        assert_eq!(ct, ContentType::Document);
    }

    #[test]
    fn metadata_accepts_primitives() {
        let metadata = parse_metadata(r#"{"a": 1, "b": 1.5, "c": "x", "d": true, "e": null}"#).unwrap();
        assert_eq!(metadata["a"], MetadataValue::Int(1));
        assert_eq!(metadata["b"], MetadataValue::Float(1.5));
        assert_eq!(metadata["c"].as_str(), Some("x"));
        assert_eq!(metadata["d"], MetadataValue::Bool(true));
        assert_eq!(metadata["e"], MetadataValue::Null);
    }

    #[test]
    fn metadata_rejects_nested_values() {
        assert!(parse_metadata(r#"{"a": {"b": 1}}"#).is_err());
        assert!(parse_metadata(r#"{"a": [1, 2]}"#).is_err());
        assert!(parse_metadata("[1, 2]").is_err());
        assert!(parse_metadata("").unwrap().is_empty());
    }

    #[test]
    fn node_roundtrip() {
        let node = Node::new("msg-1", ContentType::Message)
            .with_title("hello")
            .with_metadata("sender", "bob@example.com");

        let json = serde_json::to_string(&node).unwrap();
        let node2: Node = serde_json::from_str(&json).unwrap();

        assert_eq!(node, node2);
        assert_eq!(node2.label(), "hello");
    }

    #[test]
    fn node_label_falls_back_to_content_id() {
        let node = Node::new("msg-1", ContentType::Message);
        assert_eq!(node.label(), "msg-1");
    }

    #[test]
    fn can_deserialize_node_fixture() {
        let result: Result<Node, _> = serde_json::from_value(node_fixture());
        assert!(result.is_ok(), "Failed to deserialize node fixture: {:?}", result.err());

        let node = result.unwrap();
        assert_eq!(node.content_id, "msg-1042");
        assert_eq!(node.content_type, ContentType::Email);
        assert_eq!(node.metadata["thread_size"], MetadataValue::Int(4));
    }

    #[test]
    fn can_deserialize_edge_fixture() {
        let result: Result<Edge, _> = serde_json::from_value(edge_fixture());
        assert!(result.is_ok(), "Failed to deserialize edge fixture: {:?}", result.err());

        let edge = result.unwrap();
        assert_eq!(edge.relationship, relationship::SIMILAR_TO);
        assert!((edge.strength - 0.82).abs() < 1e-6);
    }

    #[test]
    fn edge_strength_is_clamped() {
        let edge = Edge::new(NodeId::new(), NodeId::new(), "references").with_strength(3.0);
        assert_eq!(edge.strength, 1.0);
    }

    #[test]
    fn symmetric_edges_walk_both_ways() {
        let (a, b) = (NodeId::new(), NodeId::new());

        let similar = Edge::new(a, b, relationship::SIMILAR_TO);
        assert_eq!(similar.walkable_from(&a), Some(b));
        assert_eq!(similar.walkable_from(&b), Some(a));

        let references = Edge::new(a, b, relationship::REFERENCES);
        assert_eq!(references.walkable_from(&a), Some(b));
        assert_eq!(references.walkable_from(&b), None);
    }
}
