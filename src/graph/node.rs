//! Node representation in the content graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for a node
///
/// Internal surrogate key; callers address nodes by content id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Create a new random NodeId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a NodeId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a NodeId from its hyphenated string form
    pub fn parse_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content type classification
///
/// Persisted as a lowercase string; unknown values survive as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentType {
    Email,
    Message,
    Document,
    File,
    Entity,
    Other(String),
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Email => "email",
            ContentType::Message => "message",
            ContentType::Document => "document",
            ContentType::File => "file",
            ContentType::Entity => "entity",
            ContentType::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for ContentType {
    fn from(s: &str) -> Self {
        match s {
            "email" => ContentType::Email,
            "message" => ContentType::Message,
            "document" => ContentType::Document,
            "file" => ContentType::File,
            "entity" => ContentType::Entity,
            other => ContentType::Other(other.to_string()),
        }
    }
}

impl From<String> for ContentType {
    fn from(s: String) -> Self {
        ContentType::from(s.as_str())
    }
}

impl From<ContentType> for String {
    fn from(ct: ContentType) -> Self {
        ct.as_str().to_string()
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primitive metadata values
///
/// Metadata is deliberately flat: nested arrays or objects are rejected
/// when parsing from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Null,
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Int(n) => Some(*n as f64),
            MetadataValue::Float(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        MetadataValue::Int(n)
    }
}

impl From<f64> for MetadataValue {
    fn from(n: f64) -> Self {
        MetadataValue::Float(n)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

/// Ordered string-keyed metadata map
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Parse a JSON object of primitives into `Metadata`.
///
/// Returns the serde error message on malformed input (non-object,
/// nested values) so callers can surface it as a structured failure.
pub fn parse_metadata(json: &str) -> Result<Metadata, String> {
    if json.trim().is_empty() {
        return Ok(Metadata::new());
    }
    serde_json::from_str(json).map_err(|e| e.to_string())
}

/// A node in the content graph: one piece of ingested content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Internal surrogate identifier
    pub id: NodeId,
    /// Key into the external content store (unique per graph)
    pub content_id: String,
    pub content_type: ContentType,
    pub title: Option<String>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl Node {
    /// Create a new node for the given content
    pub fn new(content_id: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            id: NodeId::new(),
            content_id: content_id.into(),
            content_type,
            title: None,
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Title if present, otherwise the content id
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.content_id)
    }
}
