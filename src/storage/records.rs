//! Persisted record types beyond graph nodes and edges

use crate::graph::{ContentType, Metadata};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A piece of ingested content as held by the content store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: String,
    pub title: Option<String>,
    pub body: String,
    pub content_type: ContentType,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl Content {
    pub fn new(id: impl Into<String>, content_type: ContentType, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            body: body.into(),
            content_type,
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<crate::graph::MetadataValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Text used for embedding and extraction: title, blank line, body
    pub fn text(&self) -> String {
        match &self.title {
            Some(title) if !title.is_empty() => format!("{}\n\n{}", title, self.body),
            _ => self.body.clone(),
        }
    }

    /// Metadata string value by key
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Filter criteria for listing content
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub content_type: Option<ContentType>,
    pub limit: Option<usize>,
}

impl ContentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Cached similarity score for an unordered pair of content ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityCacheEntry {
    /// Order-independent hash of (id1, id2)
    pub pair_hash: String,
    /// Lexicographically smaller id of the pair
    pub id1: String,
    pub id2: String,
    /// `None` when the score is undefined (e.g. an empty embedding)
    pub score: Option<f32>,
    /// Wall time spent computing the score, in milliseconds
    pub computation_ms: f64,
    pub created_at: DateTime<Utc>,
}

/// An entity found in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub text: String,
    pub entity_type: String,
    pub confidence: f32,
    /// Byte offsets into the extracted text
    pub span: (usize, usize),
}

/// A relationship between two entities of the same document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRelationship {
    pub source: String,
    pub target: String,
    pub relationship: String,
    pub confidence: f32,
}

/// A dated event attached to a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Content-derived dedup key
    pub event_hash: String,
    pub document_id: String,
    pub event_date: NaiveDate,
    pub event_type: String,
    pub description: String,
    /// Text surrounding the date mention, if any
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
}
