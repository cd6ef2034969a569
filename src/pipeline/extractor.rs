//! Entity extraction collaborator

use crate::storage::{EntityRelationship, ExtractedEntity};
use regex_lite::Regex;
use std::collections::HashSet;
use thiserror::Error;

/// Relationship emitted between entities found in the same document
pub const CO_OCCURS_WITH: &str = "co_occurs_with";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction failed: {0}")]
    Failed(String),

    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex_lite::Error),
}

/// Document context passed alongside the text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionContext {
    pub subject: Option<String>,
    pub sender: Option<String>,
    /// External evidence reference, if the document carries one
    pub evidence_ref: Option<String>,
}

/// Entities and relationships found in one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub entities: Vec<ExtractedEntity>,
    pub relationships: Vec<EntityRelationship>,
}

/// Extracts entities from document text
///
/// Calls are blocking and may be slow; the pipeline never preempts them.
pub trait EntityExtractor: Send + Sync {
    fn extract(
        &self,
        text: &str,
        document_id: &str,
        context: &ExtractionContext,
    ) -> Result<Extraction, ExtractionError>;
}

/// Pattern-based extractor for e-mail addresses, URLs and monetary amounts
///
/// Every pair of distinct entities in a document is linked with
/// `co_occurs_with`. The sender from the context is reported as an
/// e-mail entity with an empty span when it does not occur in the text.
#[derive(Debug, Clone)]
pub struct PatternEntityExtractor {
    patterns: Vec<(&'static str, Regex, f32)>,
}

impl PatternEntityExtractor {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            patterns: vec![
                ("email", Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?, 0.95),
                ("url", Regex::new(r#"https?://[^\s<>"')\]]+"#)?, 0.9),
                ("money", Regex::new(r"[$€£]\s?[0-9][0-9,]*(?:\.[0-9]{2})?")?, 0.8),
            ],
        })
    }
}

impl EntityExtractor for PatternEntityExtractor {
    fn extract(
        &self,
        text: &str,
        _document_id: &str,
        context: &ExtractionContext,
    ) -> Result<Extraction, ExtractionError> {
        let mut seen: HashSet<(String, &str)> = HashSet::new();
        let mut entities = Vec::new();

        for (entity_type, pattern, confidence) in &self.patterns {
            for m in pattern.find_iter(text) {
                let value = m.as_str().trim_end_matches(&['.', ','][..]);
                if seen.insert((value.to_lowercase(), *entity_type)) {
                    entities.push(ExtractedEntity {
                        text: value.to_string(),
                        entity_type: entity_type.to_string(),
                        confidence: *confidence,
                        span: (m.start(), m.start() + value.len()),
                    });
                }
            }
        }

        if let Some(sender) = context.sender.as_deref().map(str::trim).filter(|s| s.contains('@')) {
            if seen.insert((sender.to_lowercase(), "email")) {
                entities.push(ExtractedEntity {
                    text: sender.to_string(),
                    entity_type: "email".to_string(),
                    confidence: 1.0,
                    span: (0, 0),
                });
            }
        }

        let mut relationships = Vec::new();
        for (i, a) in entities.iter().enumerate() {
            for b in &entities[i + 1..] {
                relationships.push(EntityRelationship {
                    source: a.text.clone(),
                    target: b.text.clone(),
                    relationship: CO_OCCURS_WITH.to_string(),
                    confidence: a.confidence.min(b.confidence),
                });
            }
        }

        Ok(Extraction {
            entities,
            relationships,
        })
    }
}
