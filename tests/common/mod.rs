//! Shared fixtures for Tessera integration tests
//!
//! Mock collaborators are deterministic; each test builds its own
//! in-memory store so tests never share state.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tessera::pipeline::{EntityExtractor, Extraction, ExtractionContext, ExtractionError};
use tessera::similarity::EmbeddingError;
use tessera::storage::ExtractedEntity;
use tessera::{Content, ContentType, EmbeddingService, OpenStore, SqliteStore};

/// Vocabulary used by `BagOfWordsEmbedder`; one dimension per word
pub const VOCABULARY: &[&str] = &["travel", "journey", "trip", "vote", "election", "budget"];

/// Embeds text as word counts over `VOCABULARY` and counts its calls
#[derive(Default)]
pub struct BagOfWordsEmbedder {
    calls: AtomicUsize,
    texts: AtomicUsize,
}

impl BagOfWordsEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `batch_encode` invocations so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of texts embedded so far
    pub fn texts(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }
}

impl EmbeddingService for BagOfWordsEmbedder {
    fn batch_encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let words: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric()).collect();
                VOCABULARY
                    .iter()
                    .map(|term| words.iter().filter(|w| *w == term).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Fails for document ids listed at construction, succeeds with no entities otherwise
pub struct FailingExtractor {
    fail_on: Vec<String>,
}

impl FailingExtractor {
    pub fn new(fail_on: &[&str]) -> Self {
        Self {
            fail_on: fail_on.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl EntityExtractor for FailingExtractor {
    fn extract(
        &self,
        text: &str,
        document_id: &str,
        _context: &ExtractionContext,
    ) -> Result<Extraction, ExtractionError> {
        if self.fail_on.iter().any(|id| id == document_id) {
            return Err(ExtractionError::Failed(format!("refused {}", document_id)));
        }
        let first = text.split_whitespace().next().unwrap_or_default();
        Ok(Extraction {
            entities: vec![ExtractedEntity {
                text: first.to_string(),
                entity_type: "word".to_string(),
                confidence: 0.5,
                span: (0, first.len()),
            }],
            relationships: Vec::new(),
        })
    }
}

/// Sleeps before returning an empty extraction
pub struct SlowExtractor {
    delay: Duration,
}

impl SlowExtractor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl EntityExtractor for SlowExtractor {
    fn extract(
        &self,
        _text: &str,
        _document_id: &str,
        _context: &ExtractionContext,
    ) -> Result<Extraction, ExtractionError> {
        std::thread::sleep(self.delay);
        Ok(Extraction::default())
    }
}

/// In-memory store holding the given `(id, body)` pairs as e-mails
pub fn store_with(documents: &[(&str, &str)]) -> Arc<SqliteStore> {
    let store = Arc::new(SqliteStore::open_in_memory().expect("in-memory store"));
    for (id, body) in documents {
        store
            .put_content(&Content::new(*id, ContentType::Email, *body))
            .expect("content insert");
    }
    store
}

/// Four documents with dates, addresses and amounts for the enrichment steps
pub fn mailbox() -> Arc<SqliteStore> {
    let store = Arc::new(SqliteStore::open_in_memory().expect("in-memory store"));
    let mails = [
        Content::new("m1", ContentType::Email, "Invoice of $120.00 due 2024-03-15, pay alice@example.com")
            .with_title("Invoice")
            .with_metadata("sender", "billing@example.com")
            .with_metadata("date", "2024-03-01T09:00:00Z"),
        Content::new("m2", ContentType::Email, "See https://example.org/agenda before March 20, 2024")
            .with_title("Agenda")
            .with_metadata("sender", "bob@example.com")
            .with_metadata("date", "2024-03-02T10:30:00Z"),
        Content::new("m3", ContentType::Email, "Thanks, nothing else from me")
            .with_metadata("date", "2024-03-03"),
        Content::new("m4", ContentType::Message, "Lunch on 04/12/2024 with carol@example.com?"),
    ];
    for mail in &mails {
        store.put_content(mail).expect("content insert");
    }
    store
}
