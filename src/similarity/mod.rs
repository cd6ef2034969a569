//! Embedding-based content similarity with a two-level cache
//!
//! Scores are looked up in an in-process map first, then in the persistent
//! `SimilarityCache`, and only computed (and written through to both) on a
//! miss. Cache keys are order-independent, so `(a, b)` and `(b, a)` share
//! one entry. Entries are never invalidated when content changes; only
//! `clear_cache` removes them.

mod embedding;

pub use embedding::{cosine_similarity, EmbeddingError, EmbeddingService};

#[cfg(feature = "embeddings")]
pub use embedding::FastEmbedService;

use crate::error::{FailureKind, ItemFailure};
use crate::graph::{relationship, ContentGraph, Metadata};
use crate::storage::{ContentFilter, ContentStore, SimilarityCache, SimilarityCacheEntry, StorageError};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors from similarity computation
#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("Similarity computation failed: {0}")]
    Computation(#[from] EmbeddingError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

impl SimilarityError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SimilarityError::Computation(_) => FailureKind::Computation,
            SimilarityError::Persistence(_) => FailureKind::Persistence,
            SimilarityError::Validation(_) => FailureKind::Validation,
        }
    }
}

pub type SimilarityResult<T> = Result<T, SimilarityError>;

/// Similarity settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Minimum score for a pair to count as similar
    pub threshold: f32,
    /// Log batch progress every this many pairs (0 disables)
    pub progress_interval: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            progress_interval: 100,
        }
    }
}

impl SimilarityConfig {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!("similarity threshold must be within [0, 1], got {}", self.threshold));
        }
        Ok(())
    }
}

/// A scored unordered pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarPair {
    pub id1: String,
    pub id2: String,
    pub score: f32,
}

/// Outcome of a batch similarity run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSimilarityReport {
    /// Pairs at or above the threshold, in enumeration order
    pub pairs: Vec<SimilarPair>,
    /// Pairs examined
    pub compared: usize,
    /// `similar_to` edges written (only by `link_similar`)
    pub linked: usize,
    pub failures: Vec<ItemFailure>,
}

/// Summary statistics over cached scores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityDistribution {
    pub count: usize,
    pub mean: f32,
    pub median: f32,
    pub std_dev: f32,
    pub min: f32,
    pub max: f32,
    pub above_threshold: usize,
}

/// Order-independent cache key for a pair of content ids
pub fn pair_hash(id1: &str, id2: &str) -> String {
    let (lo, hi) = ordered(id1, id2);
    let key = format!("{}:{}|{}", lo.len(), lo, hi);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

/// Summary statistics over a set of scores; `None` for an empty set
pub fn summarize(mut scores: Vec<f32>, threshold: f32) -> Option<SimilarityDistribution> {
    if scores.is_empty() {
        return None;
    }
    scores.sort_by(|a, b| a.total_cmp(b));

    let count = scores.len();
    let mean = scores.iter().sum::<f32>() / count as f32;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / count as f32;
    let median = if count % 2 == 0 {
        (scores[count / 2 - 1] + scores[count / 2]) / 2.0
    } else {
        scores[count / 2]
    };

    Some(SimilarityDistribution {
        count,
        mean,
        median,
        std_dev: variance.sqrt(),
        min: scores[0],
        max: scores[count - 1],
        above_threshold: scores.iter().filter(|&&s| s >= threshold).count(),
    })
}

fn ordered<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

pub struct SimilarityEngine {
    content: Arc<dyn ContentStore>,
    cache: Arc<dyn SimilarityCache>,
    embedder: Arc<dyn EmbeddingService>,
    memory: DashMap<String, Option<f32>>,
    config: SimilarityConfig,
}

impl SimilarityEngine {
    /// Create an engine; an out-of-range threshold is rejected here
    pub fn new(
        content: Arc<dyn ContentStore>,
        cache: Arc<dyn SimilarityCache>,
        embedder: Arc<dyn EmbeddingService>,
        config: SimilarityConfig,
    ) -> SimilarityResult<Self> {
        config.validate().map_err(SimilarityError::Validation)?;
        Ok(Self {
            content,
            cache,
            embedder,
            memory: DashMap::new(),
            config,
        })
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Similarity of two pieces of content
    ///
    /// `Ok(None)` when either content is missing or the score is undefined
    /// (an empty embedding). Cosine scores are clamped into [0, 1].
    pub fn compute_similarity(&self, id1: &str, id2: &str) -> SimilarityResult<Option<f32>> {
        if id1 == id2 {
            return Ok(Some(1.0));
        }

        let hash = pair_hash(id1, id2);
        if let Some(cached) = self.memory.get(&hash) {
            return Ok(*cached);
        }
        if let Some(entry) = self.cache.get_similarity(&hash)? {
            self.memory.insert(hash, entry.score);
            return Ok(entry.score);
        }

        let (lo, hi) = ordered(id1, id2);
        let (Some(first), Some(second)) = (self.content.get_content(lo)?, self.content.get_content(hi)?) else {
            debug!(id1, id2, "similarity skipped, content not found");
            return Ok(None);
        };

        let started = Instant::now();
        let (text1, text2) = (first.text(), second.text());
        let vectors = self.embedder.batch_encode(&[text1.as_str(), text2.as_str()])?;
        let [v1, v2] = <[Vec<f32>; 2]>::try_from(vectors).map_err(|v| EmbeddingError::CountMismatch {
            expected: 2,
            got: v.len(),
        })?;
        if !v1.is_empty() && !v2.is_empty() && v1.len() != v2.len() {
            warn!(id1, id2, left = v1.len(), right = v2.len(), "embedding dimensions differ");
            return Err(EmbeddingError::DimensionMismatch {
                left: v1.len(),
                right: v2.len(),
            }
            .into());
        }
        let score = if v1.is_empty() || v2.is_empty() {
            None
        } else {
            Some(cosine_similarity(&v1, &v2).clamp(0.0, 1.0))
        };

        self.cache.put_similarity(&SimilarityCacheEntry {
            pair_hash: hash.clone(),
            id1: lo.to_string(),
            id2: hi.to_string(),
            score,
            computation_ms: started.elapsed().as_secs_f64() * 1000.0,
            created_at: Utc::now(),
        })?;
        self.memory.insert(hash, score);
        Ok(score)
    }

    /// Score every unordered pair of `ids`, keeping those at or above the threshold
    ///
    /// A failed pair is recorded and the batch continues.
    pub fn batch_compute_similarities<S: AsRef<str>>(&self, ids: &[S]) -> BatchSimilarityReport {
        let total = ids.len() * ids.len().saturating_sub(1) / 2;
        let mut report = BatchSimilarityReport::default();
        info!(documents = ids.len(), pairs = total, "batch similarity started");

        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                let (a, b) = (a.as_ref(), b.as_ref());
                match self.compute_similarity(a, b) {
                    Ok(Some(score)) if score >= self.config.threshold => report.pairs.push(SimilarPair {
                        id1: a.to_string(),
                        id2: b.to_string(),
                        score,
                    }),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(id1 = a, id2 = b, error = %e, "similarity failed");
                        report
                            .failures
                            .push(ItemFailure::new(format!("{}|{}", a, b), e.kind(), e.to_string()));
                    }
                }
                report.compared += 1;
                if self.config.progress_interval > 0 && report.compared % self.config.progress_interval == 0 {
                    info!(done = report.compared, total, "batch similarity progress");
                }
            }
        }

        info!(
            compared = report.compared,
            similar = report.pairs.len(),
            failed = report.failures.len(),
            "batch similarity finished"
        );
        report
    }

    /// Most similar other content above the threshold, best first
    pub fn find_similar_content(&self, id: &str, limit: usize) -> SimilarityResult<Vec<SimilarPair>> {
        let mut similar = Vec::new();
        for other in self.content.list_content_ids(&ContentFilter::new())? {
            if other == id {
                continue;
            }
            match self.compute_similarity(id, &other) {
                Ok(Some(score)) if score >= self.config.threshold => similar.push(SimilarPair {
                    id1: id.to_string(),
                    id2: other,
                    score,
                }),
                Ok(_) => {}
                Err(e) => warn!(id, other = %other, error = %e, "similarity failed"),
            }
        }

        similar.sort_by(|a, b| b.score.total_cmp(&a.score));
        similar.truncate(limit);
        Ok(similar)
    }

    /// Drop persistent entries older than `older_than` (or all), and the whole in-process cache
    pub fn clear_cache(&self, older_than: Option<Duration>) -> SimilarityResult<usize> {
        let cutoff = older_than.map(|age| Utc::now() - age);
        let removed = self.cache.clear_similarities(cutoff)?;
        self.memory.clear();
        info!(removed, "similarity cache cleared");
        Ok(removed)
    }

    /// Statistics over all cached scores; `None` when nothing is cached
    pub fn get_similarity_distribution(&self) -> SimilarityResult<Option<SimilarityDistribution>> {
        Ok(summarize(self.cache.similarity_scores()?, self.config.threshold))
    }

    /// Batch-score `ids` and write a `similar_to` edge (strength = score) per similar pair
    pub fn link_similar<S: AsRef<str>>(&self, graph: &ContentGraph, ids: &[S]) -> BatchSimilarityReport {
        let mut report = self.batch_compute_similarities(ids);
        for pair in &report.pairs {
            let mut metadata = Metadata::new();
            metadata.insert("source".to_string(), "similarity".into());
            match graph.add_edge(&pair.id1, &pair.id2, relationship::SIMILAR_TO, pair.score, metadata) {
                Ok(_) => report.linked += 1,
                Err(e) => {
                    warn!(id1 = %pair.id1, id2 = %pair.id2, error = %e, "similar_to edge not written");
                    report.failures.push(ItemFailure::new(
                        format!("{}|{}", pair.id1, pair.id2),
                        e.kind(),
                        e.to_string(),
                    ));
                }
            }
        }
        report
    }
}

impl std::fmt::Debug for SimilarityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityEngine")
            .field("config", &self.config)
            .field("memory_entries", &self.memory.len())
            .finish_non_exhaustive()
    }
}
