//! Multi-step document enrichment
//!
//! `EnrichmentPipeline::run_for_messages` applies the configured steps to a
//! batch of documents in order. Each (document, step) ends up processed,
//! skipped (already done by an earlier run) or errored. Per-document
//! failures are counted and reported; they never stop the batch or the
//! remaining steps.
//!
//! Step timeouts are soft: elapsed time is checked after the step finishes
//! and an overrun is logged and flagged, not interrupted. A
//! [`CancellationToken`] can stop a run between documents.

mod cancel;
mod extractor;
mod timeline;
mod vector_index;

pub use cancel::CancellationToken;
pub use extractor::{
    EntityExtractor, Extraction, ExtractionContext, ExtractionError, PatternEntityExtractor, CO_OCCURS_WITH,
};
pub use timeline::{event_hash, TimelineExtractor, DATE_MENTIONED, DOCUMENT_OBSERVED};
pub use vector_index::{InMemoryVectorIndex, VectorIndex, VectorIndexError, VectorPoint};

use crate::config::ConfigError;
use crate::error::{FailureKind, ItemFailure};
use crate::graph::{relationship, ContentGraph, ContentType, Metadata, MetadataValue};
use crate::similarity::EmbeddingService;
use crate::storage::{Content, ContentStore, EnrichmentStore};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One enrichment step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Applied upstream; accepted in step lists and skipped
    Summary,
    Entities,
    Embeddings,
    Timeline,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Summary => "summary",
            Step::Entities => "entities",
            Step::Embeddings => "embeddings",
            Step::Timeline => "timeline",
        };
        f.write_str(s)
    }
}

/// Pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub steps: Vec<Step>,
    /// Entity records younger than this are reused
    pub entity_cache_ttl_hours: u64,
    /// Maximum texts per embedding request
    pub embedding_batch_size: usize,
    /// Soft per-step budget
    pub step_timeout_secs: u64,
    /// Seeds deterministic vector point ids
    pub vector_namespace: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            steps: vec![Step::Summary, Step::Entities, Step::Embeddings, Step::Timeline],
            entity_cache_ttl_hours: 24,
            embedding_batch_size: 32,
            step_timeout_secs: 300,
            vector_namespace: "tessera".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.embedding_batch_size == 0 {
            return Err("embedding_batch_size must be at least 1".to_string());
        }
        if self.vector_namespace.is_empty() {
            return Err("vector_namespace must not be empty".to_string());
        }
        Ok(())
    }

    /// Oldest entity record still reused; a TTL past chrono's range never expires
    pub fn entity_cutoff(&self) -> DateTime<Utc> {
        i64::try_from(self.entity_cache_ttl_hours)
            .ok()
            .and_then(TimeDelta::try_hours)
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

/// Counts for one step over one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PipelineStepResult {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub step: Step,
    pub result: PipelineStepResult,
    pub failures: Vec<ItemFailure>,
    /// Elapsed time exceeded the configured step timeout
    pub timed_out: bool,
}

/// Aggregate outcome of `run_for_messages`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    pub steps: Vec<StepReport>,
    /// The run stopped early on cancellation
    pub cancelled: bool,
}

impl PipelineReport {
    pub fn step(&self, step: Step) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.step == step)
    }

    pub fn total_errors(&self) -> usize {
        self.steps.iter().map(|s| s.result.errors).sum()
    }
}

enum Outcome {
    Processed,
    Skipped,
}

fn failure(id: &str, kind: FailureKind, error: impl fmt::Display) -> ItemFailure {
    ItemFailure::new(id, kind, error.to_string())
}

/// Deterministic vector point id for a document
pub fn vector_point_id(namespace: &str, document_id: &str) -> Uuid {
    let ns = Uuid::new_v5(&Uuid::NAMESPACE_OID, namespace.as_bytes());
    Uuid::new_v5(&ns, format!("message:{}", document_id).as_bytes())
}

/// Idempotent, batched document enrichment
pub struct EnrichmentPipeline {
    config: PipelineConfig,
    content: Arc<dyn ContentStore>,
    records: Arc<dyn EnrichmentStore>,
    extractor: Arc<dyn EntityExtractor>,
    embedder: Arc<dyn EmbeddingService>,
    vectors: Arc<dyn VectorIndex>,
    timeline: TimelineExtractor,
    graph: Option<ContentGraph>,
    cancel: Option<CancellationToken>,
}

impl EnrichmentPipeline {
    pub fn new(
        config: PipelineConfig,
        content: Arc<dyn ContentStore>,
        records: Arc<dyn EnrichmentStore>,
        extractor: Arc<dyn EntityExtractor>,
        embedder: Arc<dyn EmbeddingService>,
        vectors: Arc<dyn VectorIndex>,
    ) -> Result<Self, ConfigError> {
        config.validate().map_err(ConfigError::Validation)?;
        Ok(Self {
            config,
            content,
            records,
            extractor,
            embedder,
            vectors,
            timeline: TimelineExtractor::new()?,
            graph: None,
            cancel: None,
        })
    }

    /// Also write entity nodes and `contains_entities` edges
    pub fn with_graph(mut self, graph: ContentGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Run `steps` (or the configured steps) over the documents
    pub fn run_for_messages<S: AsRef<str>>(&self, ids: &[S], steps: Option<&[Step]>) -> PipelineReport {
        let ids: Vec<&str> = ids.iter().map(|id| id.as_ref()).collect();
        let steps = steps.unwrap_or(&self.config.steps);
        let mut report = PipelineReport::default();
        info!(documents = ids.len(), steps = steps.len(), "enrichment started");

        for &step in steps {
            if self.cancelled() {
                report.cancelled = true;
                break;
            }

            let started = Instant::now();
            let mut result = PipelineStepResult::default();
            let mut failures = Vec::new();

            match step {
                Step::Summary => {
                    debug!("summary step is applied upstream, skipping");
                    continue;
                }
                Step::Entities => {
                    self.run_per_document(&ids, &mut result, &mut failures, |id| self.enrich_entities(id))
                }
                Step::Embeddings => self.run_embeddings(&ids, &mut result, &mut failures),
                Step::Timeline => {
                    self.run_per_document(&ids, &mut result, &mut failures, |id| self.enrich_timeline(id))
                }
            }

            result.elapsed = started.elapsed();
            let timed_out = result.elapsed > self.config.step_timeout();
            if timed_out {
                warn!(
                    step = %step,
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    timeout_secs = self.config.step_timeout_secs,
                    "step exceeded timeout"
                );
            }
            info!(
                step = %step,
                processed = result.processed,
                skipped = result.skipped,
                errors = result.errors,
                elapsed_ms = result.elapsed.as_millis() as u64,
                "step finished"
            );

            report.steps.push(StepReport {
                step,
                result,
                failures,
                timed_out,
            });
            if self.cancelled() {
                report.cancelled = true;
                break;
            }
        }

        report
    }

    fn run_per_document(
        &self,
        ids: &[&str],
        result: &mut PipelineStepResult,
        failures: &mut Vec<ItemFailure>,
        enrich: impl Fn(&str) -> Result<Outcome, ItemFailure>,
    ) {
        for &id in ids {
            if self.cancelled() {
                break;
            }
            match enrich(id) {
                Ok(Outcome::Processed) => result.processed += 1,
                Ok(Outcome::Skipped) => result.skipped += 1,
                Err(f) => {
                    warn!(document = id, kind = %f.kind, error = %f.message, "enrichment failed");
                    result.errors += 1;
                    failures.push(f);
                }
            }
        }
    }

    fn load(&self, id: &str) -> Result<Content, ItemFailure> {
        self.content
            .get_content(id)
            .map_err(|e| failure(id, FailureKind::Persistence, e))?
            .ok_or_else(|| failure(id, FailureKind::NotFound, format!("content not found: {}", id)))
    }

    fn enrich_entities(&self, id: &str) -> Result<Outcome, ItemFailure> {
        if self
            .records
            .has_entity_record(id, self.config.entity_cutoff())
            .map_err(|e| failure(id, FailureKind::Persistence, e))?
        {
            return Ok(Outcome::Skipped);
        }

        let content = self.load(id)?;
        let context = ExtractionContext {
            subject: content.title.clone(),
            sender: content.meta_str("sender").map(str::to_string),
            evidence_ref: content.meta_str("evidence_ref").map(str::to_string),
        };
        let extraction = self
            .extractor
            .extract(&content.text(), id, &context)
            .map_err(|e| failure(id, FailureKind::Computation, e))?;

        // Graph links first: the extraction record is the completion marker
        if let Some(graph) = &self.graph {
            for entity in &extraction.entities {
                let entity_id = format!("entity:{}:{}", entity.entity_type, entity.text.to_lowercase());
                let mut metadata = Metadata::new();
                metadata.insert("entity_type".to_string(), entity.entity_type.clone().into());
                graph
                    .add_node(&entity_id, ContentType::Entity, Some(&entity.text), metadata)
                    .map_err(|e| failure(id, e.kind(), e))?;

                let mut edge_meta = Metadata::new();
                edge_meta.insert("span_start".to_string(), MetadataValue::Int(entity.span.0 as i64));
                graph
                    .add_edge(
                        id,
                        &entity_id,
                        relationship::CONTAINS_ENTITIES,
                        entity.confidence.clamp(0.0, 1.0),
                        edge_meta,
                    )
                    .map_err(|e| failure(id, e.kind(), e))?;
            }
        }

        let stored = self
            .records
            .store_entities(id, &extraction.entities, &extraction.relationships)
            .map_err(|e| failure(id, FailureKind::Persistence, e))?;
        debug!(document = id, entities = stored, "entities stored");
        Ok(Outcome::Processed)
    }

    fn run_embeddings(&self, ids: &[&str], result: &mut PipelineStepResult, failures: &mut Vec<ItemFailure>) {
        let mut record = |f: ItemFailure, result: &mut PipelineStepResult| {
            warn!(document = %f.id, kind = %f.kind, error = %f.message, "embedding failed");
            result.errors += 1;
            failures.push(f);
        };

        let mut pending: Vec<Content> = Vec::new();
        for &id in ids {
            if self.cancelled() {
                break;
            }
            match self.records.is_vectorized(id) {
                Ok(true) => {
                    result.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    record(failure(id, FailureKind::Persistence, e), result);
                    continue;
                }
            }
            match self.load(id) {
                Ok(content) => pending.push(content),
                Err(f) => record(f, result),
            }
        }

        for batch in pending.chunks(self.config.embedding_batch_size) {
            if self.cancelled() {
                break;
            }
            let texts: Vec<String> = batch.iter().map(Content::text).collect();
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

            let vectors = match self.embedder.batch_encode(&refs) {
                Ok(v) if v.len() == batch.len() => v,
                Ok(v) => {
                    let message = format!("embedding returned {} vectors for {} texts", v.len(), batch.len());
                    for content in batch {
                        record(failure(&content.id, FailureKind::Computation, &message), result);
                    }
                    continue;
                }
                Err(e) => {
                    for content in batch {
                        record(failure(&content.id, FailureKind::Computation, &e), result);
                    }
                    continue;
                }
            };

            for (content, vector) in batch.iter().zip(vectors) {
                match self.store_vector(content, vector) {
                    Ok(()) => result.processed += 1,
                    Err(f) => record(f, result),
                }
            }
        }
    }

    fn store_vector(&self, content: &Content, vector: Vec<f32>) -> Result<(), ItemFailure> {
        let point = vector_point_id(&self.config.vector_namespace, &content.id);
        let mut payload = Metadata::new();
        payload.insert("document_id".to_string(), content.id.clone().into());
        payload.insert("content_type".to_string(), content.content_type.to_string().into());
        if let Some(title) = &content.title {
            payload.insert("title".to_string(), title.clone().into());
        }

        self.vectors
            .upsert(point, vector, payload)
            .map_err(|e| failure(&content.id, FailureKind::Persistence, e))?;
        self.records
            .mark_vectorized(&content.id, &point)
            .map_err(|e| failure(&content.id, FailureKind::Persistence, e))
    }

    fn enrich_timeline(&self, id: &str) -> Result<Outcome, ItemFailure> {
        if self
            .records
            .has_timeline_event(id)
            .map_err(|e| failure(id, FailureKind::Persistence, e))?
        {
            return Ok(Outcome::Skipped);
        }

        let content = self.load(id)?;
        let events = self.timeline.extract(&content);
        let inserted = self
            .records
            .insert_timeline_events(&events)
            .map_err(|e| failure(id, FailureKind::Persistence, e))?;
        debug!(document = id, events = inserted, "timeline events stored");
        Ok(Outcome::Processed)
    }
}

impl fmt::Debug for EnrichmentPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichmentPipeline")
            .field("config", &self.config)
            .field("graph", &self.graph.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::EmbeddingError;
    use crate::storage::{OpenStore, SqliteStore};

    struct ConstantEmbedder;

    impl EmbeddingService for ConstantEmbedder {
        fn batch_encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn setup(config: PipelineConfig) -> (EnrichmentPipeline, Arc<SqliteStore>, Arc<InMemoryVectorIndex>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .put_content(
                &Content::new("m1", ContentType::Email, "Pay $40 to carol@example.com by 2024-04-01")
                    .with_title("Invoice")
                    .with_metadata("sender", "dave@example.com"),
            )
            .unwrap();
        store
            .put_content(&Content::new("m2", ContentType::Email, "Nothing in particular"))
            .unwrap();

        let vectors = Arc::new(InMemoryVectorIndex::new());
        let pipeline = EnrichmentPipeline::new(
            config,
            store.clone(),
            store.clone(),
            Arc::new(PatternEntityExtractor::new().unwrap()),
            Arc::new(ConstantEmbedder),
            vectors.clone(),
        )
        .unwrap();
        (pipeline, store, vectors)
    }

    #[test]
    fn rejects_zero_batch_size() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let config = PipelineConfig {
            embedding_batch_size: 0,
            ..Default::default()
        };
        let result = EnrichmentPipeline::new(
            config,
            store.clone(),
            store,
            Arc::new(PatternEntityExtractor::new().unwrap()),
            Arc::new(ConstantEmbedder),
            Arc::new(InMemoryVectorIndex::new()),
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn summary_step_is_not_reported() {
        let (pipeline, _, _) = setup(PipelineConfig::default());
        let report = pipeline.run_for_messages(&["m1"], None);

        let steps: Vec<Step> = report.steps.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec![Step::Entities, Step::Embeddings, Step::Timeline]);
    }

    #[test]
    fn huge_entity_ttl_never_expires() {
        let config = PipelineConfig {
            entity_cache_ttl_hours: u64::MAX,
            ..Default::default()
        };
        assert_eq!(config.entity_cutoff(), DateTime::<Utc>::MIN_UTC);

        let config = PipelineConfig::default();
        let age = Utc::now() - config.entity_cutoff();
        assert!((age - TimeDelta::hours(24)).num_seconds().abs() < 5);
    }

    #[test]
    fn vector_ids_are_deterministic() {
        assert_eq!(vector_point_id("ns", "m1"), vector_point_id("ns", "m1"));
        assert_ne!(vector_point_id("ns", "m1"), vector_point_id("ns", "m2"));
        assert_ne!(vector_point_id("ns", "m1"), vector_point_id("other", "m1"));
    }

    #[test]
    fn embeddings_upsert_under_deterministic_id() {
        let (pipeline, store, vectors) = setup(PipelineConfig {
            embedding_batch_size: 1,
            ..Default::default()
        });
        let report = pipeline.run_for_messages(&["m1", "m2"], Some(&[Step::Embeddings][..]));

        assert_eq!(report.steps[0].result.processed, 2);
        assert_eq!(vectors.len(), 2);
        let point = vectors.retrieve(&vector_point_id("tessera", "m1")).unwrap().unwrap();
        assert_eq!(point.payload["document_id"].as_str(), Some("m1"));
        assert!(store.is_vectorized("m2").unwrap());
    }

    #[test]
    fn missing_document_counts_as_error() {
        let (pipeline, _, _) = setup(PipelineConfig::default());
        let report = pipeline.run_for_messages(&["m1", "ghost"], Some(&[Step::Timeline, Step::Embeddings][..]));

        for step in &report.steps {
            assert_eq!(step.result.processed, 1);
            assert_eq!(step.result.errors, 1);
            assert_eq!(step.failures[0].id, "ghost");
            assert_eq!(step.failures[0].kind, FailureKind::NotFound);
        }
    }

    #[test]
    fn entities_link_into_graph() {
        let (pipeline, store, _) = setup(PipelineConfig::default());
        let graph = ContentGraph::new(store.clone(), store.clone());
        let pipeline = pipeline.with_graph(graph.clone());

        let report = pipeline.run_for_messages(&["m1"], Some(&[Step::Entities][..]));
        assert_eq!(report.steps[0].result.processed, 1);

        let stats = graph.graph_stats().unwrap();
        // m1 plus carol, dave and $40
        assert_eq!(stats.nodes_by_type.get("entity"), Some(&3));
        assert_eq!(stats.edges_by_relationship.get(relationship::CONTAINS_ENTITIES), Some(&3));
        assert!(graph
            .get_node_by_content("entity:email:carol@example.com")
            .unwrap()
            .is_some());
    }

    #[test]
    fn cancelled_token_stops_before_work() {
        let (pipeline, store, _) = setup(PipelineConfig::default());
        let token = CancellationToken::new();
        token.cancel();
        let pipeline = pipeline.with_cancellation(token);

        let report = pipeline.run_for_messages(&["m1", "m2"], None);
        assert!(report.cancelled);
        assert!(report.steps.is_empty());
        assert_eq!(store.timeline_event_count(None).unwrap(), 0);
    }
}
