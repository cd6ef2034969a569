//! SQLite implementations of the content, similarity cache, and enrichment stores

use super::records::{
    Content, ContentFilter, EntityRelationship, ExtractedEntity, SimilarityCacheEntry, TimelineEvent,
};
use super::sqlite::{decode_metadata, parse_time, SqliteStore};
use super::traits::{ContentStore, EnrichmentStore, SimilarityCache, StorageResult};
use crate::graph::ContentType;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

type ContentRow = (String, Option<String>, String, String, String, String);

const CONTENT_COLUMNS: &str = "id, title, body, content_type, metadata_json, created_at";

fn read_content_row(row: &Row<'_>) -> rusqlite::Result<ContentRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn row_to_content(row: ContentRow) -> StorageResult<Content> {
    let (id, title, body, content_type, metadata_json, created_at) = row;
    Ok(Content {
        metadata: decode_metadata(&id, &metadata_json)?,
        id,
        title,
        body,
        content_type: ContentType::from(content_type),
        created_at: parse_time(&created_at)?,
    })
}

/// Escape LIKE wildcards so user text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Append the content-type and limit clauses shared by listing and search
fn push_filter(sql: &mut String, args: &mut Vec<String>, filter: &ContentFilter) {
    if let Some(ref content_type) = filter.content_type {
        args.push(content_type.as_str().to_string());
        sql.push_str(&format!(" AND content_type = ?{}", args.len()));
    }
    sql.push_str(" ORDER BY rowid");
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
}

impl SqliteStore {
    /// Insert or replace a content row
    ///
    /// The content table stands in for the external content store so a
    /// single database file can back a whole deployment.
    pub fn put_content(&self, content: &Content) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO content (id, title, body, content_type, metadata_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                body = excluded.body,
                content_type = excluded.content_type,
                metadata_json = excluded.metadata_json
            "#,
            params![
                content.id,
                content.title,
                content.body,
                content.content_type.as_str(),
                serde_json::to_string(&content.metadata)?,
                content.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Number of rows in the similarity cache
    pub fn similarity_cache_len(&self) -> StorageResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM similarity_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl ContentStore for SqliteStore {
    fn get_content(&self, id: &str) -> StorageResult<Option<Content>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM content WHERE id = ?1", CONTENT_COLUMNS),
                params![id],
                read_content_row,
            )
            .optional()?;
        row.map(row_to_content).transpose()
    }

    fn list_content_ids(&self, filter: &ContentFilter) -> StorageResult<Vec<String>> {
        let conn = self.conn()?;
        let mut sql = String::from("SELECT id FROM content WHERE 1 = 1");
        let mut args = Vec::new();
        push_filter(&mut sql, &mut args, filter);

        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn search_content(&self, query: &str, filter: &ContentFilter) -> StorageResult<Vec<Content>> {
        let conn = self.conn()?;
        let mut sql = format!(
            "SELECT {} FROM content WHERE (lower(coalesce(title, '')) LIKE ?1 ESCAPE '\\' OR lower(body) LIKE ?1 ESCAPE '\\')",
            CONTENT_COLUMNS
        );
        let mut args = vec![format!("%{}%", escape_like(&query.to_lowercase()))];
        push_filter(&mut sql, &mut args, filter);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), read_content_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(row_to_content).collect()
    }
}

impl SimilarityCache for SqliteStore {
    fn get_similarity(&self, pair_hash: &str) -> StorageResult<Option<SimilarityCacheEntry>> {
        let conn = self.conn()?;
        let row: Option<(String, String, String, Option<f64>, f64, String)> = conn
            .query_row(
                "SELECT pair_hash, id1, id2, score, computation_ms, created_at
                 FROM similarity_cache WHERE pair_hash = ?1",
                params![pair_hash],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((pair_hash, id1, id2, score, computation_ms, created_at)) => Ok(Some(SimilarityCacheEntry {
                pair_hash,
                id1,
                id2,
                score: score.map(|s| s as f32),
                computation_ms,
                created_at: parse_time(&created_at)?,
            })),
            None => Ok(None),
        }
    }

    fn put_similarity(&self, entry: &SimilarityCacheEntry) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO similarity_cache (pair_hash, id1, id2, score, computation_ms, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.pair_hash,
                entry.id1,
                entry.id2,
                entry.score.map(|s| s as f64),
                entry.computation_ms,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn clear_similarities(&self, older_than: Option<DateTime<Utc>>) -> StorageResult<usize> {
        let conn = self.conn()?;
        let rows = match older_than {
            // RFC 3339 strings in UTC sort chronologically
            Some(cutoff) => conn.execute(
                "DELETE FROM similarity_cache WHERE created_at < ?1",
                params![cutoff.to_rfc3339()],
            )?,
            None => conn.execute("DELETE FROM similarity_cache", [])?,
        };
        Ok(rows)
    }

    fn similarity_scores(&self) -> StorageResult<Vec<f32>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT score FROM similarity_cache WHERE score IS NOT NULL")?;
        let scores = stmt
            .query_map([], |row| row.get::<_, f64>(0))?
            .map(|r| r.map(|s| s as f32))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(scores)
    }
}

impl EnrichmentStore for SqliteStore {
    fn has_entity_record(&self, document_id: &str, since: DateTime<Utc>) -> StorageResult<bool> {
        let conn = self.conn()?;
        let extracted_at: Option<String> = conn
            .query_row(
                "SELECT extracted_at FROM entity_extractions WHERE document_id = ?1",
                params![document_id],
                |row| row.get(0),
            )
            .optional()?;
        match extracted_at {
            Some(ts) => Ok(parse_time(&ts)? >= since),
            None => Ok(false),
        }
    }

    fn store_entities(
        &self,
        document_id: &str,
        entities: &[ExtractedEntity],
        relationships: &[EntityRelationship],
    ) -> StorageResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        // A stale record is replaced wholesale
        tx.execute("DELETE FROM entities WHERE document_id = ?1", params![document_id])?;
        tx.execute(
            "DELETE FROM entity_relationships WHERE document_id = ?1",
            params![document_id],
        )?;

        for entity in entities {
            tx.execute(
                r#"
                INSERT INTO entities (document_id, text, entity_type, confidence, span_start, span_end, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    document_id,
                    entity.text,
                    entity.entity_type,
                    entity.confidence as f64,
                    entity.span.0 as i64,
                    entity.span.1 as i64,
                    now,
                ],
            )?;
        }

        for rel in relationships {
            tx.execute(
                r#"
                INSERT INTO entity_relationships (document_id, source_text, target_text, relationship, confidence, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![document_id, rel.source, rel.target, rel.relationship, rel.confidence as f64, now],
            )?;
        }

        tx.execute(
            r#"
            INSERT INTO entity_extractions (document_id, entity_count, extracted_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(document_id) DO UPDATE SET
                entity_count = excluded.entity_count,
                extracted_at = excluded.extracted_at
            "#,
            params![document_id, entities.len() as i64, now],
        )?;

        tx.commit()?;
        Ok(entities.len())
    }

    fn entity_count(&self, document_id: Option<&str>) -> StorageResult<usize> {
        let conn = self.conn()?;
        let count: i64 = match document_id {
            Some(id) => conn.query_row(
                "SELECT COUNT(*) FROM entities WHERE document_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?,
        };
        Ok(count as usize)
    }

    fn is_vectorized(&self, document_id: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let found: Option<String> = conn
            .query_row(
                "SELECT point_id FROM vectorized_documents WHERE document_id = ?1",
                params![document_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn mark_vectorized(&self, document_id: &str, point_id: &Uuid) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO vectorized_documents (document_id, point_id, vectorized_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(document_id) DO UPDATE SET
                point_id = excluded.point_id,
                vectorized_at = excluded.vectorized_at
            "#,
            params![document_id, point_id.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn has_timeline_event(&self, document_id: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM timeline_events WHERE document_id = ?1",
            params![document_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn insert_timeline_events(&self, events: &[TimelineEvent]) -> StorageResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        for event in events {
            inserted += tx.execute(
                r#"
                INSERT OR IGNORE INTO timeline_events (event_hash, document_id, event_date, event_type,
                                                       description, context, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    event.event_hash,
                    event.document_id,
                    event.event_date.format("%Y-%m-%d").to_string(),
                    event.event_type,
                    event.description,
                    event.context,
                    event.created_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn timeline_event_count(&self, document_id: Option<&str>) -> StorageResult<usize> {
        let conn = self.conn()?;
        let count: i64 = match document_id {
            Some(id) => conn.query_row(
                "SELECT COUNT(*) FROM timeline_events WHERE document_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM timeline_events", [], |row| row.get(0))?,
        };
        Ok(count as usize)
    }
}
