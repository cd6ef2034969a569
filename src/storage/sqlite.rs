//! SQLite storage backend

use super::traits::{GraphStore, OpenStore, StorageError, StorageResult};
use crate::graph::{parse_metadata, ContentType, Edge, EdgeId, Metadata, Node, NodeId};
use crate::query::Direction;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// SQLite-backed store
///
/// Uses a single SQLite database file holding the graph tables, the
/// similarity cache, and the content and enrichment tables. Thread-safe
/// via an internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

type NodeRow = (String, String, String, Option<String>, String, String);
type EdgeRow = (String, String, String, String, f64, String, String);

const NODE_COLUMNS: &str = "node_id, content_id, content_type, title, metadata_json, created_at";
const EDGE_COLUMNS: &str =
    "edge_id, source_node_id, target_node_id, relationship_type, strength, metadata_json, created_at";

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS graph_nodes (
                node_id TEXT PRIMARY KEY,
                content_id TEXT NOT NULL UNIQUE,
                content_type TEXT NOT NULL,
                title TEXT,
                metadata_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_graph_nodes_type
                ON graph_nodes(content_type);

            CREATE TABLE IF NOT EXISTS graph_edges (
                edge_id TEXT PRIMARY KEY,
                source_node_id TEXT NOT NULL,
                target_node_id TEXT NOT NULL,
                relationship_type TEXT NOT NULL,
                strength REAL NOT NULL,
                metadata_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (source_node_id, target_node_id, relationship_type)
            );

            CREATE INDEX IF NOT EXISTS idx_graph_edges_source
                ON graph_edges(source_node_id);
            CREATE INDEX IF NOT EXISTS idx_graph_edges_target
                ON graph_edges(target_node_id);
            CREATE INDEX IF NOT EXISTS idx_graph_edges_relationship
                ON graph_edges(relationship_type);

            CREATE TABLE IF NOT EXISTS similarity_cache (
                pair_hash TEXT PRIMARY KEY,
                id1 TEXT NOT NULL,
                id2 TEXT NOT NULL,
                score REAL,
                computation_ms REAL NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS content (
                id TEXT PRIMARY KEY,
                title TEXT,
                body TEXT NOT NULL,
                content_type TEXT NOT NULL,
                metadata_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS entity_extractions (
                document_id TEXT PRIMARY KEY,
                entity_count INTEGER NOT NULL,
                extracted_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS entities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL,
                text TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                confidence REAL NOT NULL,
                span_start INTEGER NOT NULL,
                span_end INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entities_document
                ON entities(document_id);

            CREATE TABLE IF NOT EXISTS entity_relationships (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL,
                source_text TEXT NOT NULL,
                target_text TEXT NOT NULL,
                relationship TEXT NOT NULL,
                confidence REAL NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS timeline_events (
                event_hash TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                event_date TEXT NOT NULL,
                event_type TEXT NOT NULL,
                description TEXT NOT NULL,
                context TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_timeline_events_document
                ON timeline_events(document_id);

            CREATE TABLE IF NOT EXISTS vectorized_documents (
                document_id TEXT PRIMARY KEY,
                point_id TEXT NOT NULL,
                vectorized_at TEXT NOT NULL
            );

            PRAGMA journal_mode = WAL;
            "#,
        )?;

        Ok(())
    }

    /// Lock the connection
    pub(crate) fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn read_node_row(row: &Row<'_>) -> rusqlite::Result<NodeRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    /// Deserialize a node from database columns
    fn row_to_node(row: NodeRow) -> StorageResult<Node> {
        let (node_id, content_id, content_type, title, metadata_json, created_at) = row;
        Ok(Node {
            id: NodeId::parse_str(&node_id).map_err(|_| StorageError::InvalidId(node_id.clone()))?,
            metadata: decode_metadata(&content_id, &metadata_json)?,
            content_id,
            content_type: ContentType::from(content_type),
            title,
            created_at: parse_time(&created_at)?,
        })
    }

    fn read_edge_row(row: &Row<'_>) -> rusqlite::Result<EdgeRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    }

    /// Deserialize an edge from database columns
    fn row_to_edge(row: EdgeRow) -> StorageResult<Edge> {
        let (edge_id, source, target, relationship, strength, metadata_json, created_at) = row;
        Ok(Edge {
            id: EdgeId::parse_str(&edge_id).map_err(|_| StorageError::InvalidId(edge_id.clone()))?,
            source: NodeId::parse_str(&source).map_err(|_| StorageError::InvalidId(source.clone()))?,
            target: NodeId::parse_str(&target).map_err(|_| StorageError::InvalidId(target.clone()))?,
            relationship,
            strength: strength as f32,
            metadata: decode_metadata(&edge_id, &metadata_json)?,
            created_at: parse_time(&created_at)?,
        })
    }

    fn insert_node_with(conn: &Connection, node: &Node) -> StorageResult<bool> {
        let rows = conn.execute(
            r#"
            INSERT OR IGNORE INTO graph_nodes (node_id, content_id, content_type, title, metadata_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                node.id.to_string(),
                node.content_id,
                node.content_type.as_str(),
                node.title,
                serde_json::to_string(&node.metadata)?,
                node.created_at.to_rfc3339(),
            ],
        )?;
        Ok(rows > 0)
    }

    fn insert_edge_with(conn: &Connection, edge: &Edge) -> StorageResult<bool> {
        let rows = conn.execute(
            r#"
            INSERT OR IGNORE INTO graph_edges (edge_id, source_node_id, target_node_id, relationship_type,
                                               strength, metadata_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                edge.id.to_string(),
                edge.source.to_string(),
                edge.target.to_string(),
                edge.relationship,
                edge.strength as f64,
                serde_json::to_string(&edge.metadata)?,
                edge.created_at.to_rfc3339(),
            ],
        )?;
        Ok(rows > 0)
    }

    fn query_edges(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> StorageResult<Vec<Edge>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, Self::read_edge_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|mut row| {
                if let Err(e) = decode_metadata(&row.0, &row.5) {
                    warn!(error = %e, "edge loaded without its metadata");
                    row.5 = String::new();
                }
                Self::row_to_edge(row)
            })
            .collect()
    }
}

/// Parse an RFC 3339 timestamp column
pub(crate) fn parse_time(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::DateParse(e.to_string()))
}

/// Decode a metadata column; `owner` names the row in the error
pub(crate) fn decode_metadata(owner: &str, json: &str) -> StorageResult<Metadata> {
    parse_metadata(json).map_err(|reason| StorageError::InvalidMetadata {
        owner: owner.to_string(),
        reason,
    })
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl GraphStore for SqliteStore {
    // === Node Operations ===

    fn insert_node(&self, node: &Node) -> StorageResult<bool> {
        let conn = self.conn()?;
        Self::insert_node_with(&conn, node)
    }

    fn insert_nodes(&self, nodes: &[Node]) -> StorageResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        for node in nodes {
            if Self::insert_node_with(&tx, node)? {
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn get_node(&self, id: &NodeId) -> StorageResult<Option<Node>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM graph_nodes WHERE node_id = ?1", NODE_COLUMNS),
                params![id.to_string()],
                Self::read_node_row,
            )
            .optional()?;
        row.map(Self::row_to_node).transpose()
    }

    fn get_node_by_content(&self, content_id: &str) -> StorageResult<Option<Node>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM graph_nodes WHERE content_id = ?1", NODE_COLUMNS),
                params![content_id],
                Self::read_node_row,
            )
            .optional()?;
        row.map(Self::row_to_node).transpose()
    }

    fn all_nodes(&self) -> StorageResult<Vec<Node>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM graph_nodes ORDER BY rowid", NODE_COLUMNS))?;
        let rows = stmt
            .query_map([], Self::read_node_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|mut row| {
                if let Err(e) = decode_metadata(&row.1, &row.4) {
                    warn!(error = %e, "node loaded without its metadata");
                    row.4 = String::new();
                }
                Self::row_to_node(row)
            })
            .collect()
    }

    // === Edge Operations ===

    fn insert_edge(&self, edge: &Edge) -> StorageResult<bool> {
        let conn = self.conn()?;
        Self::insert_edge_with(&conn, edge)
    }

    fn insert_edges(&self, edges: &[Edge]) -> StorageResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        for edge in edges {
            if Self::insert_edge_with(&tx, edge)? {
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn find_edge(
        &self,
        source: &NodeId,
        target: &NodeId,
        relationship: &str,
    ) -> StorageResult<Option<Edge>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM graph_edges
                     WHERE source_node_id = ?1 AND target_node_id = ?2 AND relationship_type = ?3",
                    EDGE_COLUMNS
                ),
                params![source.to_string(), target.to_string(), relationship],
                Self::read_edge_row,
            )
            .optional()?;
        row.map(Self::row_to_edge).transpose()
    }

    fn get_edges_by_node(&self, id: &NodeId, direction: Direction) -> StorageResult<Vec<Edge>> {
        let conn = self.conn()?;
        let clause = match direction {
            Direction::Outgoing => "source_node_id = ?1",
            Direction::Incoming => "target_node_id = ?1",
            Direction::Both => "(source_node_id = ?1 OR target_node_id = ?1)",
        };
        let sql = format!("SELECT {} FROM graph_edges WHERE {} ORDER BY rowid", EDGE_COLUMNS, clause);
        let id = id.to_string();
        Self::query_edges(&conn, &sql, &[&id])
    }

    fn all_edges(&self) -> StorageResult<Vec<Edge>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM graph_edges ORDER BY rowid", EDGE_COLUMNS);
        Self::query_edges(&conn, &sql, &[])
    }
}
