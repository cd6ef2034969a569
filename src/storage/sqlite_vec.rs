//! Persistent vector index backed by sqlite-vec
//!
//! Vectors live in a vec0 virtual table keyed by rowid; a regular table maps
//! each point's UUID to its rowid and JSON payload. Upserting an existing
//! UUID replaces its vector in place.
//!
//! Vectors are L2-normalized on insert so that L2 distance from vec0 can be
//! converted to cosine similarity: `sim = 1 - dist² / 2`.
//!
//! Uses its own database connection (WAL mode) to avoid contention with
//! the main `SqliteStore` connection.

#[cfg(feature = "embeddings")]
mod inner {
    use crate::graph::Metadata;
    use crate::pipeline::{VectorIndex, VectorIndexError, VectorPoint};
    use rusqlite::{params, Connection, OptionalExtension};
    use sqlite_vec::sqlite3_vec_init;
    use std::path::Path;
    use std::sync::{Mutex, MutexGuard};
    use uuid::Uuid;

    /// Dimensions produced by the default fastembed model (all-MiniLM-L6-v2)
    pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

    pub struct SqliteVecIndex {
        conn: Mutex<Connection>,
        dimensions: usize,
    }

    /// Register the sqlite-vec extension globally (safe under parallel test execution)
    fn register_vec_extension() {
        use std::sync::Once;
        static INIT: Once = Once::new();
        INIT.call_once(|| unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(sqlite3_vec_init as *const ())));
        });
    }

    fn backend(e: impl std::fmt::Display) -> VectorIndexError {
        VectorIndexError::Backend(e.to_string())
    }

    impl SqliteVecIndex {
        pub fn open(path: &Path, dimensions: usize) -> Result<Self, VectorIndexError> {
            register_vec_extension();
            let conn = Connection::open(path).map_err(backend)?;
            Self::init_connection(conn, dimensions)
        }

        /// Open an in-memory index (for tests)
        pub fn open_in_memory(dimensions: usize) -> Result<Self, VectorIndexError> {
            register_vec_extension();
            let conn = Connection::open_in_memory().map_err(backend)?;
            Self::init_connection(conn, dimensions)
        }

        fn init_connection(conn: Connection, dimensions: usize) -> Result<Self, VectorIndexError> {
            conn.execute_batch(&format!(
                "PRAGMA journal_mode=WAL;
                 CREATE TABLE IF NOT EXISTS vector_points (
                     id INTEGER PRIMARY KEY,
                     point_id TEXT NOT NULL UNIQUE,
                     payload TEXT NOT NULL
                 );
                 CREATE VIRTUAL TABLE IF NOT EXISTS vec_points USING vec0(embedding float[{}]);",
                dimensions
            ))
            .map_err(backend)?;

            Ok(Self {
                conn: Mutex::new(conn),
                dimensions,
            })
        }

        pub fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn conn(&self) -> Result<MutexGuard<'_, Connection>, VectorIndexError> {
            self.conn.lock().map_err(|_| backend("connection lock poisoned"))
        }

        fn check_dimensions(&self, vector: &[f32]) -> Result<(), VectorIndexError> {
            if vector.len() != self.dimensions {
                return Err(VectorIndexError::DimensionMismatch {
                    expected: self.dimensions,
                    got: vector.len(),
                });
            }
            Ok(())
        }
    }

    /// Reinterpret a `&[f32]` slice as raw bytes for sqlite-vec blob parameters.
    ///
    /// # Safety
    /// f32 has no padding and a fixed layout; this is a trivial reinterpretation.
    fn f32_slice_as_bytes(slice: &[f32]) -> &[u8] {
        unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, slice.len() * 4) }
    }

    fn bytes_to_f32s(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn l2_normalize(v: &mut [f32]) {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
    }

    impl VectorIndex for SqliteVecIndex {
        fn upsert(&self, id: Uuid, vector: Vec<f32>, payload: Metadata) -> Result<(), VectorIndexError> {
            self.check_dimensions(&vector)?;
            let mut normalized = vector;
            l2_normalize(&mut normalized);
            let payload = serde_json::to_string(&payload).map_err(backend)?;

            let mut conn = self.conn()?;
            let tx = conn.transaction().map_err(backend)?;
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM vector_points WHERE point_id = ?1",
                    params![id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(backend)?;

            let rowid = match existing {
                Some(rowid) => {
                    tx.execute("UPDATE vector_points SET payload = ?1 WHERE id = ?2", params![payload, rowid])
                        .map_err(backend)?;
                    tx.execute("DELETE FROM vec_points WHERE rowid = ?1", params![rowid])
                        .map_err(backend)?;
                    rowid
                }
                None => {
                    tx.execute(
                        "INSERT INTO vector_points (point_id, payload) VALUES (?1, ?2)",
                        params![id.to_string(), payload],
                    )
                    .map_err(backend)?;
                    tx.last_insert_rowid()
                }
            };

            tx.execute(
                "INSERT INTO vec_points (rowid, embedding) VALUES (?1, ?2)",
                params![rowid, f32_slice_as_bytes(&normalized)],
            )
            .map_err(backend)?;
            tx.commit().map_err(backend)
        }

        fn retrieve(&self, id: &Uuid) -> Result<Option<VectorPoint>, VectorIndexError> {
            let conn = self.conn()?;
            let row: Option<(String, Vec<u8>)> = conn
                .query_row(
                    "SELECT p.payload, v.embedding
                     FROM vector_points p JOIN vec_points v ON v.rowid = p.id
                     WHERE p.point_id = ?1",
                    params![id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(backend)?;

            match row {
                Some((payload, bytes)) => Ok(Some(VectorPoint {
                    id: *id,
                    vector: bytes_to_f32s(&bytes),
                    payload: serde_json::from_str(&payload).map_err(backend)?,
                })),
                None => Ok(None),
            }
        }

        fn search(&self, query: &[f32], limit: usize) -> Result<Vec<(Uuid, f32)>, VectorIndexError> {
            self.check_dimensions(query)?;
            if limit == 0 {
                return Ok(Vec::new());
            }
            let mut normalized = query.to_vec();
            l2_normalize(&mut normalized);

            let conn = self.conn()?;
            // For unit vectors: L2_dist² = 2(1 - cos_sim), so cos_sim = 1 - dist²/2.
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT p.point_id, knn.distance
                     FROM (SELECT rowid, distance FROM vec_points
                           WHERE embedding MATCH ?1 AND k = {}) knn
                     JOIN vector_points p ON p.id = knn.rowid
                     ORDER BY knn.distance",
                    limit
                ))
                .map_err(backend)?;

            let rows = stmt
                .query_map(params![f32_slice_as_bytes(&normalized)], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, f32>(1)?))
                })
                .map_err(backend)?;

            let mut hits = Vec::new();
            for row in rows {
                let (point_id, distance) = row.map_err(backend)?;
                let id = Uuid::parse_str(&point_id).map_err(backend)?;
                hits.push((id, 1.0 - (distance * distance) / 2.0));
            }
            Ok(hits)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn upsert_and_retrieve_round_trip() {
            let index = SqliteVecIndex::open_in_memory(3).expect("should open in-memory index");
            let id = Uuid::new_v4();
            let mut payload = Metadata::new();
            payload.insert("document_id".to_string(), "m1".into());

            assert!(index.retrieve(&id).unwrap().is_none());
            index.upsert(id, vec![3.0, 4.0, 0.0], payload).unwrap();

            let point = index.retrieve(&id).unwrap().unwrap();
            assert!((point.vector[0] - 0.6).abs() < 1e-6, "stored normalized");
            assert_eq!(point.payload["document_id"].as_str(), Some("m1"));
        }

        #[test]
        fn upsert_same_id_replaces() {
            let index = SqliteVecIndex::open_in_memory(3).expect("should open in-memory index");
            let id = Uuid::new_v4();
            index.upsert(id, vec![1.0, 0.0, 0.0], Metadata::new()).unwrap();
            index.upsert(id, vec![0.0, 1.0, 0.0], Metadata::new()).unwrap();

            let hits = index.search(&[0.0, 1.0, 0.0], 10).unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].0, id);
            assert!((hits[0].1 - 1.0).abs() < 1e-4);
        }

        #[test]
        fn search_orders_by_similarity() {
            let index = SqliteVecIndex::open_in_memory(3).expect("should open in-memory index");
            let (travel, journey, democracy) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
            index.upsert(travel, vec![0.9, 0.3, 0.1], Metadata::new()).unwrap();
            index.upsert(journey, vec![0.85, 0.35, 0.15], Metadata::new()).unwrap();
            index.upsert(democracy, vec![0.1, 0.2, 0.95], Metadata::new()).unwrap();

            let hits = index.search(&[0.9, 0.3, 0.1], 2).unwrap();
            let ids: Vec<Uuid> = hits.iter().map(|(id, _)| *id).collect();
            assert_eq!(ids, vec![travel, journey]);
        }

        #[test]
        fn rejects_wrong_dimensions() {
            let index = SqliteVecIndex::open_in_memory(3).expect("should open in-memory index");
            let err = index.upsert(Uuid::new_v4(), vec![1.0], Metadata::new()).unwrap_err();
            assert!(matches!(err, VectorIndexError::DimensionMismatch { expected: 3, got: 1 }));
        }
    }
}

#[cfg(feature = "embeddings")]
pub use inner::{SqliteVecIndex, DEFAULT_EMBEDDING_DIMENSIONS};
