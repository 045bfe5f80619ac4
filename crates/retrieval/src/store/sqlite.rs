//! SQLite-backed chunk store.

use super::{bytes_to_embedding, embedding_to_bytes, ChunkStore, ScanVisitor};
use crate::config::RetrievalConfig;
use crate::error::{RetrievalError, RetrievalResult};
use crate::types::{Chunk, ChunkRecord, EmbeddedChunk, NewChunk, StoreStats};
use crate::validator::VectorValidator;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS store_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        paper_id TEXT NOT NULL,
        idx INTEGER NOT NULL CHECK (idx >= 0),
        page INTEGER,
        content TEXT NOT NULL,
        embedding BLOB,
        embedding_dim INTEGER,
        created_at TEXT NOT NULL,
        embedded_at TEXT,
        UNIQUE (paper_id, idx),
        CHECK ((embedding IS NULL) = (embedding_dim IS NULL))
    );
"#;

const SELECT_RECORD: &str =
    "SELECT id, paper_id, idx, page, content, embedding, embedding_dim FROM chunks";

/// Durable chunk store on a single SQLite file.
///
/// Every operation opens its own connection, so independent callers only
/// contend on SQLite's WAL locking: readers never block the writer and the
/// writer never blocks readers. An embedding and its dimension are written by
/// one `UPDATE`, which makes the pair atomic.
#[derive(Debug)]
pub struct SqliteChunkStore {
    path: PathBuf,
    config: RetrievalConfig,
    validator: VectorValidator,
}

impl SqliteChunkStore {
    /// Open or create the store at `path`.
    ///
    /// A new store records the configured dimension and metric; an existing
    /// one must have been created with the same values.
    pub fn open(path: &Path, config: RetrievalConfig) -> RetrievalResult<Self> {
        config.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RetrievalError::Storage(format!("Failed to create store directory: {}", e))
            })?;
        }

        let store = Self {
            path: path.to_path_buf(),
            validator: VectorValidator::new(config.dimension),
            config,
        };

        let mut conn = store.connect()?;
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.execute_batch(SCHEMA)?;
        store.verify_meta(&mut conn)?;

        tracing::info!(
            "Opened chunk store at {:?} (dimension={}, metric={}, journal={})",
            store.path,
            store.config.dimension,
            store.config.metric,
            journal_mode
        );
        Ok(store)
    }

    fn connect(&self) -> RetrievalResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_millis(self.config.busy_timeout_ms))?;
        Ok(conn)
    }

    /// Record dimension and metric on first open, compare them afterwards.
    fn verify_meta(&self, conn: &mut Connection) -> RetrievalResult<()> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT OR IGNORE INTO store_meta (key, value) VALUES ('dimension', ?1)",
            params![self.config.dimension.to_string()],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO store_meta (key, value) VALUES ('metric', ?1)",
            params![self.config.metric.as_str()],
        )?;

        let stored_dimension: String = tx.query_row(
            "SELECT value FROM store_meta WHERE key = 'dimension'",
            [],
            |row| row.get(0),
        )?;
        let stored_metric: String = tx.query_row(
            "SELECT value FROM store_meta WHERE key = 'metric'",
            [],
            |row| row.get(0),
        )?;
        tx.commit()?;

        if stored_dimension != self.config.dimension.to_string() {
            return Err(RetrievalError::ConfigMismatch {
                stored: format!("dimension {}", stored_dimension),
                configured: format!("dimension {}", self.config.dimension),
            });
        }
        if stored_metric != self.config.metric.as_str() {
            return Err(RetrievalError::ConfigMismatch {
                stored: format!("metric {}", stored_metric),
                configured: format!("metric {}", self.config.metric),
            });
        }
        Ok(())
    }

    /// Decode a stored blob, refusing rows whose length disagrees with the
    /// recorded or configured dimension.
    fn decode_embedding(
        &self,
        chunk_id: &str,
        bytes: &[u8],
        stored_dim: i64,
    ) -> RetrievalResult<Arc<[f32]>> {
        if usize::try_from(stored_dim).ok() != Some(self.config.dimension) {
            return Err(RetrievalError::Storage(format!(
                "chunk {} has embedding_dim {}, store dimension is {}",
                chunk_id, stored_dim, self.config.dimension
            )));
        }
        bytes_to_embedding(bytes, self.config.dimension)
            .map(Arc::from)
            .map_err(|e| RetrievalError::Storage(format!("chunk {}: {}", chunk_id, e)))
    }
}

fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<Chunk> {
    Ok(Chunk {
        id: row.get(0)?,
        paper_id: row.get(1)?,
        idx: row.get(2)?,
        page: row.get(3)?,
        content: row.get(4)?,
    })
}

impl ChunkStore for SqliteChunkStore {
    fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    fn insert_chunk(&self, new_chunk: NewChunk) -> RetrievalResult<Chunk> {
        let chunk = new_chunk.into_chunk();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let id_taken = tx
            .query_row(
                "SELECT 1 FROM chunks WHERE id = ?1",
                params![chunk.id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if id_taken {
            return Err(RetrievalError::AlreadyExists(chunk.id));
        }

        let position_taken = tx
            .query_row(
                "SELECT 1 FROM chunks WHERE paper_id = ?1 AND idx = ?2",
                params![chunk.paper_id, chunk.idx],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if position_taken {
            return Err(RetrievalError::DuplicatePosition {
                paper_id: chunk.paper_id,
                idx: chunk.idx,
            });
        }

        tx.execute(
            "INSERT INTO chunks (id, paper_id, idx, page, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                chunk.id,
                chunk.paper_id,
                chunk.idx,
                chunk.page,
                chunk.content,
                Utc::now().to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        tracing::debug!(
            "Inserted chunk {} (paper={}, idx={})",
            chunk.id,
            chunk.paper_id,
            chunk.idx
        );
        Ok(chunk)
    }

    fn get_chunk(&self, id: &str) -> RetrievalResult<Option<ChunkRecord>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_RECORD),
                params![id],
                |row| {
                    Ok((
                        chunk_from_row(row)?,
                        row.get::<_, Option<Vec<u8>>>(5)?,
                        row.get::<_, Option<i64>>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((chunk, bytes, stored_dim)) = row else {
            return Ok(None);
        };

        let embedding = match (bytes, stored_dim) {
            (Some(bytes), Some(dim)) => Some(self.decode_embedding(&chunk.id, &bytes, dim)?),
            (None, None) => None,
            _ => {
                return Err(RetrievalError::Storage(format!(
                    "chunk {} has an embedding without a dimension",
                    chunk.id
                )))
            }
        };

        Ok(Some(ChunkRecord { chunk, embedding }))
    }

    fn upsert_embedding(&self, chunk_id: &str, embedding: &[f32]) -> RetrievalResult<()> {
        self.validator.validate(embedding)?;

        let bytes = embedding_to_bytes(embedding);
        let conn = self.connect()?;
        let updated = conn.execute(
            "UPDATE chunks SET embedding = ?1, embedding_dim = ?2, embedded_at = ?3 WHERE id = ?4",
            params![
                bytes,
                embedding.len() as i64,
                Utc::now().to_rfc3339(),
                chunk_id
            ],
        )?;

        if updated == 0 {
            return Err(RetrievalError::NotFound(chunk_id.to_string()));
        }

        tracing::debug!("Stored embedding for chunk {}", chunk_id);
        Ok(())
    }

    fn scan(&self, batch_size: usize, visit: &mut ScanVisitor<'_>) -> RetrievalResult<()> {
        let batch_size = batch_size.max(1);
        let conn = self.connect()?;

        // One statement is one read transaction: the whole scan sees a single
        // WAL snapshot.
        let mut stmt = conn.prepare(&format!(
            "{} WHERE embedding IS NOT NULL ORDER BY paper_id, idx, id",
            SELECT_RECORD
        ))?;
        let mut rows = stmt.query([])?;

        let mut batch = Vec::with_capacity(batch_size);
        while let Some(row) = rows.next()? {
            let chunk = chunk_from_row(row)?;
            let bytes: Vec<u8> = row.get(5)?;
            let stored_dim: i64 = row.get(6)?;
            let embedding = self.decode_embedding(&chunk.id, &bytes, stored_dim)?;

            batch.push(EmbeddedChunk { chunk, embedding });
            if batch.len() == batch_size {
                visit(std::mem::replace(&mut batch, Vec::with_capacity(batch_size)))?;
            }
        }

        if !batch.is_empty() {
            visit(batch)?;
        }
        Ok(())
    }

    fn delete_paper(&self, paper_id: &str) -> RetrievalResult<usize> {
        let conn = self.connect()?;
        let deleted = conn.execute("DELETE FROM chunks WHERE paper_id = ?1", params![paper_id])?;

        tracing::info!("Deleted {} chunks of paper {}", deleted, paper_id);
        Ok(deleted)
    }

    fn stats(&self) -> RetrievalResult<StoreStats> {
        let conn = self.connect()?;
        let (papers, chunks, embedded_chunks) = conn.query_row(
            "SELECT COUNT(DISTINCT paper_id), COUNT(*), COUNT(embedding) FROM chunks",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )?;

        Ok(StoreStats {
            papers: papers as u64,
            chunks: chunks as u64,
            embedded_chunks: embedded_chunks as u64,
        })
    }
}
