//! Semantic retrieval over paper chunks.
//!
//! Stores one fixed-dimension embedding per chunk and answers exact
//! nearest-neighbor queries over all stored chunks. Embeddings are produced
//! elsewhere; this crate only validates, stores and compares them.

pub mod config;
pub mod distance;
pub mod error;
pub mod search;
pub mod store;
pub mod types;
pub mod validator;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::{RetrievalConfig, DEFAULT_SEARCH_LIMIT};
pub use distance::DistanceMetric;
pub use error::{RetrievalError, RetrievalResult};
pub use search::SimilaritySearch;
pub use store::{ChunkStore, MemoryChunkStore, SqliteChunkStore};
pub use types::{Chunk, ChunkRecord, EmbeddedChunk, NewChunk, ScoredChunk, StoreStats};

use std::path::Path;
use std::sync::Arc;

/// Entry point used by the application layer.
///
/// Wraps a chunk store and the search service built on it. Cloning is cheap
/// and clones share the same store.
#[derive(Clone)]
pub struct SemanticIndex {
    store: Arc<dyn ChunkStore>,
    search: SimilaritySearch,
}

impl SemanticIndex {
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self {
            search: SimilaritySearch::new(Arc::clone(&store)),
            store,
        }
    }

    /// Open (or create) a durable SQLite-backed index.
    pub fn open(path: &Path, config: RetrievalConfig) -> RetrievalResult<Self> {
        Ok(Self::new(Arc::new(SqliteChunkStore::open(path, config)?)))
    }

    /// Create an empty index held in memory.
    pub fn in_memory(config: RetrievalConfig) -> RetrievalResult<Self> {
        Ok(Self::new(Arc::new(MemoryChunkStore::new(config)?)))
    }

    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    pub fn config(&self) -> &RetrievalConfig {
        self.store.config()
    }

    /// Attach `embedding` to an existing chunk, replacing any previous one.
    pub fn save_chunk_embedding(&self, chunk_id: &str, embedding: &[f32]) -> RetrievalResult<()> {
        self.store.upsert_embedding(chunk_id, embedding)
    }

    /// Nearest chunks to `query`, closest first. `None` uses the configured
    /// default limit.
    pub fn search_similar_chunks(
        &self,
        query: &[f32],
        limit: Option<usize>,
    ) -> RetrievalResult<Vec<ScoredChunk>> {
        let limit = limit.unwrap_or(self.config().default_limit);
        self.search.search(query, limit)
    }

    /// [`Self::save_chunk_embedding`] on tokio's blocking pool.
    pub async fn save_chunk_embedding_async(
        &self,
        chunk_id: String,
        embedding: Vec<f32>,
    ) -> RetrievalResult<()> {
        let index = self.clone();
        tokio::task::spawn_blocking(move || index.save_chunk_embedding(&chunk_id, &embedding))
            .await
            .map_err(|e| RetrievalError::Task(e.to_string()))?
    }

    /// [`Self::search_similar_chunks`] on tokio's blocking pool.
    ///
    /// Dropping the returned future abandons the search; since it only reads,
    /// nothing needs to be rolled back.
    pub async fn search_similar_chunks_async(
        &self,
        query: Vec<f32>,
        limit: Option<usize>,
    ) -> RetrievalResult<Vec<ScoredChunk>> {
        let index = self.clone();
        tokio::task::spawn_blocking(move || index.search_similar_chunks(&query, limit))
            .await
            .map_err(|e| RetrievalError::Task(e.to_string()))?
    }
}
