//! Chunk store abstraction.
//!
//! A chunk store maps chunk ids to their text, position and embedding. Chunk
//! text arrives from the upstream chunking feed through
//! [`ChunkStore::insert_chunk`]; embeddings are attached afterwards through
//! [`ChunkStore::upsert_embedding`], the only mutating entry point for
//! vectors.

mod memory;
mod sqlite;

pub use memory::MemoryChunkStore;
pub use sqlite::SqliteChunkStore;

use crate::config::RetrievalConfig;
use crate::error::{RetrievalError, RetrievalResult};
use crate::types::{Chunk, ChunkRecord, EmbeddedChunk, NewChunk, StoreStats};

/// Receives successive scan batches. Returning an error aborts the scan.
pub type ScanVisitor<'a> = dyn FnMut(Vec<EmbeddedChunk>) -> RetrievalResult<()> + 'a;

/// Trait for chunk store backends.
///
/// Implementations must guarantee:
/// - an embedding is replaced as a whole, never observed half-written
/// - scans see a consistent snapshot and only chunks that have an embedding
/// - scans yield chunks in a stable order: `(paper_id, idx)`
pub trait ChunkStore: Send + Sync {
    /// Configuration the store was opened with.
    fn config(&self) -> &RetrievalConfig;

    /// Store a chunk emitted by the chunking feed.
    ///
    /// Fails with `AlreadyExists` for a reused id and `DuplicatePosition`
    /// for a reused `(paper_id, idx)`.
    fn insert_chunk(&self, chunk: NewChunk) -> RetrievalResult<Chunk>;

    /// Look up a chunk and its current embedding.
    fn get_chunk(&self, id: &str) -> RetrievalResult<Option<ChunkRecord>>;

    /// Validate `embedding` and attach it to `chunk_id`, replacing any
    /// previous vector. Unknown ids fail with `NotFound`.
    fn upsert_embedding(&self, chunk_id: &str, embedding: &[f32]) -> RetrievalResult<()>;

    /// Stream every embedded chunk to `visit` in batches of at most
    /// `batch_size`. Each call is an independent scan.
    fn scan(&self, batch_size: usize, visit: &mut ScanVisitor<'_>) -> RetrievalResult<()>;

    /// Delete every chunk of a paper. Returns the number removed.
    fn delete_paper(&self, paper_id: &str) -> RetrievalResult<usize>;

    /// Counters for papers, chunks and embedded chunks.
    fn stats(&self) -> RetrievalResult<StoreStats>;
}

/// Convert embedding vector to little-endian bytes for storage.
pub(crate) fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert stored bytes back to an embedding of exactly `dimension` values.
pub(crate) fn bytes_to_embedding(bytes: &[u8], dimension: usize) -> RetrievalResult<Vec<f32>> {
    if bytes.len() != dimension * 4 {
        return Err(RetrievalError::Storage(format!(
            "stored embedding has {} bytes, expected {} for dimension {}",
            bytes.len(),
            dimension * 4,
            dimension
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
