//! In-memory chunk store.

use super::{ChunkStore, ScanVisitor};
use crate::config::RetrievalConfig;
use crate::error::{RetrievalError, RetrievalResult};
use crate::types::{Chunk, ChunkRecord, EmbeddedChunk, NewChunk, StoreStats};
use crate::validator::VectorValidator;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, ChunkRecord>,
    /// (paper_id, idx) -> id, doubles as the scan order
    positions: BTreeMap<(String, u32), String>,
}

/// Chunk store kept entirely in process memory.
///
/// Embeddings are held as `Arc<[f32]>` and swapped as a whole under the
/// write lock, so a reader holds either the old vector or the new one.
/// Scans copy a snapshot out of the lock before any scoring happens.
#[derive(Debug)]
pub struct MemoryChunkStore {
    config: RetrievalConfig,
    validator: VectorValidator,
    inner: RwLock<Inner>,
}

impl MemoryChunkStore {
    pub fn new(config: RetrievalConfig) -> RetrievalResult<Self> {
        config.validate()?;
        Ok(Self {
            validator: VectorValidator::new(config.dimension),
            config,
            inner: RwLock::new(Inner::default()),
        })
    }

    fn read(&self) -> RetrievalResult<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| RetrievalError::Storage("chunk store lock poisoned".to_string()))
    }

    fn write(&self) -> RetrievalResult<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| RetrievalError::Storage("chunk store lock poisoned".to_string()))
    }
}

impl ChunkStore for MemoryChunkStore {
    fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    fn insert_chunk(&self, new_chunk: NewChunk) -> RetrievalResult<Chunk> {
        let chunk = new_chunk.into_chunk();
        let mut inner = self.write()?;

        if inner.records.contains_key(&chunk.id) {
            return Err(RetrievalError::AlreadyExists(chunk.id));
        }
        let position = (chunk.paper_id.clone(), chunk.idx);
        if inner.positions.contains_key(&position) {
            return Err(RetrievalError::DuplicatePosition {
                paper_id: chunk.paper_id,
                idx: chunk.idx,
            });
        }

        inner.positions.insert(position, chunk.id.clone());
        inner.records.insert(
            chunk.id.clone(),
            ChunkRecord {
                chunk: chunk.clone(),
                embedding: None,
            },
        );
        Ok(chunk)
    }

    fn get_chunk(&self, id: &str) -> RetrievalResult<Option<ChunkRecord>> {
        Ok(self.read()?.records.get(id).cloned())
    }

    fn upsert_embedding(&self, chunk_id: &str, embedding: &[f32]) -> RetrievalResult<()> {
        self.validator.validate(embedding)?;

        // Allocate before taking the lock.
        let vector: Arc<[f32]> = Arc::from(embedding);

        let mut inner = self.write()?;
        let record = inner
            .records
            .get_mut(chunk_id)
            .ok_or_else(|| RetrievalError::NotFound(chunk_id.to_string()))?;
        record.embedding = Some(vector);

        tracing::debug!("Stored embedding for chunk {}", chunk_id);
        Ok(())
    }

    fn scan(&self, batch_size: usize, visit: &mut ScanVisitor<'_>) -> RetrievalResult<()> {
        let batch_size = batch_size.max(1);

        let snapshot: Vec<EmbeddedChunk> = {
            let inner = self.read()?;
            inner
                .positions
                .values()
                .filter_map(|id| inner.records.get(id))
                .filter_map(|record| {
                    record.embedding.as_ref().map(|embedding| EmbeddedChunk {
                        chunk: record.chunk.clone(),
                        embedding: Arc::clone(embedding),
                    })
                })
                .collect()
        };

        let mut remaining = snapshot.into_iter().peekable();
        while remaining.peek().is_some() {
            visit(remaining.by_ref().take(batch_size).collect())?;
        }
        Ok(())
    }

    fn delete_paper(&self, paper_id: &str) -> RetrievalResult<usize> {
        let mut inner = self.write()?;

        let ids: Vec<String> = inner
            .positions
            .range((paper_id.to_string(), 0)..=(paper_id.to_string(), u32::MAX))
            .map(|(_, id)| id.clone())
            .collect();

        for id in &ids {
            if let Some(record) = inner.records.remove(id) {
                inner
                    .positions
                    .remove(&(record.chunk.paper_id, record.chunk.idx));
            }
        }

        tracing::info!("Deleted {} chunks of paper {}", ids.len(), paper_id);
        Ok(ids.len())
    }

    fn stats(&self) -> RetrievalResult<StoreStats> {
        let inner = self.read()?;

        let mut papers = 0u64;
        let mut last_paper: Option<&str> = None;
        for (paper_id, _) in inner.positions.keys() {
            if last_paper != Some(paper_id.as_str()) {
                papers += 1;
                last_paper = Some(paper_id.as_str());
            }
        }

        Ok(StoreStats {
            papers,
            chunks: inner.records.len() as u64,
            embedded_chunks: inner
                .records
                .values()
                .filter(|r| r.embedding.is_some())
                .count() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;

    fn store() -> MemoryChunkStore {
        MemoryChunkStore::new(RetrievalConfig::new(3, DistanceMetric::Cosine)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(matches!(
            MemoryChunkStore::new(RetrievalConfig::new(0, DistanceMetric::Cosine)),
            Err(RetrievalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_scan_order_follows_position() {
        let store = store();
        store.insert_chunk(NewChunk::new("b", 0, "b0").with_id("z")).unwrap();
        store.insert_chunk(NewChunk::new("a", 1, "a1").with_id("y")).unwrap();
        store.insert_chunk(NewChunk::new("a", 0, "a0").with_id("x")).unwrap();
        for id in ["x", "y", "z"] {
            store.upsert_embedding(id, &[1.0, 0.0, 0.0]).unwrap();
        }

        let mut ids = Vec::new();
        store
            .scan(2, &mut |batch| {
                assert!(batch.len() <= 2);
                ids.extend(batch.into_iter().map(|c| c.chunk.id));
                Ok(())
            })
            .unwrap();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_scan_of_empty_store_never_visits() {
        let store = store();
        store.insert_chunk(NewChunk::new("a", 0, "no vector")).unwrap();

        let mut calls = 0;
        store
            .scan(4, &mut |_| {
                calls += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_writes() {
        let store = store();
        store.insert_chunk(NewChunk::new("a", 0, "a0").with_id("x")).unwrap();
        store.upsert_embedding("x", &[1.0, 0.0, 0.0]).unwrap();

        let mut seen = Vec::new();
        store
            .scan(1, &mut |batch| {
                // A write issued mid-scan must not alter the vector in hand.
                store.upsert_embedding("x", &[0.0, 1.0, 0.0])?;
                seen.extend(batch.into_iter().map(|c| c.embedding.to_vec()));
                Ok(())
            })
            .unwrap();

        assert_eq!(seen, vec![vec![1.0, 0.0, 0.0]]);
        let record = store.get_chunk("x").unwrap().unwrap();
        assert_eq!(record.embedding.as_deref(), Some(&[0.0, 1.0, 0.0][..]));
    }

    #[test]
    fn test_delete_paper_only_touches_that_paper() {
        let store = store();
        store.insert_chunk(NewChunk::new("a", 0, "a0")).unwrap();
        store.insert_chunk(NewChunk::new("a", 7, "a7")).unwrap();
        store.insert_chunk(NewChunk::new("ab", 0, "ab0")).unwrap();

        assert_eq!(store.delete_paper("a").unwrap(), 2);

        let stats = store.stats().unwrap();
        assert_eq!(stats, StoreStats { papers: 1, chunks: 1, embedded_chunks: 0 });

        // Position is free again after deletion.
        store.insert_chunk(NewChunk::new("a", 0, "a0 again")).unwrap();
    }
}
