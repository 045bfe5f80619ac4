//! Exact k-nearest-neighbor search over a chunk store.
//!
//! Every embedded chunk is scored against the query; the best `limit` are
//! kept in a bounded max-heap. Ranking is by distance, then `idx`, then `id`,
//! which is a total order, so the result is identical to sorting the full
//! candidate list no matter how the scan is batched or scored in parallel.

use crate::config::RetrievalConfig;
use crate::error::{RetrievalError, RetrievalResult};
use crate::store::ChunkStore;
use crate::types::{Chunk, ScoredChunk};
use crate::validator::VectorValidator;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Instant;

/// A scored chunk inside the top-k heap.
#[derive(Debug)]
struct Candidate {
    distance: f32,
    chunk: Chunk,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    /// Smaller is better: closer distance, then lower idx, then lower id.
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.chunk.idx.cmp(&other.chunk.idx))
            .then_with(|| self.chunk.id.cmp(&other.chunk.id))
    }
}

impl From<Candidate> for ScoredChunk {
    fn from(candidate: Candidate) -> Self {
        let Chunk {
            id,
            paper_id,
            idx,
            page,
            content,
        } = candidate.chunk;
        ScoredChunk {
            id,
            paper_id,
            idx,
            page,
            content,
            distance: candidate.distance,
        }
    }
}

/// Keeps the `k` best candidates seen so far.
#[derive(Debug)]
struct TopK {
    k: usize,
    // Max-heap: the worst kept candidate is on top.
    heap: BinaryHeap<Candidate>,
}

impl TopK {
    fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    fn push(&mut self, candidate: Candidate) {
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if self.heap.peek().is_some_and(|worst| candidate < *worst) {
            self.heap.pop();
            self.heap.push(candidate);
        }
    }

    /// Best first.
    fn into_sorted_vec(self) -> Vec<Candidate> {
        self.heap.into_sorted_vec()
    }
}

/// The similarity search service.
#[derive(Clone)]
pub struct SimilaritySearch {
    store: Arc<dyn ChunkStore>,
    config: RetrievalConfig,
    validator: VectorValidator,
}

impl SimilaritySearch {
    /// Search `store` under the configuration it was opened with.
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        let config = store.config().clone();
        Self {
            validator: VectorValidator::new(config.dimension),
            config,
            store,
        }
    }

    /// Return the `limit` chunks closest to `query`, closest first.
    ///
    /// A zero limit fails with `InvalidLimit` and a malformed query with
    /// `Dimension`/`NonFinite`, both before the store is touched. Limits
    /// above `max_limit` are clamped. An empty store yields an empty list.
    pub fn search(&self, query: &[f32], limit: usize) -> RetrievalResult<Vec<ScoredChunk>> {
        if limit == 0 {
            return Err(RetrievalError::InvalidLimit(limit));
        }
        self.validator.validate(query)?;

        let k = self.effective_limit(limit);
        let metric = self.config.metric;
        let start = Instant::now();
        let mut top = TopK::new(k);
        let mut scanned = 0usize;

        self.store.scan(self.config.scan_batch_size, &mut |batch| {
            scanned += batch.len();
            let scored: Vec<Candidate> = batch
                .into_par_iter()
                .map(|entry| Candidate {
                    distance: metric.distance(query, &entry.embedding),
                    chunk: entry.chunk,
                })
                .collect();
            for candidate in scored {
                top.push(candidate);
            }
            Ok(())
        })?;

        let results: Vec<ScoredChunk> = top
            .into_sorted_vec()
            .into_iter()
            .map(ScoredChunk::from)
            .collect();

        tracing::debug!(
            "Search scored {} chunks, returning {} (limit {}) in {:.2}ms",
            scanned,
            results.len(),
            k,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(results)
    }

    fn effective_limit(&self, limit: usize) -> usize {
        if limit > self.config.max_limit {
            tracing::warn!(
                "Search limit {} exceeds maximum {}, clamping",
                limit,
                self.config.max_limit
            );
            self.config.max_limit
        } else {
            limit
        }
    }
}
