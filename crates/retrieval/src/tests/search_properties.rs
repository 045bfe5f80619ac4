//! Ranking and contract tests, run against every store backend.

use crate::{
    DistanceMetric, NewChunk, RetrievalConfig, RetrievalError, ScoredChunk, SemanticIndex,
};
use std::cmp::Ordering;
use tempfile::TempDir;

/// An index plus whatever keeps its backing storage alive.
struct Backend {
    name: &'static str,
    index: SemanticIndex,
    _temp: Option<TempDir>,
}

fn backends(config: RetrievalConfig) -> Vec<Backend> {
    let temp = TempDir::new().unwrap();
    let sqlite = SemanticIndex::open(&temp.path().join("chunks.sqlite"), config.clone()).unwrap();

    vec![
        Backend {
            name: "memory",
            index: SemanticIndex::in_memory(config).unwrap(),
            _temp: None,
        },
        Backend {
            name: "sqlite",
            index: sqlite,
            _temp: Some(temp),
        },
    ]
}

fn add(index: &SemanticIndex, id: &str, paper: &str, idx: u32, embedding: &[f32]) {
    index
        .store()
        .insert_chunk(NewChunk::new(paper, idx, format!("content of {}", id)).with_id(id))
        .unwrap();
    index.save_chunk_embedding(id, embedding).unwrap();
}

fn ids(results: &[ScoredChunk]) -> Vec<&str> {
    results.iter().map(|r| r.id.as_str()).collect()
}

/// Deterministic pseudo-random vectors (64-bit LCG).
fn vectors(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
    };
    (0..count)
        .map(|_| (0..dimension).map(|_| next()).collect())
        .collect()
}

#[test]
fn test_concrete_scenario() {
    for backend in backends(RetrievalConfig::new(4, DistanceMetric::Cosine)) {
        let index = &backend.index;
        add(index, "A", "paper1", 0, &[1.0, 0.0, 0.0, 0.0]);
        add(index, "B", "paper1", 1, &[0.9, 0.1, 0.0, 0.0]);
        add(index, "C", "paper1", 2, &[0.0, 1.0, 0.0, 0.0]);

        let query = [1.0, 0.0, 0.0, 0.0];
        let results = index.search_similar_chunks(&query, Some(3)).unwrap();
        assert_eq!(ids(&results), vec!["A", "B", "C"], "{}", backend.name);
        assert_eq!(results[0].distance, 0.0);
        assert!(results[1].distance > 0.0 && results[1].distance < 0.01);
        assert!((results[2].distance - 1.0).abs() < 1e-6);
        assert_eq!(results[1].paper_id, "paper1");
        assert_eq!(results[1].idx, 1);
        assert_eq!(results[1].content, "content of B");

        let top = index.search_similar_chunks(&query, Some(1)).unwrap();
        assert_eq!(ids(&top), vec!["A"], "{}", backend.name);
    }
}

#[test]
fn test_dimension_invariant_on_both_paths() {
    for backend in backends(RetrievalConfig::new(4, DistanceMetric::Cosine)) {
        let index = &backend.index;
        index
            .store()
            .insert_chunk(NewChunk::new("paper1", 0, "text").with_id("c1"))
            .unwrap();

        for len in [0usize, 3, 5, 8] {
            let vector = vec![0.5; len];
            assert!(
                matches!(
                    index.save_chunk_embedding("c1", &vector),
                    Err(RetrievalError::Dimension { expected: 4, actual }) if actual == len
                ),
                "{}: save with len {}",
                backend.name,
                len
            );
            assert!(
                matches!(
                    index.search_similar_chunks(&vector, Some(3)),
                    Err(RetrievalError::Dimension { expected: 4, actual }) if actual == len
                ),
                "{}: search with len {}",
                backend.name,
                len
            );
        }

        // Nothing was written.
        assert_eq!(index.store().stats().unwrap().embedded_chunks, 0);
        let record = index.store().get_chunk("c1").unwrap().unwrap();
        assert!(record.embedding.is_none());
    }
}

#[test]
fn test_unknown_chunk_is_not_created() {
    for backend in backends(RetrievalConfig::new(2, DistanceMetric::Cosine)) {
        let index = &backend.index;
        assert!(matches!(
            index.save_chunk_embedding("nope", &[1.0, 0.0]),
            Err(RetrievalError::NotFound(_))
        ));
        assert_eq!(index.store().stats().unwrap().chunks, 0, "{}", backend.name);
    }
}

#[test]
fn test_upsert_idempotence_and_replacement() {
    for backend in backends(RetrievalConfig::new(4, DistanceMetric::Cosine)) {
        let index = &backend.index;
        add(index, "X", "paper1", 0, &[1.0, 0.0, 0.0, 0.0]);
        add(index, "Y", "paper1", 1, &[0.5, 0.5, 0.0, 0.0]);

        let query = [1.0, 0.0, 0.0, 0.0];
        let once = index.search_similar_chunks(&query, None).unwrap();
        index.save_chunk_embedding("X", &[1.0, 0.0, 0.0, 0.0]).unwrap();
        let twice = index.search_similar_chunks(&query, None).unwrap();
        assert_eq!(once, twice, "{}", backend.name);
        assert_eq!(index.store().stats().unwrap().embedded_chunks, 2);

        // Replacing the vector drops the old one entirely.
        index.save_chunk_embedding("X", &[0.0, 0.0, 0.0, 1.0]).unwrap();
        let replaced = index.search_similar_chunks(&query, None).unwrap();
        assert_eq!(ids(&replaced), vec!["Y", "X"], "{}", backend.name);
        assert!((replaced[1].distance - 1.0).abs() < 1e-6);
        assert_eq!(index.store().stats().unwrap().embedded_chunks, 2);
    }
}

#[test]
fn test_exact_top_k_matches_brute_force() {
    const N: usize = 50;
    const DIM: usize = 8;

    for metric in [DistanceMetric::Cosine, DistanceMetric::Euclidean] {
        let mut config = RetrievalConfig::new(DIM, metric);
        // Small batches so the parallel merge is exercised.
        config.scan_batch_size = 7;

        for backend in backends(config) {
            let index = &backend.index;
            let data = vectors(N, DIM, 42);
            for (i, vector) in data.iter().enumerate() {
                let paper = format!("paper{}", i % 4);
                add(index, &format!("chunk{:02}", i), &paper, (i / 4) as u32, vector);
            }

            for (q, query) in vectors(5, DIM, 7).iter().enumerate() {
                let mut reference: Vec<(f32, u32, String)> = data
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let id = format!("chunk{:02}", i);
                        (metric.distance(query, v), (i / 4) as u32, id)
                    })
                    .collect();
                reference.sort_by(|a, b| {
                    a.0.total_cmp(&b.0)
                        .then_with(|| a.1.cmp(&b.1))
                        .then_with(|| a.2.cmp(&b.2))
                });

                for k in [1usize, 5, 10, 49, 50, 80] {
                    let results = index.search_similar_chunks(query, Some(k)).unwrap();
                    let label = format!("{} {} q{} k{}", backend.name, metric, q, k);
                    assert_eq!(results.len(), k.min(N), "{}", label);

                    let expected: Vec<&str> =
                        reference.iter().take(k).map(|r| r.2.as_str()).collect();
                    assert_eq!(ids(&results), expected, "{}", label);

                    for (result, (distance, _, _)) in results.iter().zip(reference.iter()) {
                        assert_eq!(result.distance.to_bits(), distance.to_bits());
                        assert!(result.distance >= 0.0);
                    }
                    assert!(results
                        .windows(2)
                        .all(|w| w[0].distance.total_cmp(&w[1].distance) != Ordering::Greater));
                }
            }
        }
    }
}

#[test]
fn test_ties_break_by_idx_then_id() {
    for backend in backends(RetrievalConfig::new(3, DistanceMetric::Cosine)) {
        let index = &backend.index;
        let same = [0.2, 0.4, 0.6];
        // Inserted out of order on purpose.
        add(index, "c", "p3", 2, &same);
        add(index, "b", "p2", 1, &same);
        add(index, "z", "p1", 0, &same);
        add(index, "a", "p1", 1, &same);
        add(index, "far", "p0", 0, &[-0.2, -0.4, -0.6]);

        let results = index.search_similar_chunks(&[0.2, 0.4, 0.6], Some(10)).unwrap();
        assert_eq!(ids(&results), vec!["z", "a", "b", "c", "far"], "{}", backend.name);

        // Truncation keeps the same prefix.
        let top2 = index.search_similar_chunks(&[0.2, 0.4, 0.6], Some(2)).unwrap();
        assert_eq!(ids(&top2), vec!["z", "a"], "{}", backend.name);
    }
}

#[test]
fn test_empty_store_returns_empty() {
    for backend in backends(RetrievalConfig::new(2, DistanceMetric::Cosine)) {
        let index = &backend.index;
        assert!(index.search_similar_chunks(&[1.0, 0.0], None).unwrap().is_empty());

        // Chunks without embeddings are not searchable.
        index
            .store()
            .insert_chunk(NewChunk::new("paper1", 0, "pending"))
            .unwrap();
        assert!(index.search_similar_chunks(&[1.0, 0.0], Some(5)).unwrap().is_empty());
    }
}

#[test]
fn test_limit_bounding() {
    for backend in backends(RetrievalConfig::new(2, DistanceMetric::Cosine)) {
        let index = &backend.index;
        add(index, "a", "p", 0, &[1.0, 0.0]);
        add(index, "b", "p", 1, &[0.0, 1.0]);
        add(index, "c", "p", 2, &[1.0, 1.0]);

        assert_eq!(index.search_similar_chunks(&[1.0, 0.0], Some(2)).unwrap().len(), 2);
        assert_eq!(index.search_similar_chunks(&[1.0, 0.0], Some(10)).unwrap().len(), 3);
        assert_eq!(index.search_similar_chunks(&[1.0, 0.0], None).unwrap().len(), 3);
        assert!(matches!(
            index.search_similar_chunks(&[1.0, 0.0], Some(0)),
            Err(RetrievalError::InvalidLimit(0))
        ));
    }
}

#[test]
fn test_default_limit_is_ten() {
    for backend in backends(RetrievalConfig::new(2, DistanceMetric::Euclidean)) {
        let index = &backend.index;
        for i in 0..15u32 {
            add(index, &format!("c{:02}", i), "p", i, &[i as f32, 0.0]);
        }
        let results = index.search_similar_chunks(&[0.0, 0.0], None).unwrap();
        assert_eq!(results.len(), 10, "{}", backend.name);
        assert_eq!(results[0].id, "c00");
        assert_eq!(results[9].id, "c09");
        assert_eq!(results[3].distance, 3.0);
    }
}

#[test]
fn test_deleted_paper_leaves_search() {
    for backend in backends(RetrievalConfig::new(2, DistanceMetric::Cosine)) {
        let index = &backend.index;
        add(index, "a0", "a", 0, &[1.0, 0.0]);
        add(index, "a1", "a", 1, &[1.0, 0.1]);
        add(index, "b0", "b", 0, &[0.0, 1.0]);

        assert_eq!(index.store().delete_paper("a").unwrap(), 2);
        let results = index.search_similar_chunks(&[1.0, 0.0], None).unwrap();
        assert_eq!(ids(&results), vec!["b0"], "{}", backend.name);
    }
}

#[test]
fn test_page_is_carried_through() {
    for backend in backends(RetrievalConfig::new(2, DistanceMetric::Cosine)) {
        let index = &backend.index;
        index
            .store()
            .insert_chunk(NewChunk::new("p", 0, "on page 4").with_id("paged").with_page(4))
            .unwrap();
        index.save_chunk_embedding("paged", &[1.0, 0.0]).unwrap();
        add(index, "unpaged", "p", 1, &[0.0, 1.0]);

        let results = index.search_similar_chunks(&[1.0, 0.0], None).unwrap();
        assert_eq!(results[0].page, Some(4), "{}", backend.name);
        assert_eq!(results[1].page, None, "{}", backend.name);
    }
}

/// A SQLite-backed index with two embedded chunks, plus its file path.
fn sqlite_index(temp: &TempDir) -> (SemanticIndex, std::path::PathBuf) {
    let path = temp.path().join("chunks.sqlite");
    let config = RetrievalConfig::new(4, DistanceMetric::Cosine);
    let index = SemanticIndex::open(&path, config).unwrap();
    add(&index, "good", "paper1", 0, &[1.0, 0.0, 0.0, 0.0]);
    add(&index, "bad", "paper1", 1, &[0.0, 1.0, 0.0, 0.0]);
    (index, path)
}

#[test]
fn test_search_fails_on_corrupt_embedding_blob() {
    let temp = TempDir::new().unwrap();
    let (index, path) = sqlite_index(&temp);

    rusqlite::Connection::open(&path)
        .unwrap()
        .execute("UPDATE chunks SET embedding = x'0000' WHERE id = 'bad'", [])
        .unwrap();

    let result = index.search_similar_chunks(&[1.0, 0.0, 0.0, 0.0], None);
    assert!(matches!(result, Err(RetrievalError::Storage(_))), "{:?}", result);
}

#[test]
fn test_search_fails_on_stored_dimension_mismatch() {
    let temp = TempDir::new().unwrap();
    let (index, path) = sqlite_index(&temp);

    // A well-formed 2-float vector recorded with its own dimension.
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute(
            "UPDATE chunks SET embedding = ?1, embedding_dim = 2 WHERE id = 'bad'",
            rusqlite::params![crate::store::embedding_to_bytes(&[0.0, 1.0])],
        )
        .unwrap();

    let result = index.search_similar_chunks(&[1.0, 0.0, 0.0, 0.0], Some(1));
    assert!(matches!(result, Err(RetrievalError::Storage(_))), "{:?}", result);
}
