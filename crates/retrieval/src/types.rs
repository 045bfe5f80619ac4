//! Retrieval data model.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A contiguous fragment of a paper's text, addressable by paper and position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Stable handle used for upserts and cross-references
    pub id: String,

    /// Owning paper
    pub paper_id: String,

    /// Zero-based position within the paper, unique per paper
    pub idx: u32,

    /// Source page, when the content is page-addressable
    pub page: Option<u32>,

    /// Chunk text
    pub content: String,
}

/// A chunk emitted by the upstream text-chunking feed, not yet stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChunk {
    /// Explicit id; a UUID is assigned when absent
    #[serde(default)]
    pub id: Option<String>,

    pub paper_id: String,

    pub idx: u32,

    #[serde(default)]
    pub page: Option<u32>,

    pub content: String,
}

impl NewChunk {
    pub fn new(paper_id: impl Into<String>, idx: u32, content: impl Into<String>) -> Self {
        Self {
            id: None,
            paper_id: paper_id.into(),
            idx,
            page: None,
            content: content.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Resolve into a stored chunk, generating an id if none was supplied.
    pub(crate) fn into_chunk(self) -> Chunk {
        Chunk {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            paper_id: self.paper_id,
            idx: self.idx,
            page: self.page,
            content: self.content,
        }
    }
}

/// A chunk together with whatever embedding it currently has.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub chunk: Chunk,
    pub embedding: Option<Arc<[f32]>>,
}

/// A chunk yielded by a store scan; always carries its embedding.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Arc<[f32]>,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredChunk {
    pub id: String,
    pub paper_id: String,
    pub idx: u32,
    pub page: Option<u32>,
    pub content: String,

    /// Distance to the query under the store's metric (smaller is closer)
    pub distance: f32,
}

/// Store-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Distinct papers with at least one chunk
    pub papers: u64,

    /// All chunks, embedded or not
    pub chunks: u64,

    /// Chunks that are visible to search
    pub embedded_chunks: u64,
}
