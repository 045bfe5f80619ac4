//! Embed command handler.
//!
//! Attaches externally generated embeddings to chunks that already exist.

use clap::Args;
use scholar_core::{config::AppConfig, AppResult};
use serde::Deserialize;
use std::path::PathBuf;

use super::{open_index, read_jsonl};

/// One line of an embeddings file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddingRow {
    chunk_id: String,
    embedding: Vec<f32>,
}

/// Attach embeddings to existing chunks
#[derive(Args, Debug)]
pub struct EmbedCommand {
    /// JSON Lines file of {chunkId, embedding} rows
    pub file: PathBuf,
}

impl EmbedCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Saving embeddings from {:?}", self.file);

        let rows: Vec<EmbeddingRow> = read_jsonl(&self.file)?;
        let index = open_index(config)?;
        let total = rows.len();

        for (saved, row) in rows.into_iter().enumerate() {
            let chunk_id = row.chunk_id.clone();
            if let Err(e) = index
                .save_chunk_embedding_async(row.chunk_id, row.embedding)
                .await
            {
                tracing::error!(
                    "Stopped after {} of {} embeddings: chunk {}: {}",
                    saved,
                    total,
                    chunk_id,
                    e
                );
                return Err(e.into());
            }
        }

        println!("Saved {} embeddings", total);
        Ok(())
    }
}
