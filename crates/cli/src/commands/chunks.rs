//! Chunks command handler.
//!
//! Receives chunk rows from the ingestion pipeline and removes papers.

use clap::{Args, Subcommand};
use scholar_core::{config::AppConfig, AppError, AppResult};
use scholar_retrieval::{NewChunk, SemanticIndex};
use std::path::PathBuf;

use super::{open_index, print_json, read_jsonl};

/// Manage chunks produced by the ingestion pipeline
#[derive(Args, Debug)]
pub struct ChunksCommand {
    #[command(subcommand)]
    pub action: ChunksAction,
}

#[derive(Subcommand, Debug)]
pub enum ChunksAction {
    /// Import chunk rows ({id?, paperId, idx, page?, content}) from a JSONL file
    Import(ChunksImportCommand),
    /// Delete every chunk of a paper
    DeletePaper(DeletePaperCommand),
}

/// Import chunk rows
#[derive(Args, Debug)]
pub struct ChunksImportCommand {
    /// JSON Lines file with one chunk per line
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChunksImportCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Importing chunks from {:?}", self.file);

        let rows: Vec<NewChunk> = read_jsonl(&self.file)?;
        let index = open_index(config)?;

        let ids = import_rows(&index, rows)?;

        if self.json {
            print_json(&serde_json::json!({
                "imported": ids.len(),
                "ids": ids,
            }))?;
        } else {
            println!("Imported {} chunks", ids.len());
        }

        Ok(())
    }
}

/// Insert `rows` in order, stopping at the first failure.
///
/// Rows before the failing one stay committed; the error says how many.
fn import_rows(index: &SemanticIndex, rows: Vec<NewChunk>) -> AppResult<Vec<String>> {
    let total = rows.len();
    let mut ids = Vec::with_capacity(total);

    for row in rows {
        let position = format!("{}#{}", row.paper_id, row.idx);
        match index.store().insert_chunk(row) {
            Ok(chunk) => ids.push(chunk.id),
            Err(e) => {
                tracing::error!(
                    "Stopped after {} of {} chunks: {}: {}",
                    ids.len(),
                    total,
                    position,
                    e
                );
                return Err(AppError::Retrieval(format!(
                    "imported {} of {} chunks before {} failed: {}",
                    ids.len(),
                    total,
                    position,
                    e
                )));
            }
        }
    }

    Ok(ids)
}

/// Delete a paper's chunks
#[derive(Args, Debug)]
pub struct DeletePaperCommand {
    /// Paper identifier
    pub paper_id: String,
}

impl DeletePaperCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let index = open_index(config)?;
        let deleted = index.store().delete_paper(&self.paper_id)?;

        println!("Deleted {} chunks of paper '{}'", deleted, self.paper_id);
        Ok(())
    }
}

impl ChunksCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            ChunksAction::Import(cmd) => cmd.execute(config).await,
            ChunksAction::DeletePaper(cmd) => cmd.execute(config).await,
        }
    }
}
