//! Search command handler.

use clap::Args;
use scholar_core::{config::AppConfig, AppError, AppResult};
use scholar_retrieval::ScoredChunk;
use std::path::PathBuf;

use super::{open_index, print_json};

/// Longest content preview in human-readable output, in characters.
const PREVIEW_CHARS: usize = 120;

/// Find the chunks closest to a query embedding
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// JSON file holding the query embedding as an array of numbers
    #[arg(long)]
    pub query_file: PathBuf,

    /// Number of chunks to return (default from config)
    #[arg(short = 'k', long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let raw = std::fs::read_to_string(&self.query_file).map_err(|e| {
            AppError::Config(format!("Failed to read {:?}: {}", self.query_file, e))
        })?;
        let query: Vec<f32> = serde_json::from_str(&raw)?;

        let index = open_index(config)?;
        let results = index.search_similar_chunks_async(query, self.limit).await?;

        if self.json {
            print_json(&results)?;
        } else if results.is_empty() {
            println!("No embedded chunks in the store");
        } else {
            for (rank, hit) in results.iter().enumerate() {
                print_hit(rank + 1, hit);
            }
        }

        Ok(())
    }
}

fn print_hit(rank: usize, hit: &ScoredChunk) {
    let page = hit
        .page
        .map(|p| format!(", p. {}", p))
        .unwrap_or_default();
    println!(
        "{:>3}. {:.4}  {}#{}{}  [{}]",
        rank, hit.distance, hit.paper_id, hit.idx, page, hit.id
    );
    println!("     {}", preview(&hit.content));
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{}…", cut)
    }
}
