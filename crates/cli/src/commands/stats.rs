//! Stats command handler.

use clap::Args;
use scholar_core::{config::AppConfig, AppResult};
use scholar_retrieval::config::get_store_path;
use std::path::Path;

use super::{open_index, print_json};

/// Show store statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let index = open_index(config)?;
        let stats = index.store().stats()?;
        let retrieval = index.config();

        let store_path = get_store_path(&config.workspace);
        let db_size_bytes = store_size(&store_path)?;

        if self.json {
            print_json(&serde_json::json!({
                "papers": stats.papers,
                "chunks": stats.chunks,
                "embeddedChunks": stats.embedded_chunks,
                "dimension": retrieval.dimension,
                "metric": retrieval.metric,
                "dbSizeBytes": db_size_bytes,
            }))?;
        } else {
            println!("Store: {}", store_path.display());
            println!("  Papers: {}", stats.papers);
            println!("  Chunks: {} ({} embedded)", stats.chunks, stats.embedded_chunks);
            println!("  Dimension: {}", retrieval.dimension);
            println!("  Metric: {}", retrieval.metric);
            println!("  DB size: {} bytes", db_size_bytes);
        }

        Ok(())
    }
}

/// Size of the store file on disk.
fn store_size(path: &Path) -> AppResult<u64> {
    Ok(std::fs::metadata(path)?.len())
}
