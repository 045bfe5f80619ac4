//! Command handlers for the Scholar CLI.

pub mod chunks;
pub mod embed;
pub mod search;
pub mod stats;

pub use chunks::ChunksCommand;
pub use embed::EmbedCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;

use scholar_core::{config::AppConfig, AppError, AppResult};
use scholar_retrieval::{config as retrieval_config, SemanticIndex};
use serde::de::DeserializeOwned;
use std::io::BufRead;
use std::path::Path;

/// Open the workspace's SQLite-backed index.
///
/// The retrieval config is written on first use so that later runs open the
/// store with the same dimension and metric.
pub fn open_index(config: &AppConfig) -> AppResult<SemanticIndex> {
    let workspace = &config.workspace;
    let retrieval = retrieval_config::load_config(workspace)?;

    if !retrieval_config::get_config_path(workspace).exists() {
        retrieval_config::save_config(workspace, &retrieval)?;
    }

    let index = SemanticIndex::open(&retrieval_config::get_store_path(workspace), retrieval)?;
    Ok(index)
}

/// Parse a JSON Lines file, skipping blank lines.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> AppResult<Vec<T>> {
    let file = std::fs::File::open(path)
        .map_err(|e| AppError::Config(format!("Failed to open {:?}: {}", path, e)))?;

    let mut rows = Vec::new();
    for (n, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line).map_err(|e| {
            AppError::Serialization(format!("{:?} line {}: {}", path, n + 1, e))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
