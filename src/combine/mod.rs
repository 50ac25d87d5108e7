pub mod combiner;
pub mod config;
pub mod constants;
pub mod error;
pub mod merger;
pub mod pipe;
pub mod processor;
pub mod record;
pub mod reducer;
pub mod store;
pub mod unquote;

#[cfg(test)]
mod tests;

pub use combiner::{Combine, SumPair, SumWithExtremes};
pub use config::CombineConfig;
pub use error::{CombineError, Result, UnquoteError};
pub use merger::MergeStream;
pub use processor::CombineProcessor;
pub use record::{ComparisonMode, SummaryFormat};
pub use reducer::{reduce, ReduceStats};
pub use store::{BulkLoader, DirectoryStore};
pub use unquote::{unquote, unquote_prefix};

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombineStats {
    pub shards_merged: usize,
    pub lines_read: usize,
    pub records_written: usize,
    pub elapsed_ms: u64,
}

/// Merges and reduces `shard_paths`, bulk loading the result into the
/// directory store at `db_dir`.
pub fn combine_to_db(
    shard_paths: &[PathBuf],
    db_dir: &Path,
    format: SummaryFormat,
    config: CombineConfig,
) -> Result<CombineStats> {
    CombineProcessor::new(format, config).combine_to_db(shard_paths, db_dir)
}

/// Merges and reduces `shard_paths` into a flat file at `output`.
pub fn merge_to_file(
    shard_paths: &[PathBuf],
    output: &Path,
    format: SummaryFormat,
    config: CombineConfig,
) -> Result<CombineStats> {
    CombineProcessor::new(format, config).merge_to_file(shard_paths, output)
}

/// Finds the shard files directly inside `dir` whose names end in `suffix`,
/// sorted by path.
pub fn discover_shards(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut shards = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| CombineError::Io(e.into()))?;
        let matches_suffix = entry
            .file_name()
            .to_str()
            .map_or(false, |name| name.ends_with(suffix));

        if entry.file_type().is_file() && matches_suffix {
            shards.push(entry.into_path());
        }
    }

    if shards.is_empty() {
        return Err(CombineError::NoShards {
            dir: dir.to_path_buf(),
            suffix: suffix.to_string(),
        });
    }

    shards.sort();
    Ok(shards)
}
