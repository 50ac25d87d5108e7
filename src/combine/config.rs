use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::combine::constants::*;
use crate::combine::record::{ComparisonMode, SummaryFormat};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineConfig {
    /// Records per bulk-load transaction.
    pub batch_size: usize,
    pub io_buffer_size_kb: usize,
    /// Overrides the format's default ordering when shards were sorted
    /// differently.
    pub comparison: Option<ComparisonMode>,
    pub verbosity: String,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            io_buffer_size_kb: DEFAULT_IO_BUFFER_SIZE_KB,
            comparison: None,
            verbosity: "normal".to_string(),
        }
    }
}

impl CombineConfig {
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &std::path::Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size < MIN_BATCH_SIZE || self.batch_size > MAX_BATCH_SIZE {
            return Err(anyhow::anyhow!(
                "Batch size must be between {} and {}",
                MIN_BATCH_SIZE, MAX_BATCH_SIZE
            ));
        }

        if self.io_buffer_size_kb < MIN_IO_BUFFER_SIZE_KB
            || self.io_buffer_size_kb > MAX_IO_BUFFER_SIZE_KB {
            return Err(anyhow::anyhow!(
                "IO buffer size must be between {} and {} KB",
                MIN_IO_BUFFER_SIZE_KB, MAX_IO_BUFFER_SIZE_KB
            ));
        }

        if !matches!(self.verbosity.as_str(), "silent" | "normal" | "verbose") {
            return Err(anyhow::anyhow!(
                "Verbosity must be one of silent, normal or verbose, got {:?}",
                self.verbosity
            ));
        }

        Ok(())
    }

    pub fn io_buffer_size_bytes(&self) -> usize {
        self.io_buffer_size_kb * BYTES_PER_KB
    }

    pub fn comparison_for(&self, format: SummaryFormat) -> ComparisonMode {
        self.comparison.unwrap_or_else(|| format.default_comparison())
    }
}
