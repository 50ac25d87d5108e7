// Merge and summary pipeline - the main implementation
pub mod combine;

// Logging setup and formatting helpers shared with the binary
pub mod utils;

// Re-export main types for convenience
pub use combine::{
    combine_to_db, discover_shards, merge_to_file, BulkLoader, CombineConfig, CombineError,
    CombineProcessor, CombineStats, ComparisonMode, DirectoryStore, MergeStream, SummaryFormat,
};
