pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_IO_BUFFER_SIZE_KB: usize = 64;

pub const MIN_BATCH_SIZE: usize = 1;
pub const MAX_BATCH_SIZE: usize = 1_000_000;
pub const MIN_IO_BUFFER_SIZE_KB: usize = 4;
pub const MAX_IO_BUFFER_SIZE_KB: usize = 65_536;

pub const BYTES_PER_KB: usize = 1024;

pub const FIELD_SEPARATOR: u8 = b'\t';
pub const RECORD_TERMINATOR: u8 = b'\n';
pub const QUOTE: u8 = b'"';
pub const ESCAPE: u8 = b'\\';

// Shard counts above this make the sorted-array queue's O(N) insert noticeable.
pub const MERGE_QUEUE_SOFT_LIMIT: usize = 512;

pub const PARTITION_FILE_PREFIX: &str = "part-";
pub const PARTITION_FILE_EXTENSION: &str = ".tsv";
pub const PARTITION_TEMP_EXTENSION: &str = ".tmp";

pub const SINK_THREAD_NAME: &str = "bulk-load";

pub const GROUP_KEY_COLUMNS: usize = 2;
pub const USER_GROUP_KEY_COLUMNS: usize = 3;
pub const DIR_USAGE_KEY_COLUMNS: usize = 4;
pub const DIR_USAGE_AGE_KEY_COLUMNS: usize = 5;

pub const COUNT_SIZE_SUMMARY_COLUMNS: usize = 2;
pub const AGE_BUCKETS: usize = 8;
// count, size, oldest atime, newest mtime, then atime and mtime bucket sizes
pub const DIR_USAGE_SUMMARY_COLUMNS: usize = 4 + 2 * AGE_BUCKETS;
pub const DIR_USAGE_OLDEST_ATIME_INDEX: usize = 2;
pub const DIR_USAGE_NEWEST_MTIME_INDEX: usize = 3;
