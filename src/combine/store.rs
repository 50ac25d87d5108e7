use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::combine::constants::*;

/// Batched ingestion entry point of a database the combined stream is
/// loaded into.
pub trait BulkLoader: Send {
    /// Consumes `reader` to end-of-stream, committing every `batch_size`
    /// records as one unit. Any error is terminal for the load.
    fn store(&mut self, reader: &mut dyn BufRead, batch_size: usize) -> Result<()>;
}

/// Stores summarised records as a directory of partition files, one per
/// committed batch.
///
/// A batch is written to a temporary file and renamed into place, so a
/// failed load never leaves a half-written partition behind.
#[derive(Debug)]
pub struct DirectoryStore {
    dir: PathBuf,
    next_partition: usize,
    records_stored: usize,
}

impl DirectoryStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create database directory {}", dir.display()))?;

        let next_partition = Self::partitions_in(dir)?.len();

        Ok(Self {
            dir: dir.to_path_buf(),
            next_partition,
            records_stored: 0,
        })
    }

    /// Committed partition files, in commit order.
    pub fn partitions(&self) -> Result<Vec<PathBuf>> {
        Self::partitions_in(&self.dir)
    }

    pub fn records_stored(&self) -> usize {
        self.records_stored
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn partitions_in(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut partitions = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_partition = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |name| {
                    name.starts_with(PARTITION_FILE_PREFIX)
                        && name.ends_with(PARTITION_FILE_EXTENSION)
                });
            if is_partition {
                partitions.push(path);
            }
        }
        partitions.sort();
        Ok(partitions)
    }

    fn commit(&mut self, batch: &[u8], records: usize) -> Result<()> {
        let name = format!(
            "{}{:06}{}",
            PARTITION_FILE_PREFIX, self.next_partition, PARTITION_FILE_EXTENSION
        );
        let final_path = self.dir.join(&name);
        let temp_path = self.dir.join(format!("{}{}", name, PARTITION_TEMP_EXTENSION));

        let mut writer = BufWriter::new(File::create(&temp_path)?);
        writer.write_all(batch)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(&temp_path, &final_path)
            .with_context(|| format!("failed to commit {}", final_path.display()))?;

        self.next_partition += 1;
        self.records_stored += records;
        debug!("committed {} records to {}", records, final_path.display());
        Ok(())
    }
}

impl BulkLoader for DirectoryStore {
    fn store(&mut self, reader: &mut dyn BufRead, batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            bail!("batch size must be at least 1");
        }

        let mut batch = Vec::new();
        let mut batch_records = 0;
        let mut line = Vec::new();

        loop {
            line.clear();
            if reader.read_until(RECORD_TERMINATOR, &mut line)? == 0 {
                break;
            }

            if !line.contains(&FIELD_SEPARATOR) {
                bail!(
                    "malformed record without columns: {:?}",
                    String::from_utf8_lossy(&line)
                );
            }
            if line.last() != Some(&RECORD_TERMINATOR) {
                line.push(RECORD_TERMINATOR);
            }

            batch.extend_from_slice(&line);
            batch_records += 1;

            if batch_records == batch_size {
                self.commit(&batch, batch_records)?;
                batch.clear();
                batch_records = 0;
            }
        }

        if batch_records > 0 {
            self.commit(&batch, batch_records)?;
        }

        Ok(())
    }
}
