use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use crossbeam_channel::bounded;
use tracing::{debug, info, warn};

use crate::combine::config::CombineConfig;
use crate::combine::constants::SINK_THREAD_NAME;
use crate::combine::error::{CombineError, Result};
use crate::combine::merger::MergeStream;
use crate::combine::pipe::pipe;
use crate::combine::record::SummaryFormat;
use crate::combine::reducer::{reduce, ReduceStats};
use crate::combine::store::{BulkLoader, DirectoryStore};
use crate::combine::CombineStats;

/// Merges one format's shard files and reduces them into a single
/// key-unique stream.
pub struct CombineProcessor {
    config: CombineConfig,
    format: SummaryFormat,
}

impl CombineProcessor {
    pub fn new(format: SummaryFormat, config: CombineConfig) -> Self {
        Self { config, format }
    }

    pub fn format(&self) -> SummaryFormat {
        self.format
    }

    /// Bulk loads the combined stream into the directory store at `db_dir`.
    pub fn combine_to_db(&self, shard_paths: &[PathBuf], db_dir: &Path) -> Result<CombineStats> {
        let mut store = DirectoryStore::open(db_dir).map_err(CombineError::Sink)?;
        self.combine_into(shard_paths, &mut store)
    }

    /// Streams the combined records into `loader`, which runs on its own
    /// thread while the merge and reduce run on this one.
    ///
    /// The two sides are joined by a synchronous pipe. If the loader fails it
    /// drops its end, so the reducer's next write fails rather than blocking.
    /// If the reducer fails, the loader's next read reports that failure.
    pub fn combine_into<L>(&self, shard_paths: &[PathBuf], loader: &mut L) -> Result<CombineStats>
    where
        L: BulkLoader + ?Sized,
    {
        let start = Instant::now();
        let mut merged = self.open_merge(shard_paths)?;
        let combiner = self.format.combiner();
        let batch_size = self.config.batch_size;

        info!(
            "combining {} {} shards into bulk loader (batch size {})",
            shard_paths.len(),
            self.format,
            batch_size
        );

        let (mut reader, mut writer) = pipe();
        let (done_tx, done_rx) = bounded::<anyhow::Result<()>>(1);

        let (reduced, loaded) = thread::scope(|scope| -> Result<_> {
            let sink = thread::Builder::new()
                .name(SINK_THREAD_NAME.to_string())
                .spawn_scoped(scope, move || {
                    let result = loader.store(&mut reader, batch_size);
                    reader.close();
                    let _ = done_tx.send(result);
                })?;

            let input = BufReader::with_capacity(self.config.io_buffer_size_bytes(), &mut merged);
            let reduced = reduce(
                input,
                self.format.key_columns(),
                self.format.summary_columns(),
                &*combiner,
                &mut writer,
            );

            match &reduced {
                Ok(_) => writer.close(),
                Err(err) => {
                    writer.close_with_error(&io::Error::new(io::ErrorKind::Other, err.to_string()))
                }
            }

            let loaded = done_rx.recv().unwrap_or_else(|_| {
                Err(anyhow::anyhow!("{} thread exited without reporting", SINK_THREAD_NAME))
            });

            if sink.join().is_err() {
                warn!("{} thread panicked", SINK_THREAD_NAME);
            }

            Ok((reduced, loaded))
        })?;

        let stats = match (reduced, loaded) {
            // The loader only saw our own failure relayed through the pipe.
            (Err(err), _) if !is_broken_pipe(&err) => return Err(err),
            (_, Err(err)) => {
                warn!("bulk load of {} records failed: {:#}", self.format, err);
                return Err(CombineError::Sink(err));
            }
            (Err(err), Ok(())) => return Err(err),
            (Ok(stats), Ok(())) => stats,
        };

        Ok(self.finish(&merged, stats, start))
    }

    /// Writes the combined stream to a flat file instead of a database.
    pub fn merge_to_file(&self, shard_paths: &[PathBuf], output: &Path) -> Result<CombineStats> {
        let start = Instant::now();
        let mut merged = self.open_merge(shard_paths)?;
        let combiner = self.format.combiner();

        info!(
            "combining {} {} shards into {}",
            shard_paths.len(),
            self.format,
            output.display()
        );

        let file = File::create(output)?;
        let mut writer = BufWriter::with_capacity(self.config.io_buffer_size_bytes(), file);
        let input = BufReader::with_capacity(self.config.io_buffer_size_bytes(), &mut merged);

        let stats = reduce(
            input,
            self.format.key_columns(),
            self.format.summary_columns(),
            &*combiner,
            &mut writer,
        )?;
        writer.flush()?;

        Ok(self.finish(&merged, stats, start))
    }

    fn open_merge(&self, shard_paths: &[PathBuf]) -> Result<MergeStream<BufReader<File>>> {
        let readers = shard_paths
            .iter()
            .map(|path| {
                let file = File::open(path).map_err(|source| CombineError::OpenShard {
                    path: path.clone(),
                    source,
                })?;
                debug!("opened shard {}", path.display());
                Ok(BufReader::with_capacity(self.config.io_buffer_size_bytes(), file))
            })
            .collect::<Result<Vec<_>>>()?;

        MergeStream::new(readers, self.config.comparison_for(self.format))
    }

    fn finish(
        &self,
        merged: &MergeStream<BufReader<File>>,
        reduced: ReduceStats,
        start: Instant,
    ) -> CombineStats {
        let stats = CombineStats {
            shards_merged: merged.shard_count(),
            lines_read: reduced.lines_read,
            records_written: reduced.records_written,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "combined {} {} lines into {} records in {}ms",
            stats.lines_read, self.format, stats.records_written, stats.elapsed_ms
        );
        stats
    }
}

fn is_broken_pipe(err: &CombineError) -> bool {
    matches!(err, CombineError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe)
}
