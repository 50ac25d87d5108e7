use std::cmp::Ordering;
use std::io::{self, BufRead, Read};
use tracing::{debug, warn};

use crate::combine::constants::{MERGE_QUEUE_SOFT_LIMIT, RECORD_TERMINATOR};
use crate::combine::error::{CombineError, Result};
use crate::combine::record::{trim_terminator, ComparisonMode};
use crate::combine::unquote::unquote_prefix;

/// One line read from a shard, waiting for its turn in the merge.
#[derive(Debug)]
struct PendingLine {
    raw: Vec<u8>,
    // None when the raw line (minus terminator) is the comparison view.
    decoded_key: Option<Vec<u8>>,
    source_index: usize,
}

impl PendingLine {
    fn key(&self) -> &[u8] {
        match &self.decoded_key {
            Some(key) => key,
            None => trim_terminator(&self.raw),
        }
    }

    /// Equal keys from different shards come out in shard order.
    fn merge_order(&self, other: &Self) -> Ordering {
        self.key()
            .cmp(other.key())
            .then(self.source_index.cmp(&other.source_index))
    }
}

/// A shard's reader plus the settings needed to turn its lines into
/// [`PendingLine`]s.
struct LineSource<R> {
    reader: R,
    index: usize,
    mode: ComparisonMode,
}

impl<R: BufRead> LineSource<R> {
    fn new(reader: R, index: usize, mode: ComparisonMode) -> Self {
        Self { reader, index, mode }
    }

    fn next_line(&mut self) -> Result<Option<PendingLine>> {
        let mut raw = Vec::new();
        if self.reader.read_until(RECORD_TERMINATOR, &mut raw)? == 0 {
            return Ok(None);
        }

        if raw.last() != Some(&RECORD_TERMINATOR) {
            raw.push(RECORD_TERMINATOR);
        }

        let decoded_key = match self.mode {
            ComparisonMode::Raw => None,
            ComparisonMode::Unquoted => Some(self.decode_key(&raw)?),
        };

        Ok(Some(PendingLine {
            raw,
            decoded_key,
            source_index: self.index,
        }))
    }

    fn decode_key(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let line = trim_terminator(raw);
        let (mut key, consumed) =
            unquote_prefix(line).map_err(|error| CombineError::Unquote {
                source_index: self.index,
                error,
            })?;
        key.extend_from_slice(&line[consumed..]);
        Ok(key)
    }
}

/// Holds at most one pending line per shard, sorted so the next line to
/// emit is always last.
///
/// A sorted array with binary-search insertion rather than a binary heap:
/// it never holds more entries than there are shards, so the O(N) shift on
/// insert stays cheap while comparisons stay at O(log N).
#[derive(Debug, Default)]
struct MergeHeap {
    lines: Vec<PendingLine>,
}

impl MergeHeap {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, line: PendingLine) {
        let position = self
            .lines
            .partition_point(|held| held.merge_order(&line) == Ordering::Greater);
        self.lines.insert(position, line);
    }

    fn pop(&mut self) -> Option<PendingLine> {
        self.lines.pop()
    }

    fn len(&self) -> usize {
        self.lines.len()
    }
}

/// Lazily k-way merges pre-sorted shard readers into one sorted byte stream.
///
/// The caller owns the readers; each must already be sorted under `mode`.
pub struct MergeStream<R> {
    sources: Vec<LineSource<R>>,
    heap: MergeHeap,
    residual: Vec<u8>,
    residual_pos: usize,
    lines_emitted: usize,
}

impl<R: BufRead> MergeStream<R> {
    pub fn new(readers: Vec<R>, mode: ComparisonMode) -> Result<Self> {
        if readers.len() > MERGE_QUEUE_SOFT_LIMIT {
            warn!(
                "merging {} shards; the merge queue is tuned for at most {}",
                readers.len(),
                MERGE_QUEUE_SOFT_LIMIT
            );
        }

        let sources: Vec<_> = readers
            .into_iter()
            .enumerate()
            .map(|(index, reader)| LineSource::new(reader, index, mode))
            .collect();

        let mut stream = Self {
            heap: MergeHeap::with_capacity(sources.len()),
            sources,
            residual: Vec::new(),
            residual_pos: 0,
            lines_emitted: 0,
        };
        stream.prime()?;

        Ok(stream)
    }

    fn prime(&mut self) -> Result<()> {
        for source in &mut self.sources {
            if let Some(line) = source.next_line()? {
                self.heap.push(line);
            }
        }

        debug!(
            "primed merge with {} of {} shards non-empty",
            self.heap.len(),
            self.sources.len()
        );
        Ok(())
    }

    /// Returns the next line in merged order, terminator included, refilling
    /// from the shard it came from.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(line) = self.heap.pop() else {
            return Ok(None);
        };

        if let Some(replacement) = self.sources[line.source_index].next_line()? {
            self.heap.push(replacement);
        }

        self.lines_emitted += 1;
        Ok(Some(line.raw))
    }

    pub fn shard_count(&self) -> usize {
        self.sources.len()
    }

    pub fn lines_emitted(&self) -> usize {
        self.lines_emitted
    }

    fn drain_residual(&mut self, buf: &mut [u8]) -> usize {
        let remaining = &self.residual[self.residual_pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.residual_pos += n;

        if self.residual_pos == self.residual.len() {
            self.residual.clear();
            self.residual_pos = 0;
        }
        n
    }
}

impl<R: BufRead> Read for MergeStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.residual_pos < self.residual.len() {
            return Ok(self.drain_residual(buf));
        }

        let line = match self.next_line().map_err(CombineError::into_io)? {
            Some(line) => line,
            None => return Ok(0),
        };

        let n = line.len().min(buf.len());
        buf[..n].copy_from_slice(&line[..n]);
        if n < line.len() {
            self.residual = line;
            self.residual_pos = n;
        }

        Ok(n)
    }
}
