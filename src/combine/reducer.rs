use std::io::{BufRead, Write};

use crate::combine::combiner::Combine;
use crate::combine::constants::RECORD_TERMINATOR;
use crate::combine::error::{CombineError, Result};
use crate::combine::record::{join_fields, split_fields, trim_terminator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReduceStats {
    pub lines_read: usize,
    pub records_written: usize,
}

/// Collapses runs of consecutive records sharing their first `key_columns`
/// columns into one record, folding the summary columns with `combiner`.
///
/// `input` must already be sorted so equal keys are adjacent. Only the
/// previous record is held in memory; each finished record is handed to
/// `output` with a single `write_all`.
pub fn reduce<R, W, C>(
    mut input: R,
    key_columns: usize,
    summary_columns: usize,
    combiner: &C,
    output: &mut W,
) -> Result<ReduceStats>
where
    R: BufRead,
    W: Write + ?Sized,
    C: Combine + ?Sized,
{
    let total_columns = key_columns + summary_columns;
    let mut stats = ReduceStats::default();
    let mut previous: Vec<Vec<u8>> = Vec::new();
    let mut line = Vec::new();
    let mut record = Vec::new();

    loop {
        line.clear();
        if input
            .read_until(RECORD_TERMINATOR, &mut line)
            .map_err(CombineError::from_io)?
            == 0
        {
            break;
        }

        if trim_terminator(&line).is_empty() {
            continue;
        }
        stats.lines_read += 1;

        let current = split_fields(&line, total_columns);
        if current.len() != total_columns {
            return Err(CombineError::MalformedRecord {
                expected: total_columns,
                found: current.len(),
                line: String::from_utf8_lossy(trim_terminator(&line)).into_owned(),
            });
        }

        if !previous.is_empty() && previous[..key_columns] == current[..key_columns] {
            combiner.combine(summary_columns, &mut previous, &current)?;
            continue;
        }

        flush(&previous, &mut record, output, &mut stats)?;
        previous = current;
    }

    flush(&previous, &mut record, output, &mut stats)?;
    Ok(stats)
}

fn flush<W: Write + ?Sized>(
    fields: &[Vec<u8>],
    record: &mut Vec<u8>,
    output: &mut W,
    stats: &mut ReduceStats,
) -> Result<()> {
    // Nothing to emit before the first record or for an empty input.
    if fields.first().map_or(true, |first| first.is_empty()) {
        return Ok(());
    }

    record.clear();
    join_fields(fields, record);
    output.write_all(record).map_err(CombineError::from_io)?;
    stats.records_written += 1;
    Ok(())
}
