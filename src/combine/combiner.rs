use crate::combine::error::{CombineError, Result};
use crate::combine::record::{format_int, parse_int};

/// Folds the summary columns of `current` into `previous`.
///
/// Both slices hold a whole record (key columns first); the last
/// `summary_columns` entries are the summary.
pub trait Combine {
    fn combine(
        &self,
        summary_columns: usize,
        previous: &mut [Vec<u8>],
        current: &[Vec<u8>],
    ) -> Result<()>;
}

impl<F> Combine for F
where
    F: Fn(usize, &mut [Vec<u8>], &[Vec<u8>]) -> Result<()>,
{
    fn combine(
        &self,
        summary_columns: usize,
        previous: &mut [Vec<u8>],
        current: &[Vec<u8>],
    ) -> Result<()> {
        self(summary_columns, previous, current)
    }
}

/// Sums the trailing count and size columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumPair;

impl Combine for SumPair {
    fn combine(
        &self,
        summary_columns: usize,
        previous: &mut [Vec<u8>],
        current: &[Vec<u8>],
    ) -> Result<()> {
        check_widths(summary_columns.max(2), previous, current)?;

        let total = previous.len();
        sum_column(previous, current, total - 2)?;
        sum_column(previous, current, total - 1)
    }
}

/// Sums every summary column except two timestamps, keeping the smallest of
/// one (oldest access) and the largest of the other (newest modification).
#[derive(Debug, Clone, Copy)]
pub struct SumWithExtremes {
    oldest: usize,
    newest: usize,
}

impl SumWithExtremes {
    /// Indexes are relative to the first summary column.
    pub fn new(oldest: usize, newest: usize) -> Self {
        Self { oldest, newest }
    }
}

impl Combine for SumWithExtremes {
    fn combine(
        &self,
        summary_columns: usize,
        previous: &mut [Vec<u8>],
        current: &[Vec<u8>],
    ) -> Result<()> {
        check_widths(summary_columns, previous, current)?;

        let start = previous.len() - summary_columns;
        for offset in 0..summary_columns {
            let column = start + offset;
            if offset == self.oldest {
                keep_extreme(previous, current, column, i64::min)?;
            } else if offset == self.newest {
                keep_extreme(previous, current, column, i64::max)?;
            } else {
                sum_column(previous, current, column)?;
            }
        }

        Ok(())
    }
}

fn check_widths(summary_columns: usize, previous: &[Vec<u8>], current: &[Vec<u8>]) -> Result<()> {
    if previous.len() < summary_columns || current.len() != previous.len() {
        return Err(CombineError::MalformedRecord {
            expected: previous.len().max(summary_columns),
            found: current.len(),
            line: String::from_utf8_lossy(&current.join(&b'\t')).into_owned(),
        });
    }
    Ok(())
}

fn sum_column(previous: &mut [Vec<u8>], current: &[Vec<u8>], column: usize) -> Result<()> {
    let left = parse_int(column, &previous[column])?;
    let right = parse_int(column, &current[column])?;
    let sum = left
        .checked_add(right)
        .ok_or(CombineError::SumOverflow { column, left, right })?;
    previous[column] = format_int(sum);
    Ok(())
}

fn keep_extreme(
    previous: &mut [Vec<u8>],
    current: &[Vec<u8>],
    column: usize,
    pick: fn(i64, i64) -> i64,
) -> Result<()> {
    let kept = pick(
        parse_int(column, &previous[column])?,
        parse_int(column, &current[column])?,
    );
    previous[column] = format_int(kept);
    Ok(())
}
