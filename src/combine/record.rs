use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::combine::combiner::{Combine, SumPair, SumWithExtremes};
use crate::combine::constants::*;
use crate::combine::error::{CombineError, Result};

/// How shard lines are ordered relative to each other.
///
/// Must match the ordering the walkers sorted their shards under, otherwise
/// the merged order is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonMode {
    /// Compare lines byte for byte, quotes and escapes included.
    Raw,
    /// Compare the decoded value of the leading quoted field, followed by the
    /// rest of the line.
    Unquoted,
}

/// The record shapes walkers produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryFormat {
    Group,
    UserGroup,
    DirGroupUserType,
    DirGroupUserTypeAge,
}

impl SummaryFormat {
    pub const ALL: [SummaryFormat; 4] = [
        SummaryFormat::Group,
        SummaryFormat::UserGroup,
        SummaryFormat::DirGroupUserType,
        SummaryFormat::DirGroupUserTypeAge,
    ];

    pub fn key_columns(self) -> usize {
        match self {
            SummaryFormat::Group => GROUP_KEY_COLUMNS,
            SummaryFormat::UserGroup => USER_GROUP_KEY_COLUMNS,
            SummaryFormat::DirGroupUserType => DIR_USAGE_KEY_COLUMNS,
            SummaryFormat::DirGroupUserTypeAge => DIR_USAGE_AGE_KEY_COLUMNS,
        }
    }

    pub fn summary_columns(self) -> usize {
        match self {
            SummaryFormat::Group | SummaryFormat::UserGroup => COUNT_SIZE_SUMMARY_COLUMNS,
            SummaryFormat::DirGroupUserType | SummaryFormat::DirGroupUserTypeAge => {
                DIR_USAGE_SUMMARY_COLUMNS
            }
        }
    }

    pub fn total_columns(self) -> usize {
        self.key_columns() + self.summary_columns()
    }

    /// Directory records lead with a quoted path; the others are plain names.
    pub fn default_comparison(self) -> ComparisonMode {
        match self {
            SummaryFormat::Group | SummaryFormat::UserGroup => ComparisonMode::Raw,
            SummaryFormat::DirGroupUserType | SummaryFormat::DirGroupUserTypeAge => {
                ComparisonMode::Unquoted
            }
        }
    }

    pub fn combiner(self) -> Box<dyn Combine + Send + Sync> {
        match self {
            SummaryFormat::Group | SummaryFormat::UserGroup => Box::new(SumPair),
            SummaryFormat::DirGroupUserType | SummaryFormat::DirGroupUserTypeAge => {
                Box::new(SumWithExtremes::new(
                    DIR_USAGE_OLDEST_ATIME_INDEX,
                    DIR_USAGE_NEWEST_MTIME_INDEX,
                ))
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SummaryFormat::Group => "group",
            SummaryFormat::UserGroup => "user-group",
            SummaryFormat::DirGroupUserType => "dir-group-user-type",
            SummaryFormat::DirGroupUserTypeAge => "dir-group-user-type-age",
        }
    }
}

impl fmt::Display for SummaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SummaryFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SummaryFormat::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| format!("unknown summary format: {}", s))
    }
}

/// Strips one trailing record terminator, if present.
pub fn trim_terminator(line: &[u8]) -> &[u8] {
    line.strip_suffix(&[RECORD_TERMINATOR]).unwrap_or(line)
}

/// Splits a record into at most `max_fields` tab-separated columns; the last
/// column keeps any further tabs.
pub fn split_fields(line: &[u8], max_fields: usize) -> Vec<Vec<u8>> {
    trim_terminator(line)
        .splitn(max_fields.max(1), |&b| b == FIELD_SEPARATOR)
        .map(<[u8]>::to_vec)
        .collect()
}

/// Writes `fields` tab-joined and newline-terminated into `out`.
pub fn join_fields(fields: &[Vec<u8>], out: &mut Vec<u8>) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(FIELD_SEPARATOR);
        }
        out.extend_from_slice(field);
    }
    out.push(RECORD_TERMINATOR);
}

/// Parses a decimal summary column.
pub fn parse_int(column: usize, field: &[u8]) -> Result<i64> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| CombineError::MalformedNumber {
            column,
            value: String::from_utf8_lossy(field).into_owned(),
        })
}

pub fn format_int(value: i64) -> Vec<u8> {
    value.to_string().into_bytes()
}
