use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures decoding a C-style quoted field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnquoteError {
    #[error("quoted field does not start with a double quote")]
    MissingOpeningQuote,

    #[error("quoted field is not terminated")]
    Unterminated,

    #[error("unrecognised escape sequence \\{0}")]
    UnknownEscape(char),

    #[error("malformed octal escape")]
    MalformedOctal,

    #[error("malformed hex escape")]
    MalformedHex,
}

#[derive(Error, Debug)]
pub enum CombineError {
    #[error("failed to unquote line from shard {source_index}: {error}")]
    Unquote {
        source_index: usize,
        #[source]
        error: UnquoteError,
    },

    #[error("failed to open shard {}", path.display())]
    OpenShard {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("summary column {column} is not an integer: {value:?}")]
    MalformedNumber { column: usize, value: String },

    #[error("summary column {column} overflows when adding {left} and {right}")]
    SumOverflow { column: usize, left: i64, right: i64 },

    #[error("record has {found} columns, expected {expected}: {line:?}")]
    MalformedRecord {
        expected: usize,
        found: usize,
        line: String,
    },

    #[error("bulk load failed: {0:#}")]
    Sink(anyhow::Error),

    #[error("no shard files ending in {suffix:?} found in {}", dir.display())]
    NoShards { dir: PathBuf, suffix: String },
}

impl CombineError {
    /// Wraps the error for transport through `std::io` reader/writer
    /// interfaces; [`CombineError::from_io`] recovers it on the other side.
    pub fn into_io(self) -> io::Error {
        match self {
            CombineError::Io(err) => err,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }

    pub fn from_io(err: io::Error) -> Self {
        if !err
            .get_ref()
            .is_some_and(|inner| inner.is::<CombineError>())
        {
            return CombineError::Io(err);
        }

        match err.into_inner().map(|inner| inner.downcast::<CombineError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => CombineError::Io(io::Error::new(io::ErrorKind::Other, other)),
            None => CombineError::Io(io::ErrorKind::Other.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CombineError>;
