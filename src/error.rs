//! Error types for index construction, persistence and querying.

use thiserror::Error;

use crate::mdd::MddError;

/// Errors surfaced by the index, ordering, encoder and graph layers.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed bounds or ordering at construction time.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The index file does not match its own header or is truncated.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// A diagram operation failed mid-mutation; the index must be discarded.
    #[error("index corrupted during {operation}: {source}")]
    IndexCorruption {
        operation: &'static str,
        #[source]
        source: MddError,
    },

    /// Reordering was abandoned; the diagram keeps its previous ordering.
    #[error("reordering to {order:?} failed: {source}")]
    ReorderFailure {
        order: Vec<usize>,
        #[source]
        source: MddError,
    },

    /// A trial diagram of the ordering search could not be built.
    #[error("ordering search failed: {0}")]
    Search(#[source] MddError),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }

    /// Reinterprets a parse error found while reading an index file.
    pub(crate) fn into_corrupt_index(self) -> Self {
        match self {
            Error::Parse { line, message } => Error::CorruptIndex(format!("line {}: {}", line, message)),
            other => other,
        }
    }
}
