use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A static resource could not be read or did not match its schema.
/// Fatal to the view that needed it.
#[derive(Debug, Error)]
pub enum LoadFailure {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed JSON in {path}: {reason}")]
    Json { path: PathBuf, reason: String },

    #[error("invalid topology in {path}: {reason}")]
    Topology { path: PathBuf, reason: String },

    #[error("{path} has no column named {column:?}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path}, line {line}: {reason}")]
    InvalidRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("{path} contains no usable records")]
    Empty { path: PathBuf },
}

impl LoadFailure {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Json {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn topology(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Topology {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A remote indicator or country-detail request failed.
/// Recoverable: the previous view stays on screen.
#[derive(Debug, Error)]
pub enum QueryFailure {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered with status {0}")]
    Status(u16),

    #[error("data provider rejected the query: {0}")]
    Api(String),

    #[error("unexpected response shape: {0}")]
    Malformed(String),

    #[error("no record for {0}")]
    NotFound(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),
}
