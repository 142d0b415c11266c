use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a parse before any record is produced.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("missing <{tag}> in the node tree")]
    RootNotFound { tag: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("record already stored: {action} / {item} at {date:?}")]
    Duplicate {
        action: String,
        date: String,
        item: String,
    },
    #[error("no such period: year {year}, month {month:?}")]
    InvalidPeriod { year: i32, month: Option<u32> },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("timestamp is not an integer: {0:?}")]
    BadTimestamp(String),
}

/// Consumer-side checks on an extracted record. The classifier never raises these.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty title")]
    EmptyTitle,
    #[error("empty action")]
    EmptyAction,
    #[error("empty item")]
    EmptyItem,
    #[error("empty date")]
    EmptyDate,
    #[error("item is {len} chars, limit is {max}")]
    ItemTooLong { len: usize, max: usize },
}
