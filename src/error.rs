//! Typed errors for the row sources and the destination store.
//!
//! Orchestration code wraps these in `anyhow` with context; the worker pool
//! matches on [`StoreError`] only to log it.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("opening input file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reading row {row}: {message}")]
    Read { row: usize, message: String },

    #[error("opening workbook {path:?}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("sheet '{sheet}' not found in {path:?}")]
    MissingSheet { path: PathBuf, sheet: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store connection lock poisoned")]
    LockPoisoned,
}
