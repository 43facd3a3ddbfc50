//! Error types for scanning and write-back

use std::path::PathBuf;
use thiserror::Error;

use markstore::StoreError;

/// Errors raised while discovering files or persisting scan state
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Workspace root not found: {path}")]
    RootNotFound { path: PathBuf },

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to persist metadata: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by a [`Documents`](crate::document::Documents) implementation
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to open {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Line {line} is out of range for {path} ({line_count} lines)")]
    LineOutOfRange {
        path: PathBuf,
        line: usize,
        line_count: usize,
    },

    #[error("Failed to save {path}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from a write-back operation, caught at the operation boundary
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("No detected item with id {0}")]
    UnknownItem(String),
}
