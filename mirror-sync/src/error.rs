//! Error types for mirror-sync.

use std::path::PathBuf;

use thiserror::Error;

use mirror_core::{RecordError, RemoteError};
use mirror_detector::DetectError;

/// All errors that can arise from reconciliation and sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The dataset's source data is missing or unreadable.
    #[error("source data for '{name}' is not available")]
    SourceUnavailable { name: String },

    /// A remote hierarchy or audit log call failed.
    #[error("remote operation failed: {0}")]
    Remote(#[from] RemoteError),

    /// A record referenced by another record is missing or unreadable.
    #[error("record inconsistency: {0}")]
    RecordInconsistency(#[source] RecordError),

    /// A record could not be serialized for saving.
    #[error("record store failure: {0}")]
    Store(#[source] RecordError),

    /// The caller asked for something whose preconditions do not hold.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Packaging a payload archive failed.
    #[error("failed to package {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The change-detection table could not be read.
    #[error("change detection failed: {0}")]
    Detect(#[from] DetectError),
}

/// Missing or corrupt records are inconsistencies; disk failures stay I/O
/// errors and unusable names are precondition violations.
impl From<RecordError> for SyncError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound { .. } | RecordError::Parse { .. } => SyncError::RecordInconsistency(err),
            RecordError::Io { path, source } => SyncError::Io { path, source },
            RecordError::InvalidName { .. } => SyncError::PreconditionViolation(err.to_string()),
            RecordError::Json(_) => SyncError::Store(err),
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
