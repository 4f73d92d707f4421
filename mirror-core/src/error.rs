//! Error types for mirror-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from record store operations.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Underlying I/O failure, with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (save path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON parse error on load, with the offending file.
    #[error("failed to parse record at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No record file exists for the requested name.
    #[error("no {kind} record named '{name}' (expected at {path})")]
    NotFound {
        kind: &'static str,
        name: String,
        path: PathBuf,
    },

    /// The name cannot be used as a record key or folder name.
    #[error("invalid {kind} name '{name}': must be non-empty, not '.' or '..', and contain no path separators")]
    InvalidName { kind: &'static str, name: String },
}

/// Failures reported by a remote hierarchy client or audit log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The service answered with a non-success status.
    #[error("remote call failed with status {code}: {message}")]
    Status { code: u16, message: String },

    /// The request never produced a response.
    #[error("remote transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("unexpected remote response: {0}")]
    Decode(String),

    /// The referenced node does not exist.
    #[error("remote node {id} not found")]
    NotFound { id: String },

    /// Local file to upload could not be read.
    #[error("cannot read upload source {path}: {message}")]
    Upload { path: PathBuf, message: String },
}

/// Errors loading or saving `config.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RecordError {
    RecordError::Io {
        path: path.into(),
        source,
    }
}
