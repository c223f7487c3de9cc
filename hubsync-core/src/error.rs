//! Error types for hubsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from settings, snapshot and ledger operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file exists but is not valid YAML for [`crate::Settings`].
    #[error("failed to parse settings at {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A persisted JSON record could not be decoded.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error (write path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A string that should hold a hexadecimal object id does not.
    #[error("invalid commit id '{value}'")]
    InvalidCommitId { value: String },

    /// A package identifier must consist only of ASCII digits.
    #[error("invalid package id '{value}'")]
    InvalidPackageId { value: String },
}

/// Convenience constructor for [`CoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
