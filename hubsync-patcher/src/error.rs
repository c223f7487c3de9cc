//! Error types for hubsync-patcher.

use std::path::PathBuf;

use thiserror::Error;

use hubsync_core::CoreError;

/// Per-file patching failures. The file is left untouched.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file declares no package, so there is nothing to look up.
    #[error("{path}: no package declarations")]
    NoPackages { path: PathBuf },

    #[error("{path}: malformed manifest: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Failures of one metadata lookup.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("package {package} not found")]
    NotFound { package: String },

    /// Network failure, 429 or 5xx. Retried with backoff.
    #[error("transient failure for package {package}: {message}")]
    Transient { package: String, message: String },

    #[error("lookup of package {package} failed: {message}")]
    Other { package: String, message: String },
}

impl MetadataError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Convenience constructor for [`PatchError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PatchError {
    PatchError::Io {
        path: path.into(),
        source,
    }
}
