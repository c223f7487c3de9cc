//! Error types for hubsync-sync.

use std::time::Duration;

use thiserror::Error;

use hubsync_core::CoreError;

/// Failures of a single version-control operation.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The `git` binary could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Wall-clock budget exceeded; the child was killed.
    #[error("`{command}` timed out after {}s", after.as_secs())]
    Timeout { command: String, after: Duration },

    #[error("`{command}` exited with {status:?}: {stderr}")]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// The merge could not be completed and was aborted.
    #[error("merge of {source_ref} into {branch} conflicted and was aborted")]
    Conflict { branch: String, source_ref: String },

    #[error("unexpected output from `{command}`: {output}")]
    Parse { command: String, output: String },
}

/// Errors surfaced by reconciliation and the reconcile pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Core(#[from] CoreError),
}
