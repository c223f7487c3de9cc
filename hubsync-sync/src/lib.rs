//! # hubsync-sync
//!
//! Commit-identity driven reconciliation of fork package branches.
//!
//! Call [`pipeline::run`] to reconcile the shortlisted forks of a repository,
//! or drive a [`BranchReconciler`] directly over any [`VcsWorkspace`].

pub mod error;
pub mod freshness;
pub mod git;
pub mod pipeline;
pub mod reconciler;

pub use error::{SyncError, VcsError};
pub use freshness::{Freshness, SyncReason};
pub use git::{GitWorkspace, MergeOutcome, RemoteHead, VcsWorkspace};
pub use pipeline::ForkScope;
pub use reconciler::{remote_name, BranchReconciler, ReconcileReport, ReconcileSummary};
