//! Branch-level reconciliation of a fork into the local repository.
//!
//! ## Per-fork protocol
//!
//! 1. Add a temporary remote (removed by [`RemoteGuard`] on every exit path).
//! 2. List remote heads; keep all-digit names outside the skip list.
//! 3. Classify each branch with [`freshness`](crate::freshness). A remote head
//!    already reachable from the local branch is up to date.
//! 4. Shallow-fetch only branches that need a sync.
//! 5. Merge into an existing local branch, or create it from the fetched ref.
//! 6. Append synchronized branches to the ledger.
//!
//! Branch failures are recorded and skipped. Fork failures (remote add, head
//! listing) end that fork only. [`BranchReconciler::reconcile_all`] returns the
//! checkout to the default branch however it exits.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use hubsync_core::{BranchRef, ChangeLedger, CommitId, Fork, ForkName, LocalBranchState, PackageId};
use serde::Serialize;

use crate::error::{SyncError, VcsError};
use crate::freshness::{self, Freshness, SyncReason};
use crate::git::{remote_ref, MergeOutcome, VcsWorkspace};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What happened to one fork.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub fork: String,
    pub synced: Vec<String>,
    pub up_to_date: Vec<String>,
    /// `(branch, reason)`
    pub failed: Vec<(String, String)>,
}

/// Aggregate over all forks of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub reports: Vec<ReconcileReport>,
    /// `(fork, reason)` for forks that could not be processed at all.
    pub skipped_forks: Vec<(String, String)>,
}

impl ReconcileSummary {
    /// Every synchronized branch name across forks.
    pub fn synced_branches(&self) -> BTreeSet<String> {
        self.reports
            .iter()
            .flat_map(|r| r.synced.iter().cloned())
            .collect()
    }

    pub fn failed_branch_count(&self) -> usize {
        self.reports.iter().map(|r| r.failed.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Removes the temporary remote when dropped.
struct RemoteGuard<'a, W: VcsWorkspace + ?Sized> {
    workspace: &'a W,
    name: String,
}

impl<W: VcsWorkspace + ?Sized> Drop for RemoteGuard<'_, W> {
    fn drop(&mut self) {
        if let Err(e) = self.workspace.remove_remote(&self.name) {
            tracing::warn!(remote = %self.name, error = %e, "failed to remove temporary remote");
        }
    }
}

/// Switches back to the default branch when dropped.
struct RestoreGuard<'a, W: VcsWorkspace + ?Sized> {
    workspace: &'a W,
}

impl<W: VcsWorkspace + ?Sized> Drop for RestoreGuard<'_, W> {
    fn drop(&mut self) {
        if let Err(e) = self.workspace.switch_to_default() {
            tracing::error!(
                branch = self.workspace.default_branch(),
                error = %e,
                "failed to restore default branch"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// `<prefix><full name with '/' and '-' replaced by '_'>`
pub fn remote_name(prefix: &str, fork: &ForkName) -> String {
    format!("{prefix}{}", fork.0.replace(['/', '-'], "_"))
}

pub struct BranchReconciler<'a, W: VcsWorkspace + ?Sized> {
    workspace: &'a W,
    ledger: &'a ChangeLedger,
    remote_prefix: String,
    skip_branches: BTreeSet<String>,
}

impl<'a, W: VcsWorkspace + ?Sized> BranchReconciler<'a, W> {
    pub fn new(
        workspace: &'a W,
        ledger: &'a ChangeLedger,
        remote_prefix: impl Into<String>,
        skip_branches: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            workspace,
            ledger,
            remote_prefix: remote_prefix.into(),
            skip_branches: skip_branches.into_iter().collect(),
        }
    }

    /// Reconcile every fork in order, then return to the default branch.
    pub fn reconcile_all(&self, forks: &[Fork], now: DateTime<Utc>) -> ReconcileSummary {
        let _restore = RestoreGuard {
            workspace: self.workspace,
        };
        let mut summary = ReconcileSummary::default();
        for fork in forks {
            match self.reconcile(fork, now) {
                Ok(report) => summary.reports.push(report),
                Err(e) => {
                    tracing::error!(fork = %fork.full_name, error = %e, "fork skipped");
                    summary
                        .skipped_forks
                        .push((fork.full_name.0.clone(), e.to_string()));
                }
            }
        }
        tracing::info!(
            forks = summary.reports.len(),
            skipped = summary.skipped_forks.len(),
            synced = summary.synced_branches().len(),
            "reconciliation finished"
        );
        summary
    }

    /// Reconcile one fork. `Err` only for fork-level failures.
    pub fn reconcile(&self, fork: &Fork, now: DateTime<Utc>) -> Result<ReconcileReport, SyncError> {
        let remote = remote_name(&self.remote_prefix, &fork.full_name);
        self.workspace.add_remote(&remote, &fork.clone_url)?;
        let _guard = RemoteGuard {
            workspace: self.workspace,
            name: remote.clone(),
        };

        let branches = self.enumerate(&remote)?;
        tracing::info!(fork = %fork.full_name, candidates = branches.len(), "branches enumerated");

        let mut report = ReconcileReport {
            fork: fork.full_name.0.clone(),
            ..ReconcileReport::default()
        };
        for branch in &branches {
            let name = branch.name.as_str();
            match self.reconcile_branch(&remote, branch) {
                Ok(true) => {
                    tracing::info!(fork = %fork.full_name, branch = name, "branch synchronized");
                    report.synced.push(name.to_string());
                }
                Ok(false) => {
                    tracing::debug!(fork = %fork.full_name, branch = name, "branch up to date");
                    report.up_to_date.push(name.to_string());
                }
                Err(e) => {
                    tracing::warn!(fork = %fork.full_name, branch = name, error = %e, "branch skipped");
                    report.failed.push((name.to_string(), e.to_string()));
                }
            }
        }

        if let Err(e) = self.ledger.append(&report.synced, now) {
            tracing::error!(path = %self.ledger.path().display(), error = %e, "ledger append failed");
        }
        Ok(report)
    }

    /// Candidate package branches in enumeration order.
    fn enumerate(&self, remote: &str) -> Result<Vec<BranchRef>, VcsError> {
        Ok(self
            .workspace
            .list_remote_heads(remote)?
            .into_iter()
            .filter(|h| !self.skip_branches.contains(&h.name))
            .filter_map(|h| {
                let name = PackageId::parse(&h.name).ok()?;
                Some(BranchRef {
                    name,
                    remote_commit_id: h.commit_id.as_deref().and_then(|id| CommitId::parse(id).ok()),
                    remote_commit_timestamp: h.commit_timestamp,
                })
            })
            .collect())
    }

    fn local_state(&self, branch: &PackageId) -> Result<Option<LocalBranchState>, VcsError> {
        let Some(commit_id) = self.workspace.local_head(branch.as_str())? else {
            return Ok(None);
        };
        let reference = format!("refs/heads/{branch}");
        Ok(Some(LocalBranchState {
            name: branch.clone(),
            commit_id,
            commit_timestamp: self.workspace.commit_timestamp(&reference)?,
        }))
    }

    /// `Ok(true)` when the branch was synchronized.
    fn reconcile_branch(&self, remote: &str, branch: &BranchRef) -> Result<bool, VcsError> {
        let name = branch.name.as_str();
        let head_ref = format!("refs/heads/{name}");
        let local = self.local_state(&branch.name)?;
        let tracking = remote_ref(remote, name);
        let mut fetched = false;

        let freshness = match (&branch.remote_commit_id, &local) {
            (Some(id), _) => match freshness::by_commit_identity(local.as_ref(), id) {
                // A merge from a shallow fetch leaves a local merge commit on top of the remote head.
                Freshness::NeedsSync(SyncReason::Diverged)
                    if self.workspace.is_ancestor(id.as_str(), &head_ref)? =>
                {
                    Freshness::UpToDate
                }
                other => other,
            },
            (None, None) => Freshness::NeedsSync(SyncReason::Missing),
            (None, Some(_)) => match branch.remote_commit_timestamp {
                Some(remote_ts) => freshness::by_timestamp(local.as_ref(), Some(remote_ts)),
                None => {
                    self.workspace.fetch_branch_shallow(remote, name)?;
                    fetched = true;
                    if self.workspace.is_ancestor(&tracking, &head_ref)? {
                        Freshness::UpToDate
                    } else {
                        let remote_ts = self.workspace.commit_timestamp(&tracking)?;
                        freshness::by_timestamp(local.as_ref(), remote_ts)
                    }
                }
            },
        };
        let Freshness::NeedsSync(reason) = freshness else {
            return Ok(false);
        };
        tracing::debug!(
            branch = name,
            remote_head = ?branch.remote_commit_id.as_ref().map(CommitId::short),
            ?reason,
            "branch needs sync"
        );

        if !fetched {
            self.workspace.fetch_branch_shallow(remote, name)?;
        }
        if !self.workspace.branch_exists(name)? {
            self.workspace.create_tracking_branch(name, &tracking)?;
            return Ok(true);
        }
        self.workspace.checkout(name)?;
        let outcome = self.workspace.merge(name, &tracking)?;
        tracing::debug!(branch = name, ?outcome, "merge finished");
        Ok(outcome != MergeOutcome::AlreadyUpToDate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_name_replaces_separators() {
        let name = ForkName::from("some-user/Manifest-Hub");
        assert_eq!(remote_name("fork_", &name), "fork_some_user_Manifest_Hub");
    }

    #[test]
    fn summary_collects_synced_names() {
        let summary = ReconcileSummary {
            reports: vec![
                ReconcileReport {
                    fork: "a/x".into(),
                    synced: vec!["2".into(), "1".into()],
                    ..Default::default()
                },
                ReconcileReport {
                    fork: "b/x".into(),
                    synced: vec!["1".into()],
                    failed: vec![("9".into(), "timeout".into())],
                    ..Default::default()
                },
            ],
            skipped_forks: vec![],
        };
        assert_eq!(
            summary.synced_branches().into_iter().collect::<Vec<_>>(),
            vec!["1", "2"]
        );
        assert_eq!(summary.failed_branch_count(), 1);
    }
}
