//! Reconcile pipeline entrypoint shared by `hubsync reconcile` and `hubsync run`.

use std::path::Path;

use chrono::{DateTime, Utc};
use hubsync_core::{snapshot, ChangeLedger, Fork, Settings};
use hubsync_detector::{ActivityFilter, ForkSource};

use crate::git::VcsWorkspace;
use crate::reconciler::{BranchReconciler, ReconcileSummary};
use crate::SyncError;

/// Which shortlisted forks to reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkScope {
    /// Only forks the activity filter classifies as active.
    Active,
    /// Every shortlisted fork except the upstream.
    All,
}

/// Shortlisted forks from `<data_dir>/<recent_forks_file>`; empty when absent.
pub fn load_shortlist(repo: &Path, settings: &Settings) -> Result<Vec<Fork>, SyncError> {
    let path = settings.recent_forks_path(repo);
    match snapshot::load_recent_forks(&path)? {
        Some(recent) => Ok(recent.recent_forks),
        None => {
            tracing::warn!(path = %path.display(), "no shortlist found, nothing to reconcile");
            Ok(vec![])
        }
    }
}

/// Narrow `forks` to the ones to reconcile.
pub fn select_forks(
    forks: &[Fork],
    settings: &Settings,
    source: &dyn ForkSource,
    scope: ForkScope,
    now: DateTime<Utc>,
) -> Vec<Fork> {
    let filter = ActivityFilter::new(
        source,
        settings.freshness_window(),
        settings.github.repository.as_str(),
        settings.sync.recent_commit_count,
    );
    match scope {
        ForkScope::Active => filter.filter(forks, now),
        ForkScope::All => forks
            .iter()
            .filter(|f| !filter.is_upstream(f))
            .cloned()
            .collect(),
    }
}

/// Load the shortlist, select forks, reconcile them and append the ledger.
pub fn run<W: VcsWorkspace + ?Sized>(
    repo: &Path,
    settings: &Settings,
    source: &dyn ForkSource,
    workspace: &W,
    scope: ForkScope,
    now: DateTime<Utc>,
) -> Result<ReconcileSummary, SyncError> {
    let shortlist = load_shortlist(repo, settings)?;
    let forks = select_forks(&shortlist, settings, source, scope, now);
    tracing::info!(shortlisted = shortlist.len(), selected = forks.len(), "forks selected");
    if forks.is_empty() {
        return Ok(ReconcileSummary::default());
    }

    let ledger = ChangeLedger::new(settings.ledger_path(repo));
    let reconciler = BranchReconciler::new(
        workspace,
        &ledger,
        settings.git.remote_prefix.as_str(),
        settings.sync.skip_branches.iter().cloned(),
    );
    Ok(reconciler.reconcile_all(&forks, now))
}
