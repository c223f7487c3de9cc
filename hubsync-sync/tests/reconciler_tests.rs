//! Reconciler behaviour against an in-memory workspace that records every
//! operation.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use hubsync_core::{ChangeLedger, Fork, ForkName};
use hubsync_sync::{BranchReconciler, MergeOutcome, RemoteHead, VcsError, VcsWorkspace};
use tempfile::TempDir;

const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

#[derive(Default)]
struct FakeWorkspace {
    heads: Vec<RemoteHead>,
    local: RefCell<HashMap<String, String>>,
    timestamps: HashMap<String, DateTime<Utc>>,
    fail_listing: bool,
    conflicts: HashSet<String>,
    /// Branches whose local head already contains the remote head.
    merged: HashSet<String>,
    /// Branches where a merge finds nothing to do.
    noop_merges: HashSet<String>,
    ops: RefCell<Vec<String>>,
}

impl FakeWorkspace {
    fn record(&self, op: String) {
        self.ops.borrow_mut().push(op);
    }

    fn ops(&self) -> Vec<String> {
        self.ops.borrow().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.ops.borrow().iter().filter(|o| o.starts_with(prefix)).count()
    }
}

impl VcsWorkspace for FakeWorkspace {
    fn add_remote(&self, name: &str, _url: &str) -> Result<(), VcsError> {
        self.record(format!("add_remote {name}"));
        Ok(())
    }

    fn remove_remote(&self, name: &str) -> Result<(), VcsError> {
        self.record(format!("remove_remote {name}"));
        Ok(())
    }

    fn list_remote_heads(&self, remote: &str) -> Result<Vec<RemoteHead>, VcsError> {
        self.record(format!("list {remote}"));
        if self.fail_listing {
            return Err(VcsError::Failed {
                command: "git ls-remote".into(),
                status: Some(128),
                stderr: "repository not found".into(),
            });
        }
        Ok(self.heads.clone())
    }

    fn fetch_branch_shallow(&self, _remote: &str, branch: &str) -> Result<(), VcsError> {
        self.record(format!("fetch {branch}"));
        Ok(())
    }

    fn local_head(&self, branch: &str) -> Result<Option<String>, VcsError> {
        Ok(self.local.borrow().get(branch).cloned())
    }

    fn commit_timestamp(&self, rev: &str) -> Result<Option<DateTime<Utc>>, VcsError> {
        Ok(self.timestamps.get(rev).copied())
    }

    fn branch_exists(&self, branch: &str) -> Result<bool, VcsError> {
        Ok(self.local.borrow().contains_key(branch))
    }

    fn is_ancestor(&self, _ancestor: &str, descendant: &str) -> Result<bool, VcsError> {
        self.record(format!("ancestor {descendant}"));
        let branch = descendant.trim_start_matches("refs/heads/");
        Ok(self.merged.contains(branch))
    }

    fn checkout(&self, branch: &str) -> Result<(), VcsError> {
        self.record(format!("checkout {branch}"));
        Ok(())
    }

    fn create_tracking_branch(&self, branch: &str, start: &str) -> Result<(), VcsError> {
        self.record(format!("create {branch} {start}"));
        self.local.borrow_mut().insert(branch.to_string(), "new".to_string());
        Ok(())
    }

    fn merge(&self, branch: &str, source_ref: &str) -> Result<MergeOutcome, VcsError> {
        self.record(format!("merge {branch}"));
        if self.conflicts.contains(branch) {
            return Err(VcsError::Conflict {
                branch: branch.to_string(),
                source_ref: source_ref.to_string(),
            });
        }
        if self.noop_merges.contains(branch) {
            return Ok(MergeOutcome::AlreadyUpToDate);
        }
        Ok(MergeOutcome::Merged)
    }

    fn default_branch(&self) -> &str {
        "main"
    }

    fn repository_size(&self) -> Result<u64, VcsError> {
        Ok(0)
    }
}

fn head(name: &str, id: Option<&str>) -> RemoteHead {
    RemoteHead {
        name: name.to_string(),
        commit_id: id.map(str::to_string),
        commit_timestamp: None,
    }
}

fn fork(name: &str) -> Fork {
    Fork {
        full_name: ForkName::from(name),
        clone_url: format!("file:///forks/{name}"),
        pushed_at: None,
        default_branch: "main".to_string(),
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap()
}

fn skip_list() -> Vec<String> {
    ["main", "master", "develop", "dev"].iter().map(|s| s.to_string()).collect()
}

fn ledger(dir: &TempDir) -> ChangeLedger {
    ChangeLedger::new(dir.path().join("updated_branches.log"))
}

// ---------------------------------------------------------------------------
// 1. Identity policy
// ---------------------------------------------------------------------------

#[test]
fn identical_ids_issue_no_fetch_or_merge() {
    let dir = TempDir::new().expect("tempdir");
    let ledger = ledger(&dir);
    let ws = FakeWorkspace {
        heads: vec![head("123", Some(A))],
        local: RefCell::new(HashMap::from([("123".to_string(), A.to_string())])),
        ..Default::default()
    };
    let reconciler = BranchReconciler::new(&ws, &ledger, "fork_", skip_list());
    let report = reconciler.reconcile(&fork("a/hub"), now()).expect("reconcile");

    assert_eq!(report.up_to_date, vec!["123"]);
    assert!(report.synced.is_empty());
    assert_eq!(ws.count("fetch"), 0);
    assert_eq!(ws.count("merge"), 0);
    assert_eq!(ws.count("create"), 0);
    assert!(!ledger.path().exists(), "nothing synchronized, nothing logged");
}

#[test]
fn missing_local_branch_is_created_and_logged() {
    let dir = TempDir::new().expect("tempdir");
    let ledger = ledger(&dir);
    let ws = FakeWorkspace {
        heads: vec![head("456", Some(A))],
        ..Default::default()
    };
    let reconciler = BranchReconciler::new(&ws, &ledger, "fork_", skip_list());
    let report = reconciler.reconcile(&fork("a/hub"), now()).expect("reconcile");

    assert_eq!(report.synced, vec!["456"]);
    assert_eq!(
        ws.ops(),
        vec![
            "add_remote fork_a_hub",
            "list fork_a_hub",
            "fetch 456",
            "create 456 refs/remotes/fork_a_hub/456",
            "remove_remote fork_a_hub",
        ]
    );
    let entries = ledger.entries().expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].branch, "456");
    assert_eq!(entries[0].timestamp, now());
}

#[test]
fn diverged_branch_is_checked_out_and_merged() {
    let dir = TempDir::new().expect("tempdir");
    let ledger = ledger(&dir);
    let ws = FakeWorkspace {
        heads: vec![head("123", Some(B))],
        local: RefCell::new(HashMap::from([("123".to_string(), A.to_string())])),
        ..Default::default()
    };
    let reconciler = BranchReconciler::new(&ws, &ledger, "fork_", skip_list());
    let report = reconciler.reconcile(&fork("a/hub"), now()).expect("reconcile");

    assert_eq!(report.synced, vec!["123"]);
    assert_eq!(ws.count("fetch 123"), 1);
    assert_eq!(ws.count("checkout 123"), 1);
    assert_eq!(ws.count("merge 123"), 1);
}

#[test]
fn remote_head_already_merged_locally_is_up_to_date() {
    let dir = TempDir::new().expect("tempdir");
    let ledger = ledger(&dir);
    let ws = FakeWorkspace {
        heads: vec![head("123", Some(B))],
        local: RefCell::new(HashMap::from([("123".to_string(), A.to_string())])),
        merged: HashSet::from(["123".to_string()]),
        ..Default::default()
    };
    let reconciler = BranchReconciler::new(&ws, &ledger, "fork_", skip_list());
    let report = reconciler.reconcile(&fork("a/hub"), now()).expect("reconcile");

    assert_eq!(report.up_to_date, vec!["123"]);
    assert!(report.synced.is_empty());
    assert_eq!(ws.count("ancestor refs/heads/123"), 1);
    assert_eq!(ws.count("fetch"), 0);
    assert_eq!(ws.count("merge"), 0);
    assert!(!ledger.path().exists());
}

#[test]
fn merge_with_nothing_to_do_is_not_reported_as_synced() {
    let dir = TempDir::new().expect("tempdir");
    let ledger = ledger(&dir);
    let ws = FakeWorkspace {
        heads: vec![head("1", Some(B)), head("2", Some(B))],
        local: RefCell::new(HashMap::from([
            ("1".to_string(), A.to_string()),
            ("2".to_string(), A.to_string()),
        ])),
        noop_merges: HashSet::from(["1".to_string()]),
        ..Default::default()
    };
    let reconciler = BranchReconciler::new(&ws, &ledger, "fork_", skip_list());
    let report = reconciler.reconcile(&fork("a/hub"), now()).expect("reconcile");

    assert_eq!(report.up_to_date, vec!["1"]);
    assert_eq!(report.synced, vec!["2"]);
    let logged: Vec<_> = ledger.entries().expect("entries").into_iter().map(|e| e.branch).collect();
    assert_eq!(logged, vec!["2"]);
}

#[test]
fn unparseable_local_id_forces_sync() {
    let dir = TempDir::new().expect("tempdir");
    let ledger = ledger(&dir);
    let ws = FakeWorkspace {
        heads: vec![head("123", Some(A))],
        local: RefCell::new(HashMap::from([("123".to_string(), "corrupt".to_string())])),
        ..Default::default()
    };
    let reconciler = BranchReconciler::new(&ws, &ledger, "fork_", skip_list());
    let report = reconciler.reconcile(&fork("a/hub"), now()).expect("reconcile");
    assert_eq!(report.synced, vec!["123"]);
}

// ---------------------------------------------------------------------------
// 2. Candidate filtering
// ---------------------------------------------------------------------------

#[test]
fn only_numeric_branches_outside_skip_list_are_candidates() {
    let dir = TempDir::new().expect("tempdir");
    let ledger = ledger(&dir);
    let ws = FakeWorkspace {
        heads: vec![
            head("main", Some(A)),
            head("feature-x", Some(A)),
            head("12a", Some(A)),
            head("77", Some(A)),
            head("9", Some(A)),
        ],
        ..Default::default()
    };
    let reconciler = BranchReconciler::new(&ws, &ledger, "fork_", skip_list());
    let report = reconciler.reconcile(&fork("a/hub"), now()).expect("reconcile");
    assert_eq!(report.synced, vec!["77", "9"], "enumeration order kept");
}

// ---------------------------------------------------------------------------
// 3. Timestamp fallback
// ---------------------------------------------------------------------------

#[test]
fn timestamp_fallback_fetches_once_and_compares() {
    let dir = TempDir::new().expect("tempdir");
    let ledger = ledger(&dir);
    let older = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
    let newer = Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap();
    let ws = FakeWorkspace {
        heads: vec![head("100", None), head("200", None)],
        local: RefCell::new(HashMap::from([
            ("100".to_string(), A.to_string()),
            ("200".to_string(), A.to_string()),
        ])),
        timestamps: HashMap::from([
            ("refs/heads/100".to_string(), older),
            ("refs/remotes/fork_a_hub/100".to_string(), newer),
            ("refs/heads/200".to_string(), newer),
            ("refs/remotes/fork_a_hub/200".to_string(), older),
        ]),
        ..Default::default()
    };
    let reconciler = BranchReconciler::new(&ws, &ledger, "fork_", skip_list());
    let report = reconciler.reconcile(&fork("a/hub"), now()).expect("reconcile");

    assert_eq!(report.synced, vec!["100"]);
    assert_eq!(report.up_to_date, vec!["200"]);
    assert_eq!(ws.count("fetch 100"), 1, "fetched once for timestamp and reused");
    assert_eq!(ws.count("fetch 200"), 1);
    assert_eq!(ws.count("merge"), 1);
}

#[test]
fn advertised_timestamp_decides_without_fetching() {
    let dir = TempDir::new().expect("tempdir");
    let ledger = ledger(&dir);
    let older = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
    let newer = Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap();
    let mut stale = head("300", None);
    stale.commit_timestamp = Some(older);
    let ws = FakeWorkspace {
        heads: vec![stale],
        local: RefCell::new(HashMap::from([("300".to_string(), A.to_string())])),
        timestamps: HashMap::from([("refs/heads/300".to_string(), newer)]),
        ..Default::default()
    };
    let reconciler = BranchReconciler::new(&ws, &ledger, "fork_", skip_list());
    let report = reconciler.reconcile(&fork("a/hub"), now()).expect("reconcile");

    assert_eq!(report.up_to_date, vec!["300"]);
    assert_eq!(ws.count("fetch"), 0);
}

#[test]
fn fetched_head_contained_locally_is_up_to_date() {
    let dir = TempDir::new().expect("tempdir");
    let ledger = ledger(&dir);
    let older = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
    let newer = Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap();
    let ws = FakeWorkspace {
        heads: vec![head("400", None)],
        local: RefCell::new(HashMap::from([("400".to_string(), A.to_string())])),
        timestamps: HashMap::from([
            ("refs/heads/400".to_string(), older),
            ("refs/remotes/fork_a_hub/400".to_string(), newer),
        ]),
        merged: HashSet::from(["400".to_string()]),
        ..Default::default()
    };
    let reconciler = BranchReconciler::new(&ws, &ledger, "fork_", skip_list());
    let report = reconciler.reconcile(&fork("a/hub"), now()).expect("reconcile");

    assert_eq!(report.up_to_date, vec!["400"]);
    assert_eq!(ws.count("fetch 400"), 1);
    assert_eq!(ws.count("merge"), 0);
}

// ---------------------------------------------------------------------------
// 4. Failure isolation and cleanup
// ---------------------------------------------------------------------------

#[test]
fn conflicting_branch_is_skipped_others_continue() {
    let dir = TempDir::new().expect("tempdir");
    let ledger = ledger(&dir);
    let ws = FakeWorkspace {
        heads: vec![head("1", Some(B)), head("2", Some(B))],
        local: RefCell::new(HashMap::from([
            ("1".to_string(), A.to_string()),
            ("2".to_string(), A.to_string()),
        ])),
        conflicts: HashSet::from(["1".to_string()]),
        ..Default::default()
    };
    let reconciler = BranchReconciler::new(&ws, &ledger, "fork_", skip_list());
    let report = reconciler.reconcile(&fork("a/hub"), now()).expect("reconcile");

    assert_eq!(report.synced, vec!["2"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "1");
    let logged: Vec<_> = ledger.entries().expect("entries").into_iter().map(|e| e.branch).collect();
    assert_eq!(logged, vec!["2"]);
}

#[test]
fn listing_failure_skips_fork_but_removes_remote_and_restores_default() {
    let dir = TempDir::new().expect("tempdir");
    let ledger = ledger(&dir);
    let ws = FakeWorkspace {
        fail_listing: true,
        ..Default::default()
    };
    let reconciler = BranchReconciler::new(&ws, &ledger, "fork_", skip_list());
    let summary = reconciler.reconcile_all(&[fork("broken/hub")], now());

    assert!(summary.reports.is_empty());
    assert_eq!(summary.skipped_forks.len(), 1);
    assert_eq!(summary.skipped_forks[0].0, "broken/hub");
    assert_eq!(
        ws.ops(),
        vec![
            "add_remote fork_broken_hub",
            "list fork_broken_hub",
            "remove_remote fork_broken_hub",
            "checkout main",
        ]
    );
}

#[test]
fn reconcile_all_processes_forks_in_order() {
    let dir = TempDir::new().expect("tempdir");
    let ledger = ledger(&dir);
    let ws = FakeWorkspace {
        heads: vec![head("5", Some(A))],
        ..Default::default()
    };
    let reconciler = BranchReconciler::new(&ws, &ledger, "fork_", skip_list());
    let summary = reconciler.reconcile_all(&[fork("a/hub"), fork("b-c/hub")], now());

    let forks: Vec<_> = summary.reports.iter().map(|r| r.fork.as_str()).collect();
    assert_eq!(forks, vec!["a/hub", "b-c/hub"]);
    // the branch created for the first fork holds an id that fails validation
    assert_eq!(summary.reports[1].synced, vec!["5"]);
    assert_eq!(ws.ops().last().map(String::as_str), Some("checkout main"));
    assert!(ws.ops().contains(&"add_remote fork_b_c_hub".to_string()));
}
