//! Snapshot freshness and settings-driven path tests.

use chrono::{Duration, Utc};
use filetime::FileTime;
use hubsync_core::{snapshot, ForkSnapshot, Settings};

#[test]
fn fresh_snapshot_within_cache_window() {
    let repo = assert_fs::TempDir::new().expect("tempdir");
    let settings = Settings::default();
    let path = settings.forks_path(repo.path());
    snapshot::save_fork_snapshot(&path, &ForkSnapshot::new(vec![])).expect("save");

    assert!(snapshot::is_fresh(&path, settings.forks_cache_max_age(), Utc::now()).expect("fresh"));
}

#[test]
fn old_snapshot_is_stale() {
    let repo = assert_fs::TempDir::new().expect("tempdir");
    let settings = Settings::default();
    let path = settings.forks_path(repo.path());
    snapshot::save_fork_snapshot(&path, &ForkSnapshot::new(vec![])).expect("save");

    let old = std::time::SystemTime::now() - std::time::Duration::from_secs(48 * 3600);
    filetime::set_file_mtime(&path, FileTime::from_system_time(old)).expect("mtime");

    assert!(!snapshot::is_fresh(&path, Duration::hours(24), Utc::now()).expect("fresh"));
}

#[test]
fn missing_snapshot_is_not_fresh() {
    let repo = assert_fs::TempDir::new().expect("tempdir");
    let path = repo.path().join("data").join("forks.json");
    assert!(!snapshot::is_fresh(&path, Duration::hours(24), Utc::now()).expect("fresh"));
}
