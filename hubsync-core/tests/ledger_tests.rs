//! Ledger compaction, retention and malformed-line preservation tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use hubsync_core::{ChangeLedger, CompactStats};
use rstest::rstest;
use std::fs;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
}

fn days_ago(d: i64) -> String {
    (now() - Duration::days(d)).to_rfc3339()
}

// ---------------------------------------------------------------------------
// 1. Compaction
// ---------------------------------------------------------------------------

#[test]
fn compact_drops_old_keeps_recent_and_malformed() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("updated_branches.log");
    let content = format!(
        "{}\t100\n{}\t200\nnot a ledger line\n{}\t300\n\nbogus-ts\t400\n",
        days_ago(45),
        days_ago(2),
        days_ago(31),
    );
    fs::write(&path, content).expect("write");

    let stats = ChangeLedger::new(&path).compact(30, now()).expect("compact");
    assert_eq!(
        stats,
        CompactStats {
            kept: 1,
            dropped: 2,
            malformed_kept: 2
        }
    );

    let after = fs::read_to_string(&path).expect("read");
    assert_eq!(
        after,
        format!("{}\t200\nnot a ledger line\nbogus-ts\t400\n", days_ago(2))
    );
    assert!(!dir.path().join("updated_branches.log.tmp").exists());
}

#[test]
fn compact_then_append_keeps_order() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let ledger = ChangeLedger::new(dir.path().join("l.log"));
    ledger.append(&["1"], now() - Duration::days(1)).expect("append");
    ledger.compact(30, now()).expect("compact");
    ledger.append(&["2"], now()).expect("append");

    let names: Vec<_> = ledger
        .entries()
        .expect("entries")
        .into_iter()
        .map(|e| e.branch)
        .collect();
    assert_eq!(names, vec!["1", "2"]);
}

// ---------------------------------------------------------------------------
// 2. Recent window
// ---------------------------------------------------------------------------

#[rstest]
#[case(1, 24, true)]
#[case(23, 24, true)]
#[case(25, 24, false)]
#[case(2, 1, false)]
fn recent_window(#[case] hours_ago: i64, #[case] window: u64, #[case] expected: bool) {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let ledger = ChangeLedger::new(dir.path().join("l.log"));
    ledger
        .append(&["555"], now() - Duration::hours(hours_ago))
        .expect("append");
    let recent = ledger.recent_branches(window, now()).expect("recent");
    assert_eq!(recent.contains("555"), expected);
}

#[test]
fn duplicates_collapse_in_recent_set() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let ledger = ChangeLedger::new(dir.path().join("l.log"));
    ledger.append(&["9", "9"], now()).expect("append");
    ledger.append(&["9"], now()).expect("append");
    assert_eq!(ledger.entries().expect("entries").len(), 3);
    assert_eq!(ledger.recent_branches(24, now()).expect("recent").len(), 1);
}
