//! Branch freshness classification.
//!
//! Policy precedence:
//! 1. Commit identity, whenever the remote advertises an object id.
//! 2. Committer timestamp, only when it does not. The remote ref must have
//!    been fetched before its timestamp can be read.

use chrono::{DateTime, Utc};
use hubsync_core::{CommitId, LocalBranchState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReason {
    /// Never synchronized locally.
    Missing,
    /// Local head id or timestamp could not be read or validated.
    InvalidLocalState,
    /// Local and remote ids differ.
    Diverged,
    /// Remote commit is newer than the local one (timestamp policy).
    RemoteNewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    UpToDate,
    NeedsSync(SyncReason),
}

impl Freshness {
    pub fn needs_sync(self) -> bool {
        matches!(self, Self::NeedsSync(_))
    }
}

/// Primary policy: compare object ids.
pub fn by_commit_identity(local: Option<&LocalBranchState>, remote: &CommitId) -> Freshness {
    let Some(local) = local else {
        return Freshness::NeedsSync(SyncReason::Missing);
    };
    match CommitId::parse(&local.commit_id) {
        Err(_) => Freshness::NeedsSync(SyncReason::InvalidLocalState),
        Ok(id) if &id != remote => Freshness::NeedsSync(SyncReason::Diverged),
        Ok(_) => Freshness::UpToDate,
    }
}

/// Fallback policy: remote strictly newer than local needs a sync.
///
/// An unreadable remote timestamp is treated as newer so the branch is not
/// silently left behind.
pub fn by_timestamp(
    local: Option<&LocalBranchState>,
    remote: Option<DateTime<Utc>>,
) -> Freshness {
    let Some(local) = local else {
        return Freshness::NeedsSync(SyncReason::Missing);
    };
    let Some(local_ts) = local.commit_timestamp else {
        return Freshness::NeedsSync(SyncReason::InvalidLocalState);
    };
    match remote {
        Some(remote_ts) if remote_ts <= local_ts => Freshness::UpToDate,
        _ => Freshness::NeedsSync(SyncReason::RemoteNewer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hubsync_core::PackageId;
    use rstest::rstest;

    const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn local(id: &str, hour: Option<u32>) -> LocalBranchState {
        LocalBranchState {
            name: PackageId::parse("123").expect("id"),
            commit_id: id.to_string(),
            commit_timestamp: hour.map(|h| Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()),
        }
    }

    fn id(s: &str) -> CommitId {
        CommitId::parse(s).expect("commit id")
    }

    #[test]
    fn identity_policy() {
        assert_eq!(
            by_commit_identity(None, &id(A)),
            Freshness::NeedsSync(SyncReason::Missing)
        );
        assert_eq!(
            by_commit_identity(Some(&local("garbage", None)), &id(A)),
            Freshness::NeedsSync(SyncReason::InvalidLocalState)
        );
        assert_eq!(
            by_commit_identity(Some(&local(B, None)), &id(A)),
            Freshness::NeedsSync(SyncReason::Diverged)
        );
        assert_eq!(
            by_commit_identity(Some(&local(&A.to_uppercase(), None)), &id(A)),
            Freshness::UpToDate
        );
    }

    #[rstest]
    #[case::newer_remote(Some(5), Some(6), Freshness::NeedsSync(SyncReason::RemoteNewer))]
    #[case::same_instant(Some(5), Some(5), Freshness::UpToDate)]
    #[case::older_remote(Some(5), Some(4), Freshness::UpToDate)]
    #[case::unreadable_local(None, Some(4), Freshness::NeedsSync(SyncReason::InvalidLocalState))]
    #[case::unreadable_remote(Some(5), None, Freshness::NeedsSync(SyncReason::RemoteNewer))]
    fn timestamp_policy(
        #[case] local_hour: Option<u32>,
        #[case] remote_hour: Option<u32>,
        #[case] expected: Freshness,
    ) {
        let remote = remote_hour.map(|h| Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap());
        assert_eq!(by_timestamp(Some(&local(A, local_hour)), remote), expected);
    }

    #[test]
    fn timestamp_policy_without_local_branch() {
        let remote = Some(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap());
        assert_eq!(by_timestamp(None, remote), Freshness::NeedsSync(SyncReason::Missing));
    }
}
