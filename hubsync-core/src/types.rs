//! Domain types shared by every hubsync stage.
//!
//! Identifiers coming from the outside world (fork names, package ids, commit
//! ids) are wrapped in newtypes so they cannot be mixed up at call sites.
//! Record types serialize with the fork source's field names so that snapshot
//! files stay readable by other tooling.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// `owner/name` of a hosted repository. Identity of a [`Fork`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ForkName(pub String);

impl ForkName {
    /// Case-insensitive comparison, as the hosting service treats names.
    pub fn same_repository(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for ForkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ForkName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ForkName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Numeric package identifier. Package branches and manifest files are named
/// after it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId(String);

impl PackageId {
    /// Accepts only non-empty, all-ASCII-digit strings.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        if is_all_digits(value) {
            Ok(Self(value.to_owned()))
        } else {
            Err(CoreError::InvalidPackageId {
                value: value.to_owned(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PackageId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Depot identifier inside a package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DepotId(pub String);

impl fmt::Display for DepotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for DepotId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for DepotId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque version token of a depot's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestId(pub String);

impl ManifestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ManifestId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ManifestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Hexadecimal object id (SHA-1 or SHA-256 length), normalised to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitId(String);

impl CommitId {
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        let trimmed = value.trim();
        let valid_len = trimmed.len() == 40 || trimmed.len() == 64;
        if valid_len && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(trimmed.to_ascii_lowercase()))
        } else {
            Err(CoreError::InvalidCommitId {
                value: value.to_owned(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 7 characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..7]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// An independently hosted copy of the tracked repository.
///
/// Unknown fields from the fork source are ignored on deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fork {
    pub full_name: ForkName,
    pub clone_url: String,
    /// Absent (or unparseable) when the source reports no push time.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_branch_name")]
    pub default_branch: String,
}

fn default_branch_name() -> String {
    "main".to_string()
}

/// One package branch on a fork as reported by branch enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub name: PackageId,
    /// `None` when the enumeration source cannot supply commit ids.
    pub remote_commit_id: Option<CommitId>,
    pub remote_commit_timestamp: Option<DateTime<Utc>>,
}

/// Head of a local branch, read from the working repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBranchState {
    pub name: PackageId,
    /// Raw head id as reported by the repository; validated on comparison.
    pub commit_id: String,
    pub commit_timestamp: Option<DateTime<Utc>>,
}

/// Minimal view of a commit in a fork's recent history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub sha: String,
    pub committed_at: DateTime<Utc>,
}

/// Full fork list as collected from the fork source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkSnapshot {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub total_forks: usize,
    #[serde(default)]
    pub forks: Vec<Fork>,
}

impl ForkSnapshot {
    pub fn new(forks: Vec<Fork>) -> Self {
        Self {
            timestamp: Utc::now(),
            total_forks: forks.len(),
            forks,
        }
    }
}

/// "Most recent K forks" shortlist consumed by the activity and reconcile stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentForks {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub total_recent_forks: usize,
    #[serde(default)]
    pub recent_forks: Vec<Fork>,
}

impl RecentForks {
    pub fn new(recent_forks: Vec<Fork>) -> Self {
        Self {
            timestamp: Utc::now(),
            total_recent_forks: recent_forks.len(),
            recent_forks,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn is_all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Parse an RFC 3339 timestamp, or a naive ISO timestamp interpreted as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
