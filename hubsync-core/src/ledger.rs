//! Append-only record of synchronized branches.
//!
//! One line per synchronized branch: `<RFC 3339 timestamp>\t<branch>`. The
//! ledger is only a prioritization hint for patching; nothing reads it for
//! correctness. Lines that do not parse are ignored by queries and kept
//! verbatim by [`ChangeLedger::compact`].

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{io_err, CoreError};
use crate::snapshot::write_atomic;
use crate::types::parse_timestamp;

/// Upper bound for configured windows, about a thousand years.
const MAX_SPAN_HOURS: i64 = 24 * 365_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Utc>,
    pub branch: String,
}

/// Outcome of [`ChangeLedger::compact`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactStats {
    pub kept: usize,
    pub dropped: usize,
    /// Unparseable lines carried over unchanged.
    pub malformed_kept: usize,
}

#[derive(Debug, Clone)]
pub struct ChangeLedger {
    path: PathBuf,
}

enum Line<'a> {
    Entry(LedgerEntry),
    Malformed(&'a str),
}

fn parse_line(line: &str) -> Line<'_> {
    let Some((ts, branch)) = line.split_once('\t') else {
        return Line::Malformed(line);
    };
    let branch = branch.trim();
    match parse_timestamp(ts) {
        Some(timestamp) if !branch.is_empty() => Line::Entry(LedgerEntry {
            timestamp,
            branch: branch.to_string(),
        }),
        _ => Line::Malformed(line),
    }
}

impl ChangeLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line per branch, creating the file and its directory as needed.
    pub fn append<S: AsRef<str>>(
        &self,
        branches: &[S],
        timestamp: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        if branches.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let stamp = timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut buf = String::new();
        for branch in branches {
            buf.push_str(&stamp);
            buf.push('\t');
            buf.push_str(branch.as_ref());
            buf.push('\n');
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err(&self.path, e))?;
        file.write_all(buf.as_bytes())
            .map_err(|e| io_err(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), count = branches.len(), "ledger appended");
        Ok(())
    }

    /// Raw content, empty when the ledger does not exist yet.
    fn read(&self) -> Result<Option<String>, CoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(c) => Ok(Some(c)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&self.path, e)),
        }
    }

    /// All well-formed entries in file order.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>, CoreError> {
        let Some(contents) = self.read()? else {
            return Ok(vec![]);
        };
        Ok(contents
            .lines()
            .filter_map(|line| match parse_line(line) {
                Line::Entry(entry) => Some(entry),
                Line::Malformed(_) => None,
            })
            .collect())
    }

    /// Branch names with an entry strictly newer than `now - hours`.
    pub fn recent_branches(
        &self,
        hours: u64,
        now: DateTime<Utc>,
    ) -> Result<BTreeSet<String>, CoreError> {
        let hours = i64::try_from(hours).unwrap_or(MAX_SPAN_HOURS).min(MAX_SPAN_HOURS);
        let window = chrono::Duration::hours(hours);
        let cutoff = now - window;
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.timestamp > cutoff)
            .map(|e| e.branch)
            .collect())
    }

    /// Drop entries older than `retention_days`, keeping malformed lines.
    ///
    /// Missing ledger is a no-op. The rewrite is atomic.
    pub fn compact(&self, retention_days: u64, now: DateTime<Utc>) -> Result<CompactStats, CoreError> {
        let Some(contents) = self.read()? else {
            return Ok(CompactStats::default());
        };
        let days = i64::try_from(retention_days).unwrap_or(MAX_SPAN_HOURS).min(MAX_SPAN_HOURS / 24);
        let horizon = now - chrono::Duration::days(days);

        let mut stats = CompactStats::default();
        let mut out = String::with_capacity(contents.len());
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(line) {
                Line::Entry(entry) if entry.timestamp < horizon => stats.dropped += 1,
                Line::Entry(_) => {
                    stats.kept += 1;
                    out.push_str(line);
                    out.push('\n');
                }
                Line::Malformed(raw) => {
                    stats.malformed_kept += 1;
                    out.push_str(raw);
                    out.push('\n');
                }
            }
        }

        write_atomic(&self.path, out.as_bytes())?;
        tracing::info!(
            path = %self.path.display(),
            kept = stats.kept,
            dropped = stats.dropped,
            malformed = stats.malformed_kept,
            "ledger compacted"
        );
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
