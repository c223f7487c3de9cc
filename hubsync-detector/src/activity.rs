//! Fork activity classification.
//!
//! A fork is active when its newest commit is no older than the freshness
//! window. Anything that prevents reading the history makes it inactive.

use chrono::{DateTime, Duration, Utc};
use hubsync_core::{Fork, ForkName};

use crate::ForkSource;

pub struct ActivityFilter<'a> {
    source: &'a dyn ForkSource,
    window: Duration,
    upstream: ForkName,
    commit_count: u32,
}

impl<'a> ActivityFilter<'a> {
    pub fn new(
        source: &'a dyn ForkSource,
        window: Duration,
        upstream: impl Into<ForkName>,
        commit_count: u32,
    ) -> Self {
        Self {
            source,
            window,
            upstream: upstream.into(),
            commit_count: commit_count.max(1),
        }
    }

    pub fn is_upstream(&self, fork: &Fork) -> bool {
        fork.full_name.same_repository(&self.upstream.0)
    }

    /// `now - newest_commit <= window`. Future commits count as active.
    pub fn is_active(&self, fork: &Fork, now: DateTime<Utc>) -> bool {
        let commits = match self.source.recent_commits(&fork.full_name, self.commit_count) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(fork = %fork.full_name, error = %e, "commit history unavailable, skipping");
                return false;
            }
        };
        let Some(newest) = commits.iter().map(|c| c.committed_at).max() else {
            tracing::debug!(fork = %fork.full_name, "no commits, inactive");
            return false;
        };
        let active = now.signed_duration_since(newest) <= self.window;
        tracing::debug!(fork = %fork.full_name, newest = %newest, active, "activity checked");
        active
    }

    /// Active forks in input order, upstream excluded.
    pub fn filter(&self, forks: &[Fork], now: DateTime<Utc>) -> Vec<Fork> {
        forks
            .iter()
            .filter(|f| !self.is_upstream(f))
            .filter(|f| self.is_active(f, now))
            .cloned()
            .collect()
    }
}
