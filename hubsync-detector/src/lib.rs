//! Fork discovery and activity detection for hubsync.
//!
//! - [`ForkSource`]: read-only view of the hosting service
//! - [`github::GithubClient`]: `ureq` implementation with rate-limit handling
//! - [`pagination`]: full fork list in ⌈N/P⌉ requests
//! - [`activity::ActivityFilter`]: freshness-window classification
//! - [`shortlist`]: most recently pushed forks

pub mod activity;
pub mod error;
pub mod github;
pub mod pagination;
pub mod shortlist;

use hubsync_core::{CommitSummary, Fork, ForkName};

pub use activity::ActivityFilter;
pub use error::SourceError;
pub use github::GithubClient;
pub use pagination::collect_forks;
pub use shortlist::shortlist;

/// Read-only access to forks of a hosted repository.
pub trait ForkSource {
    /// Number of forks the service reports for `repository`.
    fn forks_count(&self, repository: &str) -> Result<u64, SourceError>;

    /// One page (1-based) of forks, sorted by push time.
    fn forks_page(&self, repository: &str, page: u32, per_page: u32)
        -> Result<Vec<Fork>, SourceError>;

    /// Up to `count` most recent commits on the fork's default branch.
    fn recent_commits(&self, fork: &ForkName, count: u32)
        -> Result<Vec<CommitSummary>, SourceError>;
}
