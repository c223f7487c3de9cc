//! hubsync core library: domain types, settings, persisted state, errors.
//!
//! Public API surface:
//! - [`types`]: newtypes and domain structs shared by every stage
//! - [`config`]: [`Settings`] loaded from YAML
//! - [`snapshot`]: fork snapshot / shortlist records on disk
//! - [`ledger`]: the append-only [`ChangeLedger`]
//! - [`retry`]: exponential backoff policy
//! - [`error`]: [`CoreError`]

pub mod config;
pub mod error;
pub mod ledger;
pub mod retry;
pub mod snapshot;
pub mod types;

pub use config::Settings;
pub use error::CoreError;
pub use ledger::{ChangeLedger, CompactStats, LedgerEntry};
pub use retry::RetryPolicy;
pub use types::{
    BranchRef, CommitId, CommitSummary, DepotId, Fork, ForkName, ForkSnapshot, LocalBranchState,
    ManifestId, PackageId, RecentForks,
};
