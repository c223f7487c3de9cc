//! Manifest patching for hubsync.
//!
//! Public API surface:
//! - [`manifest::ManifestFile`]: typed, layout-preserving parser
//! - [`metadata`]: [`MetadataSource`] trait, response classification, HTTP client
//! - [`ManifestPatcher`]: lookup, merge, rewrite, persist
//! - [`discovery::discover`]: `<digits>.lua` files under a root
//! - [`diff::unified_diff`]: dry-run previews

pub mod diff;
pub mod discovery;
pub mod error;
pub mod manifest;
pub mod metadata;
pub mod patcher;

pub use error::{MetadataError, PatchError};
pub use manifest::{Declaration, ManifestFile};
pub use metadata::{DepotManifestMap, MetadataClient, MetadataLookup, MetadataSource};
pub use patcher::{order_by_priority, ManifestPatcher, PatchOutcome, PatchSummary};
