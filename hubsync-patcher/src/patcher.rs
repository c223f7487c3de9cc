//! Manifest patching driven by authoritative metadata.
//!
//! ## `patch` protocol
//!
//! 1. Parse the file (no packages or duplicate depot declarations abort it).
//! 2. Look up every distinct package id, in declaration order.
//! 3. Merge the per-package maps (later ids win, empty values never win).
//! 4. Rewrite differing manifest literals in place.
//! 5. Persist atomically, only when something changed and not in dry-run.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hubsync_core::{retry::retry_with, snapshot::write_atomic, PackageId, RetryPolicy};
use serde::Serialize;

use crate::diff::unified_diff;
use crate::error::{MetadataError, PatchError};
use crate::manifest::ManifestFile;
use crate::metadata::{merge_maps, DepotManifestMap, MetadataLookup, MetadataSource};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchOutcome {
    pub path: PathBuf,
    pub updates_applied: usize,
    /// Dry-run only: unified diff of the would-be rewrite.
    pub diff: Option<String>,
    /// Package ids whose metadata could not be used.
    pub skipped_packages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchSummary {
    pub outcomes: Vec<PatchOutcome>,
    /// `(file, reason)` for files that could not be patched.
    pub failures: Vec<(PathBuf, String)>,
}

impl PatchSummary {
    pub fn total_updates(&self) -> usize {
        self.outcomes.iter().map(|o| o.updates_applied).sum()
    }

    pub fn files_changed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.updates_applied > 0).count()
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Files declaring a recently synchronized package first, then the rest.
/// Both groups keep their input order; unparseable files go last.
pub fn order_by_priority(files: &[PathBuf], recent: &BTreeSet<String>) -> Vec<PathBuf> {
    if recent.is_empty() {
        return files.to_vec();
    }
    let (priority, rest): (Vec<&PathBuf>, Vec<&PathBuf>) = files.iter().partition(|path| {
        ManifestFile::load(path)
            .map(|file| file.package_ids().iter().any(|id| recent.contains(id.as_str())))
            .unwrap_or(false)
    });
    tracing::info!(priority = priority.len(), rest = rest.len(), "manifest files ordered");
    priority.into_iter().chain(rest).cloned().collect()
}

// ---------------------------------------------------------------------------
// Patcher
// ---------------------------------------------------------------------------

type Sleeper<'a> = Box<dyn Fn(Duration) + 'a>;

pub struct ManifestPatcher<'a> {
    source: &'a dyn MetadataSource,
    policy: RetryPolicy,
    root: PathBuf,
    dry_run: bool,
    pause: Duration,
    sleep: Sleeper<'a>,
    /// Lookups are reused across files within one run.
    cache: RefCell<HashMap<PackageId, Option<DepotManifestMap>>>,
}

impl<'a> ManifestPatcher<'a> {
    pub fn new(source: &'a dyn MetadataSource, policy: RetryPolicy) -> Self {
        Self {
            source,
            policy,
            root: PathBuf::new(),
            dry_run: false,
            pause: Duration::ZERO,
            sleep: Box::new(std::thread::sleep),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Root used to shorten diff headers.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Pause between files in [`patch_all`](Self::patch_all).
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_sleeper(mut self, sleep: impl Fn(Duration) + 'a) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    /// Authoritative map for one package, `None` when unusable.
    fn fetch(&self, package: &PackageId) -> Option<DepotManifestMap> {
        if let Some(cached) = self.cache.borrow().get(package) {
            return cached.clone();
        }
        let result = retry_with(
            &self.policy,
            |_| self.source.lookup(package),
            MetadataError::is_transient,
            |d| (self.sleep)(d),
        );
        let map = match result {
            Ok(MetadataLookup::Found(map)) => Some(map),
            Ok(MetadataLookup::NotFound) => {
                tracing::info!(package = %package, "no metadata for package, skipping");
                None
            }
            Ok(MetadataLookup::Malformed) => {
                tracing::warn!(package = %package, "malformed metadata response, skipping");
                None
            }
            Err(MetadataError::NotFound { .. }) => {
                tracing::info!(package = %package, "package not found, skipping");
                None
            }
            Err(e @ MetadataError::Transient { .. }) => {
                tracing::warn!(package = %package, error = %e, "retries exhausted, skipping");
                None
            }
            Err(e) => {
                tracing::warn!(package = %package, error = %e, "metadata lookup failed, skipping");
                None
            }
        };
        self.cache.borrow_mut().insert(package.clone(), map.clone());
        map
    }

    /// Patch one file. Errors leave the file untouched.
    pub fn patch(&self, path: &Path) -> Result<PatchOutcome, PatchError> {
        let file = ManifestFile::load(path)?;

        let mut maps = Vec::new();
        let mut skipped_packages = Vec::new();
        for package in file.package_ids() {
            match self.fetch(&package) {
                Some(map) => maps.push(map),
                None => skipped_packages.push(package.to_string()),
            }
        }
        let merged = merge_maps(maps);
        let (patched, updates_applied) = file.apply(&merged);

        let mut diff = None;
        if updates_applied > 0 {
            if self.dry_run {
                diff = Some(unified_diff(path, &self.root, file.source(), &patched));
            } else {
                write_atomic(path, patched.as_bytes())?;
            }
        }
        tracing::info!(
            path = %path.display(),
            updates = updates_applied,
            dry_run = self.dry_run,
            "manifest processed"
        );
        Ok(PatchOutcome {
            path: path.to_path_buf(),
            updates_applied,
            diff,
            skipped_packages,
        })
    }

    /// Patch `files` in priority order. Per-file failures are recorded and
    /// the run continues.
    pub fn patch_all(&self, files: &[PathBuf], recent: &BTreeSet<String>) -> PatchSummary {
        let ordered = order_by_priority(files, recent);
        let mut summary = PatchSummary::default();
        for (i, path) in ordered.iter().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                (self.sleep)(self.pause);
            }
            match self.patch(path) {
                Ok(outcome) => summary.outcomes.push(outcome),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "manifest skipped");
                    summary.failures.push((path.clone(), e.to_string()));
                }
            }
        }
        tracing::info!(
            files = ordered.len(),
            changed = summary.files_changed(),
            updates = summary.total_updates(),
            failed = summary.failures.len(),
            "patch pass finished"
        );
        summary
    }
}
