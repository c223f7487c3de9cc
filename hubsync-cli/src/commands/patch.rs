//! `hubsync patch`: refresh manifest ids from the metadata service.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use hubsync_core::ChangeLedger;
use hubsync_patcher::{discovery, ManifestPatcher, MetadataClient, PatchSummary};

use super::Context;

/// Arguments for `hubsync patch`.
#[derive(Args, Debug)]
pub struct PatchArgs {
    /// Print unified diffs instead of writing files.
    #[arg(long)]
    pub dry_run: bool,

    /// Patch only these files (repeatable). Default: every `<digits>.lua`.
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,
}

impl PatchArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let summary = patch(ctx, &self.files, self.dry_run)?;
        print_summary(&summary, self.dry_run);
        Ok(())
    }
}

/// Patch `files`, or every discovered manifest when empty. Files holding a
/// branch from the ledger's recent window go first.
pub fn patch(ctx: &Context, files: &[PathBuf], dry_run: bool) -> Result<PatchSummary> {
    let files = if files.is_empty() {
        discovery::discover(&ctx.repo)
            .with_context(|| format!("failed to scan {} for manifests", ctx.repo.display()))?
    } else {
        files.to_vec()
    };
    if files.is_empty() {
        tracing::info!("no manifest files found");
        return Ok(PatchSummary::default());
    }

    let ledger = ChangeLedger::new(ctx.settings.ledger_path(&ctx.repo));
    let recent = ledger
        .recent_branches(ctx.settings.sync.ledger_window_hours, Utc::now())
        .context("failed to read the change ledger")?;

    let client = MetadataClient::from_settings(&ctx.settings);
    let patcher = ManifestPatcher::new(&client, ctx.settings.metadata_retry_policy())
        .with_dry_run(dry_run)
        .with_root(&ctx.repo)
        .with_pause(Duration::from_millis(ctx.settings.metadata.request_pause_ms));
    Ok(patcher.patch_all(&files, &recent))
}

pub fn print_summary(summary: &PatchSummary, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    for outcome in &summary.outcomes {
        if let Some(diff) = &outcome.diff {
            print!("{diff}");
            if !diff.ends_with('\n') {
                println!();
            }
        }
        if outcome.updates_applied > 0 {
            println!(
                "{prefix}  ✎  {} ({} updated)",
                outcome.path.display(),
                outcome.updates_applied
            );
        }
        for package in &outcome.skipped_packages {
            println!("  {}  {}: no metadata for {package}", "·".bright_black(), outcome.path.display());
        }
    }
    for (path, reason) in &summary.failures {
        println!("  {}  {}: {reason}", "✗".red(), path.display());
    }
    println!(
        "{prefix}{} {} manifest ids updated in {} of {} files",
        "✓".green(),
        summary.total_updates(),
        summary.files_changed(),
        summary.outcomes.len() + summary.failures.len()
    );
}
