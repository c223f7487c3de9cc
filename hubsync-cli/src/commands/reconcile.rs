//! `hubsync reconcile`: merge package branches from active forks.

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use hubsync_detector::GithubClient;
use hubsync_sync::{pipeline, ForkScope, GitWorkspace, ReconcileSummary};

use super::Context;

/// Arguments for `hubsync reconcile`.
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Skip the activity filter and reconcile every shortlisted fork.
    #[arg(long)]
    pub all_forks: bool,
}

impl ReconcileArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let scope = if self.all_forks {
            ForkScope::All
        } else {
            ForkScope::Active
        };
        let summary = reconcile(ctx, scope)?;
        print_summary(&summary);
        Ok(())
    }
}

pub fn reconcile(ctx: &Context, scope: ForkScope) -> Result<ReconcileSummary> {
    let client = GithubClient::from_settings(&ctx.settings);
    let workspace = GitWorkspace::from_settings(&ctx.repo, &ctx.settings);
    pipeline::run(&ctx.repo, &ctx.settings, &client, &workspace, scope, Utc::now())
        .context("reconcile failed")
}

pub fn print_summary(summary: &ReconcileSummary) {
    if summary.reports.is_empty() && summary.skipped_forks.is_empty() {
        println!("No forks to reconcile.");
        return;
    }
    for report in &summary.reports {
        println!(
            "{} {} ({} synced, {} up to date, {} failed)",
            "✓".green(),
            report.fork,
            report.synced.len(),
            report.up_to_date.len(),
            report.failed.len()
        );
        for branch in &report.synced {
            println!("  ✎  {branch}");
        }
        for (branch, reason) in &report.failed {
            println!("  {}  {branch}: {reason}", "✗".red());
        }
    }
    for (fork, reason) in &summary.skipped_forks {
        println!("{} {fork} skipped: {reason}", "!".yellow());
    }
    println!(
        "{} branches synchronized across {} forks",
        summary.synced_branches().len(),
        summary.reports.len()
    );
}
