//! `hubsync shortlist`: most recently pushed forks from the snapshot.

use anyhow::{Context as _, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use hubsync_core::{snapshot, ForkSnapshot, RecentForks};
use hubsync_detector::shortlist;

use super::Context;

/// Arguments for `hubsync shortlist`.
#[derive(Args, Debug)]
pub struct ShortlistArgs {
    /// How many forks to keep (default: github.max_forks_to_track).
    #[arg(long)]
    pub count: Option<usize>,
}

impl ShortlistArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let recent = build(ctx, self.count)?;
        print_table(&recent);
        Ok(())
    }
}

#[derive(Tabled)]
struct ShortlistRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "fork")]
    fork: String,
    #[tabled(rename = "pushed at")]
    pushed_at: String,
    #[tabled(rename = "branch")]
    branch: String,
}

/// Build and persist the shortlist. A missing snapshot is created empty.
pub fn build(ctx: &Context, count: Option<usize>) -> Result<RecentForks> {
    let forks_path = ctx.settings.forks_path(&ctx.repo);
    let snapshot = match snapshot::load_fork_snapshot(&forks_path)? {
        Some(s) => s,
        None => {
            tracing::warn!(path = %forks_path.display(), "no fork snapshot, creating an empty one");
            let empty = ForkSnapshot::new(Vec::new());
            snapshot::save_fork_snapshot(&forks_path, &empty)?;
            empty
        }
    };

    let count = count.unwrap_or(ctx.settings.github.max_forks_to_track);
    let recent = RecentForks::new(shortlist(
        &snapshot.forks,
        &ctx.settings.github.repository,
        count,
    ));
    let path = ctx.settings.recent_forks_path(&ctx.repo);
    snapshot::save_recent_forks(&path, &recent)
        .with_context(|| format!("failed to save shortlist to {}", path.display()))?;
    tracing::info!(
        candidates = snapshot.forks.len(),
        kept = recent.total_recent_forks,
        "shortlist saved"
    );
    Ok(recent)
}

fn print_table(recent: &RecentForks) {
    if recent.recent_forks.is_empty() {
        println!("No forks with push activity to shortlist.");
        return;
    }
    let rows: Vec<ShortlistRow> = recent
        .recent_forks
        .iter()
        .enumerate()
        .map(|(i, fork)| ShortlistRow {
            rank: i + 1,
            fork: fork.full_name.to_string(),
            pushed_at: fork
                .pushed_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            branch: fork.default_branch.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
