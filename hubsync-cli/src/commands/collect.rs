//! `hubsync collect`: snapshot every fork of the tracked repository.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;

use hubsync_core::{snapshot, ForkSnapshot};
use hubsync_detector::{collect_forks, ForkSource, GithubClient};

use super::Context;

/// Arguments for `hubsync collect`.
#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Ignore a fresh snapshot and hit the API anyway.
    #[arg(long)]
    pub force: bool,
}

impl CollectArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let client = GithubClient::from_settings(&ctx.settings);
        let outcome = collect(ctx, &client, self.force, Utc::now())?;
        print_outcome(ctx, &outcome);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Snapshot younger than the cache window was reused.
    Cached { forks: usize },
    Fetched { forks: usize },
}

/// Refresh the fork snapshot unless a fresh one exists and `force` is unset.
/// Failing to list forks is fatal.
pub fn collect(
    ctx: &Context,
    source: &dyn ForkSource,
    force: bool,
    now: DateTime<Utc>,
) -> Result<CollectOutcome> {
    let path = ctx.settings.forks_path(&ctx.repo);
    if !force && snapshot::is_fresh(&path, ctx.settings.forks_cache_max_age(), now)? {
        if let Some(existing) = snapshot::load_fork_snapshot(&path)? {
            tracing::info!(path = %path.display(), forks = existing.total_forks, "fork snapshot is fresh, skipping fetch");
            return Ok(CollectOutcome::Cached {
                forks: existing.total_forks,
            });
        }
    }

    let repository = &ctx.settings.github.repository;
    let forks = collect_forks(source, repository, ctx.settings.github.page_size)
        .with_context(|| format!("failed to list forks of {repository}"))?;
    let snapshot = ForkSnapshot::new(forks);
    snapshot::save_fork_snapshot(&path, &snapshot)
        .with_context(|| format!("failed to save fork snapshot to {}", path.display()))?;
    tracing::info!(forks = snapshot.total_forks, path = %path.display(), "fork snapshot saved");
    Ok(CollectOutcome::Fetched {
        forks: snapshot.total_forks,
    })
}

fn print_outcome(ctx: &Context, outcome: &CollectOutcome) {
    let repository = &ctx.settings.github.repository;
    match outcome {
        CollectOutcome::Cached { forks } => println!(
            "{} {forks} forks of {repository} (cached; use --force to refresh)",
            "·".bright_black()
        ),
        CollectOutcome::Fetched { forks } => {
            println!("{} collected {forks} forks of {repository}", "✓".green())
        }
    }
}
