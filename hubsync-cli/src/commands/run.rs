//! `hubsync run`: the full pipeline.

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use hubsync_detector::GithubClient;
use hubsync_sync::ForkScope;

use super::{collect, patch, reconcile, shortlist, Context};

/// Arguments for `hubsync run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Refresh the fork snapshot even when it is still fresh.
    #[arg(long)]
    pub force: bool,
}

impl RunArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let client = GithubClient::from_settings(&ctx.settings);
        let collected = collect::collect(ctx, &client, self.force, Utc::now())?;
        tracing::info!(?collected, "collect stage done");

        let recent = shortlist::build(ctx, None)?;
        println!("shortlisted {} forks", recent.total_recent_forks);

        let summary = reconcile::reconcile(ctx, ForkScope::Active)?;
        reconcile::print_summary(&summary);

        let patched = patch::patch(ctx, &[], false)?;
        patch::print_summary(&patched, false);
        Ok(())
    }
}
