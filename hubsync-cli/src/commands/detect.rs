//! `hubsync detect`: activity classification of the shortlist.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use hubsync_detector::{ActivityFilter, GithubClient};
use hubsync_sync::pipeline::load_shortlist;

use super::Context;

/// Arguments for `hubsync detect`.
#[derive(Args, Debug)]
pub struct DetectArgs {}

impl DetectArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let forks = load_shortlist(&ctx.repo, &ctx.settings)?;
        if forks.is_empty() {
            println!("Shortlist is empty. Run `hubsync collect` and `hubsync shortlist` first.");
            return Ok(());
        }

        let client = GithubClient::from_settings(&ctx.settings);
        let filter = ActivityFilter::new(
            &client,
            ctx.settings.freshness_window(),
            ctx.settings.github.repository.as_str(),
            ctx.settings.sync.recent_commit_count,
        );
        let now = Utc::now();
        let mut active = 0;
        for fork in &forks {
            if filter.is_upstream(fork) {
                continue;
            }
            if filter.is_active(fork, now) {
                active += 1;
                println!("  {} {}", "●".green(), fork.full_name);
            } else {
                println!("  {} {}", "○".bright_black(), fork.full_name);
            }
        }
        println!(
            "{active} of {} shortlisted forks active within {}h",
            forks.len(),
            ctx.settings.sync.freshness_window_hours
        );
        Ok(())
    }
}
