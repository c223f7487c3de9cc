//! `hubsync status`: cache ages and recent ledger activity.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use hubsync_core::{snapshot, ChangeLedger};

use super::{format_age, Context};

/// Arguments for `hubsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, ctx: &Context) -> Result<()> {
        let report = build_report(ctx, Utc::now())?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    repository: String,
    snapshot: CacheStatus,
    shortlist: CacheStatus,
    ledger_entries: usize,
    ledger_window_hours: u64,
    recent_branches: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CacheStatus {
    path: String,
    forks: Option<usize>,
    updated_at: Option<DateTime<Utc>>,
    age: String,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "item")]
    item: String,
    #[tabled(rename = "forks")]
    forks: String,
    #[tabled(rename = "updated")]
    age: String,
}

fn build_report(ctx: &Context, now: DateTime<Utc>) -> Result<StatusReport> {
    let forks_path = ctx.settings.forks_path(&ctx.repo);
    let fork_snapshot = snapshot::load_fork_snapshot(&forks_path)
        .with_context(|| format!("failed to read {}", forks_path.display()))?;
    let recent_path = ctx.settings.recent_forks_path(&ctx.repo);
    let recent = snapshot::load_recent_forks(&recent_path)
        .with_context(|| format!("failed to read {}", recent_path.display()))?;

    let ledger = ChangeLedger::new(ctx.settings.ledger_path(&ctx.repo));
    let ledger_entries = ledger.entries().context("failed to read the change ledger")?.len();
    let window = ctx.settings.sync.ledger_window_hours;
    let recent_branches = ledger.recent_branches(window, now)?.into_iter().collect();

    let snapshot_at = fork_snapshot.as_ref().map(|s| s.timestamp);
    let recent_at = recent.as_ref().map(|r| r.timestamp);
    Ok(StatusReport {
        repository: ctx.settings.github.repository.clone(),
        snapshot: CacheStatus {
            path: forks_path.display().to_string(),
            forks: fork_snapshot.map(|s| s.total_forks),
            updated_at: snapshot_at,
            age: format_age(snapshot_at, now),
        },
        shortlist: CacheStatus {
            path: recent_path.display().to_string(),
            forks: recent.map(|r| r.total_recent_forks),
            updated_at: recent_at,
            age: format_age(recent_at, now),
        },
        ledger_entries,
        ledger_window_hours: window,
        recent_branches,
    })
}

fn print_table(report: &StatusReport) {
    println!("hubsync v{} | {}", env!("CARGO_PKG_VERSION"), report.repository.bold());
    let row = |item: &str, cache: &CacheStatus| StatusRow {
        item: item.to_string(),
        forks: cache.forks.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string()),
        age: cache.age.clone(),
    };
    let mut table = Table::new(vec![
        row("fork snapshot", &report.snapshot),
        row("shortlist", &report.shortlist),
    ]);
    table.with(Style::rounded());
    println!("{table}");

    println!("ledger: {} entries", report.ledger_entries);
    if report.recent_branches.is_empty() {
        println!(
            "No branches synchronized in the last {}h.",
            report.ledger_window_hours
        );
    } else {
        println!(
            "Synchronized in the last {}h: {}",
            report.ledger_window_hours,
            report.recent_branches.join(", ").green()
        );
    }
}
