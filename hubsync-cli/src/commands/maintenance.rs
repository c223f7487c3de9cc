//! `hubsync maintenance`: ledger compaction, cache validation, health report.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Subcommand;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use hubsync_core::{snapshot, ChangeLedger};
use hubsync_patcher::{discovery, ManifestFile};
use hubsync_sync::{GitWorkspace, VcsWorkspace};

use super::Context;
use crate::logging;

const STALE_SNAPSHOT_HOURS: i64 = 48;
const LARGE_REPOSITORY_BYTES: u64 = 1024 * 1024 * 1024;
const VALIDATE_MANIFEST_SAMPLE: usize = 10;

#[derive(Subcommand, Debug)]
pub enum MaintenanceCommand {
    /// Compact the ledger and delete old log and temp files.
    Cleanup {
        /// Retention in days (default: maintenance.retention_days).
        #[arg(long)]
        days: Option<u64>,
    },
    /// Check cached JSON files and a sample of manifest files.
    Validate,
    /// Write a maintenance report to the data directory.
    Report,
}

pub fn run(command: MaintenanceCommand, ctx: &Context) -> Result<()> {
    match command {
        MaintenanceCommand::Cleanup { days } => {
            cleanup(ctx, days.unwrap_or(ctx.settings.maintenance.retention_days), Utc::now())
        }
        MaintenanceCommand::Validate => validate(ctx),
        MaintenanceCommand::Report => report(ctx, Utc::now()),
    }
}

// ---------------------------------------------------------------------------
// cleanup
// ---------------------------------------------------------------------------

fn cleanup(ctx: &Context, days: u64, now: DateTime<Utc>) -> Result<()> {
    let ledger = ChangeLedger::new(ctx.settings.ledger_path(&ctx.repo));
    let stats = ledger.compact(days, now).context("ledger compaction failed")?;
    println!(
        "{} ledger: kept {}, dropped {}, malformed kept {}",
        "✓".green(),
        stats.kept,
        stats.dropped,
        stats.malformed_kept
    );

    let live_log = ctx.settings.log_file(&ctx.repo);
    let mut protected = vec![ledger.path().to_path_buf()];
    protected.extend(live_log.clone());

    let mut dirs = vec![ctx.settings.data_dir(&ctx.repo), ctx.repo.join("logs")];
    if let Some(parent) = live_log.as_deref().and_then(Path::parent) {
        dirs.push(parent.to_path_buf());
    }
    dirs.sort();
    dirs.dedup();

    let cutoff = now - Duration::days(i64::try_from(days).unwrap_or(i64::MAX).min(365_000));
    let mut removed = 0;
    for dir in &dirs {
        removed += remove_old_files(dir, cutoff, &protected)?;
    }
    println!("{} removed {removed} old log/temp files", "✓".green());

    if let Some(path) = live_log {
        let rotated = logging::rotate_if_needed(
            &path,
            ctx.settings.logging.max_bytes,
            ctx.settings.logging.max_files,
        )
        .with_context(|| format!("failed to rotate {}", path.display()))?;
        if rotated {
            println!("{} rotated {}", "✓".green(), path.display());
        }
    }
    Ok(())
}

fn is_cleanup_candidate(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("log") | Some("tmp")
    )
}

/// Delete `.log`/`.tmp` files directly under `dir` modified before `cutoff`.
fn remove_old_files(dir: &Path, cutoff: DateTime<Utc>, protected: &[PathBuf]) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err).with_context(|| format!("failed to list {}", dir.display())),
    };
    let mut removed = 0;
    for entry in entries {
        let path = entry.with_context(|| format!("failed to list {}", dir.display()))?.path();
        if !path.is_file() || !is_cleanup_candidate(&path) || protected.contains(&path) {
            continue;
        }
        let Some(mtime) = snapshot::modified_at(&path)? else {
            continue;
        };
        if mtime < cutoff {
            fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
            tracing::info!(path = %path.display(), "old file removed");
            removed += 1;
        }
    }
    Ok(removed)
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum JsonCheck {
    Missing,
    Valid { items: usize },
    /// A missing `timestamp` was filled in.
    Repaired { items: usize },
    Invalid(String),
}

/// Check a cache file holding an object with an array under `list_key`.
fn check_json(path: &Path, list_key: &str, now: DateTime<Utc>) -> Result<JsonCheck> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(JsonCheck::Missing),
        Err(err) => return Err(err).with_context(|| format!("failed to read {}", path.display())),
    };
    let mut value: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => return Ok(JsonCheck::Invalid(format!("not valid JSON: {e}"))),
    };
    let Some(object) = value.as_object_mut() else {
        return Ok(JsonCheck::Invalid("top level is not an object".to_string()));
    };
    let Some(items) = object.get(list_key).and_then(Value::as_array).map(Vec::len) else {
        return Ok(JsonCheck::Invalid(format!("missing `{list_key}` array")));
    };
    if object.contains_key("timestamp") {
        return Ok(JsonCheck::Valid { items });
    }
    object.insert("timestamp".to_string(), Value::String(now.to_rfc3339()));
    snapshot::save_json_atomic(path, &value)?;
    Ok(JsonCheck::Repaired { items })
}

fn print_check(label: &str, check: &JsonCheck) {
    match check {
        JsonCheck::Missing => println!("  {} {label}: not present", "·".bright_black()),
        JsonCheck::Valid { items } => println!("  {} {label}: {items} entries", "✓".green()),
        JsonCheck::Repaired { items } => {
            println!("  {} {label}: {items} entries, timestamp added", "✓".yellow())
        }
        JsonCheck::Invalid(reason) => println!("  {} {label}: {reason}", "✗".red()),
    }
}

fn validate(ctx: &Context) -> Result<()> {
    let now = Utc::now();
    println!("cache files");
    let forks = check_json(&ctx.settings.forks_path(&ctx.repo), "forks", now)?;
    print_check("fork snapshot", &forks);
    let recent = check_json(&ctx.settings.recent_forks_path(&ctx.repo), "recent_forks", now)?;
    print_check("shortlist", &recent);

    let files = discovery::discover(&ctx.repo)?;
    let sample: Vec<_> = files.iter().take(VALIDATE_MANIFEST_SAMPLE).collect();
    let mut errors = Vec::new();
    for path in &sample {
        if let Err(e) = ManifestFile::load(path) {
            errors.push(e.to_string());
        }
    }
    println!(
        "manifests: {} found, {} checked, {} valid",
        files.len(),
        sample.len(),
        sample.len() - errors.len()
    );
    for error in &errors {
        println!("  {} {error}", "✗".red());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// report
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MaintenanceReport {
    generated_at: DateTime<Utc>,
    snapshot: Option<SnapshotInfo>,
    manifest_files: usize,
    repository_size_bytes: Option<u64>,
    recommendations: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SnapshotInfo {
    size_bytes: u64,
    age_hours: i64,
}

fn recommendations(
    snapshot: Option<&SnapshotInfo>,
    manifest_files: usize,
    repository_size: Option<u64>,
) -> Vec<String> {
    let mut out = Vec::new();
    match snapshot {
        None => out.push("no fork snapshot; run `hubsync collect`".to_string()),
        Some(info) if info.age_hours > STALE_SNAPSHOT_HOURS => out.push(format!(
            "fork snapshot is {}h old; run `hubsync collect --force`",
            info.age_hours
        )),
        Some(_) => {}
    }
    if repository_size.is_some_and(|size| size > LARGE_REPOSITORY_BYTES) {
        out.push("repository is larger than 1 GiB; consider `git gc --aggressive`".to_string());
    }
    if manifest_files == 0 {
        out.push("no manifest files found".to_string());
    }
    out
}

fn report(ctx: &Context, now: DateTime<Utc>) -> Result<()> {
    let forks_path = ctx.settings.forks_path(&ctx.repo);
    let snapshot_info = match snapshot::modified_at(&forks_path)? {
        Some(mtime) => Some(SnapshotInfo {
            size_bytes: fs::metadata(&forks_path)
                .with_context(|| format!("failed to stat {}", forks_path.display()))?
                .len(),
            age_hours: now.signed_duration_since(mtime).num_hours(),
        }),
        None => None,
    };
    let manifest_files = discovery::discover(&ctx.repo)?.len();
    let workspace = GitWorkspace::from_settings(&ctx.repo, &ctx.settings);
    let repository_size_bytes = match workspace.repository_size() {
        Ok(size) => Some(size),
        Err(e) => {
            tracing::warn!(error = %e, "could not measure repository size");
            None
        }
    };

    let report = MaintenanceReport {
        generated_at: now,
        recommendations: recommendations(snapshot_info.as_ref(), manifest_files, repository_size_bytes),
        snapshot: snapshot_info,
        manifest_files,
        repository_size_bytes,
    };
    let path = ctx.settings.report_path(&ctx.repo);
    snapshot::save_json_atomic(&path, &report)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("{} report written to {}", "✓".green(), path.display());
    for rec in &report.recommendations {
        println!("  {} {rec}", "!".yellow());
    }
    Ok(())
}
