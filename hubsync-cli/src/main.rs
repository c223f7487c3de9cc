//! hubsync: keep a fork-aggregating manifest repository current.
//!
//! # Usage
//!
//! ```text
//! hubsync [--repo <dir>] [--config <file>] collect [--force]
//! hubsync shortlist [--count <k>]
//! hubsync detect
//! hubsync reconcile [--all-forks]
//! hubsync patch [--dry-run] [--file <path>...]
//! hubsync run
//! hubsync status [--json]
//! hubsync maintenance cleanup [--days <n>] | validate | report
//! ```

mod commands;
mod logging;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use commands::{
    collect::CollectArgs, detect::DetectArgs, maintenance::MaintenanceCommand,
    patch::PatchArgs, reconcile::ReconcileArgs, run::RunArgs, shortlist::ShortlistArgs,
    status::StatusArgs, Context,
};
use hubsync_core::Settings;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "hubsync",
    version,
    about = "Track forks, merge their package branches and refresh manifest ids",
    long_about = None,
)]
struct Cli {
    /// Repository root; data and log paths resolve against it.
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Settings file (default: <repo>/config/settings.yaml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch every fork of the tracked repository into the snapshot.
    Collect(CollectArgs),

    /// Keep the most recently pushed forks.
    Shortlist(ShortlistArgs),

    /// Classify shortlisted forks as active or inactive.
    Detect(DetectArgs),

    /// Merge package branches from active forks into the local repository.
    Reconcile(ReconcileArgs),

    /// Refresh manifest ids from the metadata service.
    Patch(PatchArgs),

    /// collect, shortlist, reconcile and patch in one go.
    Run(RunArgs),

    /// Show cache ages and recently synchronized branches.
    Status(StatusArgs),

    /// Housekeeping for the ledger, caches and logs.
    Maintenance {
        #[command(subcommand)]
        command: MaintenanceCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = Settings::resolve_path(&cli.repo, cli.config.as_deref());
    let settings = Settings::load(&cli.repo, cli.config.as_deref())
        .with_context(|| format!("failed to load settings from {}", config_path.display()))?;
    logging::init_tracing(&settings, &cli.repo);
    if !config_path.exists() {
        tracing::warn!(path = %config_path.display(), "settings file not found, using defaults");
    }

    let ctx = Context {
        repo: cli.repo,
        settings,
    };
    match cli.command {
        Commands::Collect(args) => args.run(&ctx),
        Commands::Shortlist(args) => args.run(&ctx),
        Commands::Detect(args) => args.run(&ctx),
        Commands::Reconcile(args) => args.run(&ctx),
        Commands::Patch(args) => args.run(&ctx),
        Commands::Run(args) => args.run(&ctx),
        Commands::Status(args) => args.run(&ctx),
        Commands::Maintenance { command } => commands::maintenance::run(command, &ctx),
    }
}
