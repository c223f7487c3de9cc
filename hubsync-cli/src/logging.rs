//! Subscriber setup and size-based rotation of the configured log file.
//!
//! Rotation keeps numbered backups: `hubsync.log → hubsync.log.1 → … → .N`,
//! dropping the oldest once `max_files` is reached.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use hubsync_core::Settings;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
///
/// Without `logging.file`, output goes to stderr so stdout stays clean for
/// summaries and `--json`.
pub fn init_tracing(settings: &Settings, repo: &Path) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let Some(path) = settings.log_file(repo) else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(io::stderr)
            .try_init();
        return;
    };

    if let Err(err) = rotate_if_needed(&path, settings.logging.max_bytes, settings.logging.max_files) {
        eprintln!("log rotation failed for {}: {err}", path.display());
    }
    match open_append(&path) {
        Ok(file) => {
            let _ = fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        Err(err) => {
            eprintln!("cannot open log file {}: {err}; logging to stderr", path.display());
            let _ = fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(io::stderr)
                .try_init();
        }
    }
}

fn open_append(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::OpenOptions::new().create(true).append(true).open(path)
}

/// Rotate `path` once it reaches `max_bytes`. Returns whether a rotation
/// happened; a missing file is not an error.
pub fn rotate_if_needed(path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if len < max_bytes {
        return Ok(false);
    }
    if max_files == 0 {
        fs::File::create(path)?;
        return Ok(true);
    }

    let oldest = backup_path(path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..max_files).rev() {
        let from = backup_path(path, n);
        if from.exists() {
            fs::rename(&from, backup_path(path, n + 1))?;
        }
    }
    fs::rename(path, backup_path(path, 1))?;
    fs::File::create(path)?;
    Ok(true)
}

/// `<name>.<n>` next to `base`.
fn backup_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "hubsync.log".to_string());
    base.with_file_name(format!("{name}.{n}"))
}
