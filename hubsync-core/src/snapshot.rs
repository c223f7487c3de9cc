//! JSON records under the data directory.
//!
//! Write flow: serialize → `<name>.tmp` sibling → `rename`. The temp file sits
//! next to the target so the rename never crosses filesystems, and is removed
//! if the write or rename fails.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{io_err, CoreError};
use crate::types::{ForkSnapshot, RecentForks};

/// `<path>.tmp` sibling used for atomic replacement.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `bytes` to `path` atomically, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = tmp_path(path);
    let result = std::fs::write(&tmp, bytes)
        .map_err(|e| io_err(&tmp, e))
        .and_then(|()| std::fs::rename(&tmp, path).map_err(|e| io_err(path, e)));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CoreError> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    write_atomic(path, json.as_bytes())
}

/// Load a JSON record. `Ok(None)` when the file does not exist.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CoreError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path, e)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| CoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

pub fn load_fork_snapshot(path: &Path) -> Result<Option<ForkSnapshot>, CoreError> {
    load_json(path)
}

pub fn save_fork_snapshot(path: &Path, snapshot: &ForkSnapshot) -> Result<(), CoreError> {
    save_json_atomic(path, snapshot)
}

pub fn load_recent_forks(path: &Path) -> Result<Option<RecentForks>, CoreError> {
    load_json(path)
}

pub fn save_recent_forks(path: &Path, recent: &RecentForks) -> Result<(), CoreError> {
    save_json_atomic(path, recent)
}

/// Modification time of `path`, `None` when absent.
pub fn modified_at(path: &Path) -> Result<Option<DateTime<Utc>>, CoreError> {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let mtime = meta.modified().map_err(|e| io_err(path, e))?;
            Ok(Some(DateTime::<Utc>::from(mtime)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path, e)),
    }
}

/// True when `path` exists and was modified less than `max_age` before `now`.
pub fn is_fresh(
    path: &Path,
    max_age: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<bool, CoreError> {
    Ok(modified_at(path)?.is_some_and(|mtime| now.signed_duration_since(mtime) < max_age))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
