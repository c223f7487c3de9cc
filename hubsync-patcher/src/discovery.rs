//! Manifest file discovery.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{io_err, PatchError};

/// Directories never descended into.
fn is_skipped_dir(name: &str) -> bool {
    name.starts_with(".git") || name == "scripts"
}

/// `<digits>.lua`
pub fn is_manifest_name(name: &str) -> bool {
    name.strip_suffix(".lua")
        .is_some_and(|stem| !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit()))
}

/// Every manifest file under `root`, sorted by path. A missing root yields
/// an empty list.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>, PatchError> {
    let mut dirs = vec![root.to_path_buf()];
    let mut files = Vec::new();
    let mut cursor = 0;
    while cursor < dirs.len() {
        let current = dirs[cursor].clone();
        cursor += 1;
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(io_err(&current, err)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&current, e))?;
            let ty = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if ty.is_dir() {
                if !is_skipped_dir(&name) {
                    dirs.push(entry.path());
                }
            } else if ty.is_file() && is_manifest_name(&name) {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    tracing::debug!(root = %root.display(), count = files.len(), "manifest files discovered");
    Ok(files)
}
