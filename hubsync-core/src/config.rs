//! YAML settings.
//!
//! Every section and field carries a default, so an empty or partial file is
//! valid. A missing file yields [`Settings::default`] with a warning; a file
//! that exists but does not parse is an error naming its path.
//!
//! # Lookup order
//!
//! 1. explicit `--config <file>`
//! 2. `<repo>/config/settings.yaml`
//! 3. `<config_dir>/hubsync/settings.yaml` (user-level, via `dirs`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};
use crate::retry::RetryPolicy;

/// Relative path of the repository-local settings file.
pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub github: GithubSettings,
    pub metadata: MetadataSettings,
    pub cache: CacheSettings,
    pub git: GitSettings,
    pub sync: SyncSettings,
    pub logging: LoggingSettings,
    pub maintenance: MaintenanceSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSettings {
    /// `owner/name` of the tracked upstream repository.
    pub repository: String,
    pub max_forks_to_track: usize,
    pub api_timeout_secs: u64,
    pub rate_limit_margin_secs: u64,
    pub page_size: u32,
    pub api_base_url: String,
    /// Name of the environment variable holding an optional API token.
    pub token_env: String,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            repository: "jukmisael/ManifestHub".to_string(),
            max_forks_to_track: 5,
            api_timeout_secs: 30,
            rate_limit_margin_secs: 10,
            page_size: 100,
            api_base_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Pause between manifest files so the metadata service is not hammered.
    pub request_pause_ms: u64,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.steamcmd.net/v1/info".to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
            retry_initial_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
            request_pause_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub data_directory: PathBuf,
    pub forks_file: String,
    pub recent_forks_file: String,
    pub updated_branches_log: String,
    pub forks_cache_hours: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("data"),
            forks_file: "forks.json".to_string(),
            recent_forks_file: "recent_forks.json".to_string(),
            updated_branches_log: "updated_branches.log".to_string(),
            forks_cache_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    pub remote_prefix: String,
    pub command_timeout_secs: u64,
    pub default_branch: String,
    pub committer_name: String,
    pub committer_email: String,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            remote_prefix: "fork_".to_string(),
            command_timeout_secs: 300,
            default_branch: "main".to_string(),
            committer_name: "hubsync".to_string(),
            committer_email: "hubsync@localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub skip_branches: Vec<String>,
    pub freshness_window_hours: u64,
    pub recent_commit_count: u32,
    /// Window for the ledger's "recently synchronized" query that orders patching.
    pub ledger_window_hours: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            skip_branches: ["main", "master", "develop", "dev"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            freshness_window_hours: 24,
            recent_commit_count: 5,
            ledger_window_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// Log file, relative to the repository root. Stderr when unset.
    pub file: Option<PathBuf>,
    pub max_bytes: u64,
    pub max_files: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_bytes: 10 * 1024 * 1024,
            max_files: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceSettings {
    pub retention_days: u64,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self { retention_days: 30 }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Settings {
    /// Load settings from `path`. A missing file yields defaults.
    pub fn load_at(path: &Path) -> Result<Self, CoreError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "settings file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(io_err(path, e)),
        };
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| CoreError::Settings {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the settings file for `repo` (see module docs) and load it.
    pub fn load(repo: &Path, explicit: Option<&Path>) -> Result<Self, CoreError> {
        Self::load_at(&Self::resolve_path(repo, explicit))
    }

    /// First existing candidate in lookup order; the repository-local path
    /// when none exists.
    pub fn resolve_path(repo: &Path, explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        let local = repo.join(DEFAULT_SETTINGS_PATH);
        if local.exists() {
            return local;
        }
        if let Some(user) = dirs::config_dir().map(|d| d.join("hubsync").join("settings.yaml")) {
            if user.exists() {
                return user;
            }
        }
        local
    }

    // -----------------------------------------------------------------------
    // Path helpers (pure, no I/O)
    // -----------------------------------------------------------------------

    pub fn data_dir(&self, repo: &Path) -> PathBuf {
        resolve(repo, &self.cache.data_directory)
    }

    pub fn ledger_path(&self, repo: &Path) -> PathBuf {
        self.data_dir(repo).join(&self.cache.updated_branches_log)
    }

    pub fn forks_path(&self, repo: &Path) -> PathBuf {
        self.data_dir(repo).join(&self.cache.forks_file)
    }

    pub fn recent_forks_path(&self, repo: &Path) -> PathBuf {
        self.data_dir(repo).join(&self.cache.recent_forks_file)
    }

    pub fn report_path(&self, repo: &Path) -> PathBuf {
        self.data_dir(repo).join("maintenance_report.json")
    }

    pub fn log_file(&self, repo: &Path) -> Option<PathBuf> {
        self.logging.file.as_ref().map(|f| resolve(repo, f))
    }

    // -----------------------------------------------------------------------
    // Durations
    // -----------------------------------------------------------------------

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.github.api_timeout_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata.request_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.git.command_timeout_secs)
    }

    pub fn freshness_window(&self) -> chrono::Duration {
        hours(self.sync.freshness_window_hours)
    }

    pub fn forks_cache_max_age(&self) -> chrono::Duration {
        hours(self.cache.forks_cache_hours)
    }

    pub fn metadata_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.metadata.max_retries,
            initial_delay_ms: self.metadata.retry_initial_delay_ms,
            max_delay_ms: self.metadata.retry_max_delay_ms,
            multiplier: 2,
        }
    }
}

fn resolve(repo: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        repo.join(path)
    }
}

fn hours(h: u64) -> chrono::Duration {
    chrono::Duration::hours(i64::try_from(h).unwrap_or(i64::MAX).min(24 * 365_000))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
