//! Version-control primitives used by the reconciler.
//!
//! [`VcsWorkspace`] is the seam; [`GitWorkspace`] drives the `git` binary
//! with `-C <repo>`. Every invocation runs under a wall-clock budget: the
//! child is polled and killed once the budget is spent, failing only that one
//! operation.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use hubsync_core::{types::parse_timestamp, Settings};

use crate::error::VcsError;

/// A head advertised by a remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHead {
    pub name: String,
    /// Raw object id as printed by the remote; validated by the caller.
    pub commit_id: Option<String>,
    /// Set only by sources that report commit times; `ls-remote` does not.
    pub commit_timestamp: Option<DateTime<Utc>>,
}

/// How a merge landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The source was already contained in the branch; nothing changed.
    AlreadyUpToDate,
    FastForward,
    Merged,
}

/// Operations the reconciler needs from the local repository.
///
/// Methods take `&self`; implementations own whatever state they mutate.
pub trait VcsWorkspace {
    /// Add `name` pointing at `url`. An existing remote is repointed.
    fn add_remote(&self, name: &str, url: &str) -> Result<(), VcsError>;
    /// Remove `name`. Removing an absent remote succeeds.
    fn remove_remote(&self, name: &str) -> Result<(), VcsError>;
    fn list_remote_heads(&self, remote: &str) -> Result<Vec<RemoteHead>, VcsError>;
    /// Depth-1 fetch of one branch into `refs/remotes/<remote>/<branch>`.
    fn fetch_branch_shallow(&self, remote: &str, branch: &str) -> Result<(), VcsError>;
    /// Object id of `refs/heads/<branch>`, `None` when the branch is absent.
    fn local_head(&self, branch: &str) -> Result<Option<String>, VcsError>;
    /// Committer timestamp of any revision, `None` when it cannot be read.
    fn commit_timestamp(&self, rev: &str) -> Result<Option<DateTime<Utc>>, VcsError>;
    fn branch_exists(&self, branch: &str) -> Result<bool, VcsError>;
    /// `true` when `ancestor` is reachable from `descendant`. An object
    /// missing from the local repository is not an ancestor.
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, VcsError>;
    fn checkout(&self, branch: &str) -> Result<(), VcsError>;
    /// Create `branch` at `start` and check it out.
    fn create_tracking_branch(&self, branch: &str, start: &str) -> Result<(), VcsError>;
    /// Merge `source_ref` into the checked-out `branch`.
    fn merge(&self, branch: &str, source_ref: &str) -> Result<MergeOutcome, VcsError>;
    fn default_branch(&self) -> &str;
    fn switch_to_default(&self) -> Result<(), VcsError> {
        self.checkout(self.default_branch())
    }
    /// Packed plus loose object size in bytes.
    fn repository_size(&self) -> Result<u64, VcsError>;
}

/// `refs/remotes/<remote>/<branch>`
pub fn remote_ref(remote: &str, branch: &str) -> String {
    format!("refs/remotes/{remote}/{branch}")
}

// ---------------------------------------------------------------------------
// GitWorkspace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GitWorkspace {
    root: PathBuf,
    default_branch: String,
    timeout: Duration,
    committer_name: String,
    committer_email: String,
}

struct GitOutput {
    status: Option<i32>,
    stdout: String,
    stderr: String,
}

impl GitOutput {
    fn success(&self) -> bool {
        self.status == Some(0)
    }
}

impl GitWorkspace {
    pub fn new(root: impl Into<PathBuf>, default_branch: impl Into<String>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            default_branch: default_branch.into(),
            timeout,
            committer_name: "hubsync".to_string(),
            committer_email: "hubsync@localhost".to_string(),
        }
    }

    pub fn from_settings(root: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self::new(root, &settings.git.default_branch, settings.command_timeout())
            .with_committer(&settings.git.committer_name, &settings.git.committer_email)
    }

    pub fn with_committer(mut self, name: &str, email: &str) -> Self {
        self.committer_name = name.to_string();
        self.committer_email = email.to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run `git -C <root> <args>` and return its output whatever the exit code.
    fn run(&self, args: &[&str]) -> Result<GitOutput, VcsError> {
        let command = format!("git {}", args.join(" "));
        let mut child = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| VcsError::Spawn {
                command: command.clone(),
                source,
            })?;

        // Drain pipes on their own threads so a chatty child cannot block.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!(command = %command, "git command timed out, killed");
                    return Err(VcsError::Timeout {
                        command,
                        after: self.timeout,
                    });
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(20)),
                Err(source) => return Err(VcsError::Spawn { command, source }),
            }
        };

        let join = |h: Option<std::thread::JoinHandle<String>>| {
            h.and_then(|h| h.join().ok()).unwrap_or_default()
        };
        Ok(GitOutput {
            status: status.code(),
            stdout: join(stdout),
            stderr: join(stderr),
        })
    }

    /// Like [`run`](Self::run) but a non-zero exit is an error.
    fn run_ok(&self, args: &[&str]) -> Result<String, VcsError> {
        let out = self.run(args)?;
        if out.success() {
            Ok(out.stdout)
        } else {
            Err(VcsError::Failed {
                command: format!("git {}", args.join(" ")),
                status: out.status,
                stderr: out.stderr.trim().to_string(),
            })
        }
    }

    fn remote_exists(&self, name: &str) -> Result<bool, VcsError> {
        let out = self.run_ok(&["remote"])?;
        Ok(out.lines().any(|l| l.trim() == name))
    }

    fn identity_args(&self) -> [String; 4] {
        [
            "-c".to_string(),
            format!("user.name={}", self.committer_name),
            "-c".to_string(),
            format!("user.email={}", self.committer_email),
        ]
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Parse `git ls-remote --heads` output.
pub fn parse_ls_remote(output: &str) -> Vec<RemoteHead> {
    output
        .lines()
        .filter_map(|line| {
            let (id, reference) = line.split_once('\t')?;
            let name = reference.trim().strip_prefix("refs/heads/")?;
            let id = id.trim();
            Some(RemoteHead {
                name: name.to_string(),
                commit_id: (!id.is_empty()).then(|| id.to_string()),
                commit_timestamp: None,
            })
        })
        .collect()
}

/// Sum `size` and `size-pack` (KiB) from `git count-objects -v`, in bytes.
pub fn parse_count_objects(output: &str) -> Option<u64> {
    let mut total = None;
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if matches!(key.trim(), "size" | "size-pack") {
            let kib: u64 = value.trim().parse().ok()?;
            total = Some(total.unwrap_or(0) + kib * 1024);
        }
    }
    total
}

impl VcsWorkspace for GitWorkspace {
    fn add_remote(&self, name: &str, url: &str) -> Result<(), VcsError> {
        if self.remote_exists(name)? {
            self.run_ok(&["remote", "set-url", name, url])?;
        } else {
            self.run_ok(&["remote", "add", name, url])?;
        }
        Ok(())
    }

    fn remove_remote(&self, name: &str) -> Result<(), VcsError> {
        if self.remote_exists(name)? {
            self.run_ok(&["remote", "remove", name])?;
        }
        Ok(())
    }

    fn list_remote_heads(&self, remote: &str) -> Result<Vec<RemoteHead>, VcsError> {
        let out = self.run_ok(&["ls-remote", "--heads", remote])?;
        Ok(parse_ls_remote(&out))
    }

    fn fetch_branch_shallow(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        let refspec = format!("+refs/heads/{branch}:{}", remote_ref(remote, branch));
        self.run_ok(&["fetch", "--depth=1", "--no-tags", remote, &refspec])?;
        Ok(())
    }

    fn local_head(&self, branch: &str) -> Result<Option<String>, VcsError> {
        let reference = format!("refs/heads/{branch}");
        let out = self.run(&["rev-parse", "--verify", "--quiet", &reference])?;
        if out.success() {
            Ok(Some(out.stdout.trim().to_string()))
        } else {
            Ok(None)
        }
    }

    fn commit_timestamp(&self, rev: &str) -> Result<Option<DateTime<Utc>>, VcsError> {
        let out = self.run(&["log", "-1", "--format=%cI", rev, "--"])?;
        if !out.success() {
            return Ok(None);
        }
        Ok(parse_timestamp(out.stdout.trim()))
    }

    fn branch_exists(&self, branch: &str) -> Result<bool, VcsError> {
        let reference = format!("refs/heads/{branch}");
        Ok(self
            .run(&["show-ref", "--verify", "--quiet", &reference])?
            .success())
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, VcsError> {
        let out = self.run(&["merge-base", "--is-ancestor", ancestor, descendant])?;
        match out.status {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => {
                tracing::debug!(ancestor, descendant, stderr = %out.stderr.trim(), "ancestry unknown");
                Ok(false)
            }
        }
    }

    fn checkout(&self, branch: &str) -> Result<(), VcsError> {
        self.run_ok(&["checkout", "--quiet", branch, "--"])?;
        Ok(())
    }

    fn create_tracking_branch(&self, branch: &str, start: &str) -> Result<(), VcsError> {
        self.run_ok(&["checkout", "--quiet", "-b", branch, start, "--"])?;
        Ok(())
    }

    fn merge(&self, branch: &str, source_ref: &str) -> Result<MergeOutcome, VcsError> {
        if self.is_ancestor(source_ref, "HEAD")? {
            return Ok(MergeOutcome::AlreadyUpToDate);
        }
        if self
            .run(&["merge", "--ff-only", "--quiet", source_ref])?
            .success()
        {
            return Ok(MergeOutcome::FastForward);
        }

        // Shallow fetches cut the shared ancestry, hence unrelated histories.
        let identity = self.identity_args();
        let mut args: Vec<&str> = identity.iter().map(String::as_str).collect();
        args.extend([
            "merge",
            "--no-edit",
            "--quiet",
            "--allow-unrelated-histories",
            "-X",
            "theirs",
            source_ref,
        ]);
        let out = self.run(&args)?;
        if out.success() {
            return Ok(MergeOutcome::Merged);
        }
        tracing::warn!(branch, source_ref, stderr = %out.stderr.trim(), "merge failed, aborting");
        if let Err(e) = self.run_ok(&["merge", "--abort"]) {
            tracing::error!(branch, error = %e, "merge --abort failed");
        }
        Err(VcsError::Conflict {
            branch: branch.to_string(),
            source_ref: source_ref.to_string(),
        })
    }

    fn default_branch(&self) -> &str {
        &self.default_branch
    }

    fn repository_size(&self) -> Result<u64, VcsError> {
        let out = self.run_ok(&["count-objects", "-v"])?;
        parse_count_objects(&out).ok_or_else(|| VcsError::Parse {
            command: "git count-objects -v".to_string(),
            output: out,
        })
    }
}
