//! GitHub REST client over `ureq`.
//!
//! Read-only. Every call carries the configured timeout. A rate-limited
//! response sleeps until `x-ratelimit-reset` plus a margin and is retried
//! exactly once; a second rate limit is returned to the caller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hubsync_core::{types::parse_timestamp, CommitSummary, Fork, ForkName, Settings};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::SourceError;
use crate::ForkSource;

type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

pub struct GithubClient {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
    rate_limit_margin: Duration,
    sleep: Sleeper,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    #[serde(default)]
    forks_count: u64,
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    committer: Option<Signature>,
    author: Option<Signature>,
}

#[derive(Debug, Deserialize)]
struct Signature {
    date: Option<String>,
}

impl GithubClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("hubsync/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            rate_limit_margin: Duration::from_secs(10),
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Client configured from the `github` settings section. The token is
    /// read from the configured environment variable when set and non-empty.
    pub fn from_settings(settings: &Settings) -> Self {
        let token = std::env::var(&settings.github.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::new(&settings.github.api_base_url, settings.api_timeout())
            .with_token(token)
            .with_rate_limit_margin(Duration::from_secs(settings.github.rate_limit_margin_secs))
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_rate_limit_margin(mut self, margin: Duration) -> Self {
        self.rate_limit_margin = margin;
        self
    }

    /// Replace the sleeper used while waiting out a rate limit.
    pub fn with_sleeper(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = match self.send(&url) {
            Err(SourceError::RateLimited { reset }) => {
                let wait = rate_limit_wait(reset, Utc::now(), self.rate_limit_margin);
                tracing::warn!(url = %url, wait_secs = wait.as_secs(), "rate limited, waiting for reset");
                (self.sleep)(wait);
                self.send(&url)?
            }
            other => other?,
        };
        response.into_json().map_err(|e| SourceError::Decode {
            url,
            message: e.to_string(),
        })
    }

    fn send(&self, url: &str) -> Result<ureq::Response, SourceError> {
        let mut request = self
            .agent
            .get(url)
            .set("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("token {token}"));
        }
        match request.call() {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(status, response)) => Err(classify_status(url, status, response)),
            Err(ureq::Error::Transport(t)) => Err(SourceError::Transient {
                url: url.to_string(),
                message: t.to_string(),
            }),
        }
    }
}

fn classify_status(url: &str, status: u16, response: ureq::Response) -> SourceError {
    match status {
        404 => SourceError::NotFound {
            url: url.to_string(),
        },
        403 | 429 => {
            let exhausted = response.header("x-ratelimit-remaining") == Some("0");
            let reset = response
                .header("x-ratelimit-reset")
                .and_then(|v| v.trim().parse::<i64>().ok());
            let body = response.into_string().unwrap_or_default();
            if exhausted || body.to_ascii_lowercase().contains("rate limit") {
                SourceError::RateLimited { reset }
            } else if status == 429 {
                SourceError::Transient {
                    url: url.to_string(),
                    message: "too many requests".to_string(),
                }
            } else {
                SourceError::Status {
                    url: url.to_string(),
                    status,
                }
            }
        }
        500..=599 => SourceError::Transient {
            url: url.to_string(),
            message: format!("HTTP {status}"),
        },
        _ => SourceError::Status {
            url: url.to_string(),
            status,
        },
    }
}

/// Time to wait before retrying a rate-limited call: until `reset` (epoch
/// seconds) plus `margin`, or just `margin` when the reset is unknown or past.
pub fn rate_limit_wait(reset: Option<i64>, now: DateTime<Utc>, margin: Duration) -> Duration {
    let until_reset = reset
        .map(|r| r - now.timestamp())
        .filter(|secs| *secs > 0)
        .map(|secs| Duration::from_secs(secs.unsigned_abs()))
        .unwrap_or_default();
    until_reset + margin
}

impl ForkSource for GithubClient {
    fn forks_count(&self, repository: &str) -> Result<u64, SourceError> {
        let info: RepoInfo = self.get_json(&format!("/repos/{repository}"))?;
        Ok(info.forks_count)
    }

    fn forks_page(&self, repository: &str, page: u32, per_page: u32) -> Result<Vec<Fork>, SourceError> {
        self.get_json(&format!(
            "/repos/{repository}/forks?sort=pushed&per_page={per_page}&page={page}"
        ))
    }

    fn recent_commits(&self, fork: &ForkName, count: u32) -> Result<Vec<CommitSummary>, SourceError> {
        let items: Vec<CommitItem> =
            self.get_json(&format!("/repos/{fork}/commits?per_page={count}"))?;
        Ok(items
            .into_iter()
            .filter_map(|item| {
                let date = item
                    .commit
                    .committer
                    .and_then(|s| s.date)
                    .or_else(|| item.commit.author.and_then(|s| s.date))?;
                Some(CommitSummary {
                    sha: item.sha,
                    committed_at: parse_timestamp(&date)?,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn wait_until_reset_plus_margin() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        let margin = Duration::from_secs(10);
        assert_eq!(rate_limit_wait(Some(1_060), now, margin), Duration::from_secs(70));
        assert_eq!(rate_limit_wait(Some(900), now, margin), margin);
        assert_eq!(rate_limit_wait(None, now, margin), margin);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = GithubClient::new("http://localhost:1/", Duration::from_secs(1));
        assert_eq!(client.base_url, "http://localhost:1");
    }
}
