//! Exponential backoff.
//!
//! [`RetryPolicy::delay_for_attempt`] is a pure function; [`retry_with`] runs
//! the loop and takes the sleeper as a parameter so tests never sleep.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (0-indexed). The first attempt never waits.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = u64::from(self.multiplier.max(1)).saturating_pow(attempt - 1);
        let ms = self.initial_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the policy
/// runs out of attempts. Returns the last error in the latter two cases.
pub fn retry_with<T, E>(
    policy: &RetryPolicy,
    mut op: impl FnMut(u32) -> Result<T, E>,
    is_transient: impl Fn(&E) -> bool,
    mut sleep: impl FnMut(Duration),
) -> Result<T, E> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let delay = policy.delay_for_attempt(attempt);
        if !delay.is_zero() {
            sleep(delay);
        }
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && attempt + 1 < attempts => {
                tracing::debug!(attempt, "transient failure, backing off");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
