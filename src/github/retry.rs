//! Exponential backoff for GitHub API calls.
//!
//! Statuses 408, 429 and 5xx, plus transport failures, are transient and
//! retried with exponential backoff and full jitter. A `Retry-After` header
//! replaces the computed delay. Everything else is returned immediately.

use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use log::warn;
use rand::Rng;
use std::time::Duration;

/// Longest server-requested wait we honour.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

/// Configuration for exponential backoff retry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Cap for exponential growth.
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (typically 2.0).
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// 4 attempts with 1s, 2s, 4s base delays, capped at 30s.
    pub const DEFAULT: Self = Self {
        max_attempts: 4,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        backoff_multiplier: 2.0,
    };

    /// No waiting between attempts. Used by tests.
    pub const IMMEDIATE: Self = Self {
        max_attempts: 4,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        backoff_multiplier: 2.0,
    };

    /// Upper bound of the delay before retry number `retry` (0-indexed):
    /// `initial_delay * backoff_multiplier^retry`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(retry as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }

    /// A uniformly random delay in `[0, delay_for_attempt(retry)]`.
    pub fn jittered_delay(&self, retry: u32) -> Duration {
        let cap = self.delay_for_attempt(retry);
        if cap.is_zero() {
            return cap;
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..=cap.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Why one attempt failed.
#[derive(Debug)]
pub enum AttemptError {
    /// Worth retrying, optionally after a server-specified delay.
    Transient {
        error: Error,
        retry_after: Option<Duration>,
    },
    /// Returned to the caller as is.
    Permanent(Error),
}

/// True for HTTP statuses that are retried.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..=599).contains(&status)
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    cancel: &Cancellation,
    what: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> std::result::Result<T, AttemptError>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        cancel.check()?;
        match op() {
            Ok(value) => return Ok(value),
            Err(AttemptError::Permanent(error)) => return Err(error),
            Err(AttemptError::Transient { error, .. }) if attempt >= max_attempts => {
                return Err(error)
            }
            Err(AttemptError::Transient { error, retry_after }) => {
                let delay = retry_after
                    .map(|d| d.min(MAX_RETRY_AFTER))
                    .unwrap_or_else(|| config.jittered_delay(attempt - 1));
                warn!(
                    "{} failed (attempt {}/{}), retrying in {}: {}",
                    what,
                    attempt,
                    max_attempts,
                    humantime::format_duration(round_to_millis(delay)),
                    error
                );
                cancel.sleep(delay)?;
                attempt += 1;
            }
        }
    }
}

fn round_to_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}
