use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

/// An authentication challenge is answered at most once per request. The middleware issues
/// at most this many authenticated repeats of a request.
pub const MAX_RETRIES: u32 = 1;

/// Tunables for the single authenticated retry. Timeouts are in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Response statuses that are inspected for a challenge
    pub status_codes: Vec<u16>,
    /// Fixed delay before the retry. Takes precedence over `min_timeout` when non-zero.
    pub retry_after: u64,
    pub min_timeout: u64,
    pub timeout_factor: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            status_codes: vec![StatusCode::UNAUTHORIZED.as_u16()],
            retry_after: 0,
            min_timeout: 0,
            timeout_factor: 1.0,
        }
    }
}

/// The retry decision for one interceptor, built from its [`RetryOptions`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    status_codes: HashSet<u16>,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(options: &RetryOptions) -> Self {
        // First backoff step; `timeout_factor` only scales the steps after it.
        let delay_ms = if options.retry_after > 0 {
            options.retry_after
        } else {
            options.min_timeout
        };
        Self {
            status_codes: options.status_codes.iter().copied().collect(),
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// Whether `status` may carry a challenge worth answering.
    pub fn is_trigger(&self, status: StatusCode) -> bool {
        self.status_codes.contains(&status.as_u16())
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleep for the configured delay, if there is one.
    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryOptions::default())
    }
}
