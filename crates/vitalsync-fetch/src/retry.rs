use std::time::Duration;

use reqwest::StatusCode;
use vitalsync_core::config::ApiConfig;

/// Upper bound on how far a `Retry-After` header may stretch one delay.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// What to do with a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    /// 429 or 5xx.
    Retry,
    /// 401 or 403.
    Auth,
    /// Any other failure status.
    Fatal,
}

pub fn classify(status: StatusCode) -> Disposition {
    if status.is_success() {
        Disposition::Success
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Disposition::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Disposition::Retry
    } else {
        Disposition::Fatal
    }
}

/// Exponential backoff: one initial attempt plus `max_retries` retries,
/// waiting `base_delay * 2^n` before retry `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(cfg: &ApiConfig) -> Self {
        Self::new(cfg.max_retries, Duration::from_millis(cfg.backoff_base_ms))
    }

    /// Total attempts including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Backoff delay, lengthened (never shortened) by a server hint.
    pub fn delay_with_hint(&self, retry: u32, hint: Option<Duration>) -> Duration {
        let backoff = self.delay_for(retry);
        match hint {
            Some(h) => backoff.max(h.min(MAX_RETRY_AFTER)),
            None => backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Parse a `Retry-After` header given in delta-seconds. HTTP-date values are
/// ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
