//! Retry policy and backoff arithmetic shared by every retrying fetch.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::Rng;

use crate::core::BmError;

/// HTTP status codes treated as transient. Any other non-success status is fatal.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Upper bound of the random jitter added to every computed backoff delay.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(800);

/// Returns `true` when `status` belongs to [`RETRYABLE_STATUSES`].
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Configuration for the bounded retry loop.
///
/// A policy allows exactly `max_attempts` attempts in total: the first attempt plus
/// `max_attempts - 1` retries. Every attempt `i` (0-based) gets a timeout of
/// `base_timeout * 2^i`, and the wait before attempt `i + 1` is derived from
/// `initial_backoff * 2^i`, any server hint, `backoff_cap` and jitter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    backoff_cap: Duration,
    base_timeout: Duration,
    max_jitter: Duration,
}

impl RetryPolicy {
    /// Creates a policy, rejecting `max_attempts == 0` and `initial_backoff > backoff_cap`.
    ///
    /// # Errors
    ///
    /// Returns [`BmError::Config`] when an invariant is violated.
    pub fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        backoff_cap: Duration,
        base_timeout: Duration,
    ) -> Result<Self, BmError> {
        if max_attempts == 0 {
            return Err(BmError::Config("max_attempts must be at least 1".into()));
        }
        if initial_backoff > backoff_cap {
            return Err(BmError::Config(format!(
                "initial backoff {initial_backoff:?} exceeds backoff cap {backoff_cap:?}"
            )));
        }
        Ok(Self {
            max_attempts,
            initial_backoff,
            backoff_cap,
            base_timeout,
            max_jitter: DEFAULT_MAX_JITTER,
        })
    }

    /// Default policy for JSON metadata requests (10 s base timeout).
    #[must_use]
    pub const fn metadata() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(5),
            backoff_cap: Duration::from_secs(120),
            base_timeout: Duration::from_secs(10),
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    /// Default policy for binary downloads (15 s base timeout).
    #[must_use]
    pub const fn download() -> Self {
        Self {
            base_timeout: Duration::from_secs(15),
            ..Self::metadata()
        }
    }

    /// Replaces the jitter bound. Mostly useful to make tests deterministic.
    #[must_use]
    pub const fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// Replaces the per-attempt base timeout.
    #[must_use]
    pub const fn with_base_timeout(mut self, timeout: Duration) -> Self {
        self.base_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub const fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    #[must_use]
    pub const fn backoff_cap(&self) -> Duration {
        self.backoff_cap
    }

    #[must_use]
    pub const fn base_timeout(&self) -> Duration {
        self.base_timeout
    }

    #[must_use]
    pub const fn max_jitter(&self) -> Duration {
        self.max_jitter
    }

    /// Builds the context for attempt `index` (0-based).
    #[must_use]
    pub fn attempt(&self, index: u32) -> AttemptContext {
        let scale = scale_factor(index);
        AttemptContext {
            index,
            scale,
            timeout: self.base_timeout.saturating_mul(scale),
            is_final: index + 1 >= self.max_attempts,
        }
    }

    /// Delay before the attempt following `index`, without jitter.
    ///
    /// `max(initial_backoff * 2^index, hint)` clamped to `backoff_cap`.
    #[must_use]
    pub fn backoff_floor(&self, index: u32, server_hint: Option<Duration>) -> Duration {
        let exponential = self.initial_backoff.saturating_mul(scale_factor(index));
        exponential
            .max(server_hint.unwrap_or(Duration::ZERO))
            .min(self.backoff_cap)
    }

    /// Delay before the attempt following `index`, including uniform jitter in `[0, max_jitter]`.
    #[must_use]
    pub fn backoff(&self, index: u32, server_hint: Option<Duration>) -> Duration {
        self.backoff_floor(index, server_hint)
            .saturating_add(jitter(self.max_jitter))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::metadata()
    }
}

/// Per-attempt values derived from a [`RetryPolicy`]. Created for one attempt and then dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttemptContext {
    /// 0-based attempt number.
    pub index: u32,
    /// `2^index`, saturating.
    pub scale: u32,
    /// Timeout applied to each network wait of this attempt.
    pub timeout: Duration,
    /// No retry follows this attempt.
    pub is_final: bool,
}

impl AttemptContext {
    /// 1-based attempt number, for log lines.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.index + 1
    }
}

fn scale_factor(index: u32) -> u32 {
    1u32.checked_shl(index).unwrap_or(u32::MAX)
}

fn jitter(max: Duration) -> Duration {
    let bound = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if bound == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=bound))
}

/// Parses a `Retry-After` header value relative to `now`.
///
/// Accepts a non-negative number of seconds (integer or fractional) or an HTTP-date.
/// Unparsable, negative, zero and past values yield `None`.
#[must_use]
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(secs) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|d| !d.is_zero());
    }

    let at = parse_http_date(value)?;
    (at - now).to_std().ok().filter(|d| !d.is_zero())
}

/// IMF-fixdate, with the obsolete RFC 850 and asctime forms as fallbacks.
fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        return Some(at.with_timezone(&Utc));
    }
    let value = value.strip_suffix(" GMT").unwrap_or(value);
    ["%A, %d-%b-%y %H:%M:%S", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}
