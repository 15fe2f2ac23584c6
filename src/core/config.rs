//! Run configuration: retry knobs, throttling, output locations and per-run behavior.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::core::BmError;
use crate::core::client::RetryPolicy;

/// Which end of the variant list is preferred for multi-track audio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Highest quality first (the ascending key order). (Default)
    #[default]
    Max,
    /// Lowest quality first (the reversed key order).
    Min,
}

/// How far a failed resource propagates during a batch run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorScope {
    /// Stop the whole run at the first failed resource.
    Abort,
    /// Log the failure and continue with the next resource. (Default)
    #[default]
    Skip,
}

/// A uniform random wait range inserted between track downloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThrottleRange {
    min: Duration,
    max: Duration,
}

impl ThrottleRange {
    /// A range `[min, max]`; the bounds are swapped when given in the wrong order.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// The range `[max / 2, max]`.
    #[must_use]
    pub fn up_to(max: Duration) -> Self {
        Self::new(max / 2, max)
    }

    #[must_use]
    pub const fn min(&self) -> Duration {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> Duration {
        self.max
    }

    /// Draws one wait from the range.
    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let lo = self.min.as_secs_f64();
        let hi = self.max.as_secs_f64();
        Duration::from_secs_f64(rand::rng().random_range(lo..=hi))
    }
}

/// Values consumed by the fetch core. Every field has a default, so a partial JSON
/// document (or `FetchConfig::default()`) is enough.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Total attempts per fetch, including the first.
    pub max_attempts: u32,
    /// First backoff delay in seconds.
    pub initial_backoff_secs: f64,
    /// Upper bound for a backoff delay in seconds.
    pub backoff_cap_secs: f64,
    /// Base per-attempt timeout for metadata requests, doubled every attempt.
    pub metadata_timeout_secs: f64,
    /// Base per-attempt timeout for downloads, doubled every attempt.
    pub download_timeout_secs: f64,
    /// Upper bound of the polite pause between tracks; `0` disables it.
    pub throttle_secs: f64,
    /// Optional proxy URL.
    pub proxy_url: Option<String>,
    /// Completion ledger file.
    pub ledger_path: PathBuf,
    /// Root directory for downloaded resources.
    pub output_root: PathBuf,
    /// Audio variant preference.
    pub quality: Quality,
    /// Merge audiobook chapters with the external merge tool after download.
    pub merge_chapters: bool,
    /// Remove chapter files after a successful merge.
    pub cleanup_chapters: bool,
    /// Rewrite cover, JSON and annotation files even if they exist.
    pub force_meta: bool,
    /// Failure propagation for batch runs.
    pub error_scope: ErrorScope,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_secs: 5.0,
            backoff_cap_secs: 120.0,
            metadata_timeout_secs: 10.0,
            download_timeout_secs: 15.0,
            throttle_secs: 0.0,
            proxy_url: None,
            ledger_path: PathBuf::from("archive.txt"),
            output_root: PathBuf::from("mybooks"),
            quality: Quality::Max,
            merge_chapters: false,
            cleanup_chapters: true,
            force_meta: false,
            error_scope: ErrorScope::Skip,
        }
    }
}

impl FetchConfig {
    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read or a JSON error if it is malformed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BmError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the document is malformed.
    pub fn from_json(text: &str) -> Result<Self, BmError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Retry policy for metadata requests.
    ///
    /// # Errors
    ///
    /// Returns [`BmError::Config`] for negative or inconsistent values.
    pub fn metadata_policy(&self) -> Result<RetryPolicy, BmError> {
        self.policy(self.metadata_timeout_secs)
    }

    /// Retry policy for downloads.
    ///
    /// # Errors
    ///
    /// Returns [`BmError::Config`] for negative or inconsistent values.
    pub fn download_policy(&self) -> Result<RetryPolicy, BmError> {
        self.policy(self.download_timeout_secs)
    }

    /// The throttle range, or `None` when throttling is off.
    #[must_use]
    pub fn throttle(&self) -> Option<ThrottleRange> {
        Duration::try_from_secs_f64(self.throttle_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .map(ThrottleRange::up_to)
    }

    fn policy(&self, timeout_secs: f64) -> Result<RetryPolicy, BmError> {
        RetryPolicy::new(
            self.max_attempts,
            secs("initial_backoff_secs", self.initial_backoff_secs)?,
            secs("backoff_cap_secs", self.backoff_cap_secs)?,
            secs("timeout", timeout_secs)?,
        )
    }
}

fn secs(field: &str, value: f64) -> Result<Duration, BmError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| BmError::Config(format!("{field} must be a non-negative number, got {value}")))
}
