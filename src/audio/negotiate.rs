//! Quality fallback for a single track.
//!
//! Variants are probed one at a time, most preferred first, with a single attempt each.
//! A server error moves on to the next variant; any other rejection stops the track.
//! When every variant failed with a server error, the most preferred one is fetched
//! again through the retrying downloader.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;
use url::Url;

use super::variants::Track;
use crate::core::client::{BmClient, RetryPolicy};
use crate::core::net::FetchOutcome;
use crate::core::BmError;

/// Boxed future returned by [`TrackProbe`] methods.
pub type ProbeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BmError>> + Send + 'a>>;

/// The two fetch primitives the negotiator drives.
///
/// Implemented by [`ClientProbe`]; tests substitute scripted fakes.
pub trait TrackProbe: Send + Sync {
    /// One attempt, no retry. `Err` is reserved for cancellation.
    fn probe<'a>(&'a self, url: &'a Url, dest: &'a Path) -> ProbeFuture<'a, FetchOutcome<u64>>;

    /// Full bounded-retry download, used once every variant is exhausted.
    fn escalate<'a>(&'a self, url: &'a Url, dest: &'a Path) -> ProbeFuture<'a, u64>;
}

/// [`TrackProbe`] backed by a [`BmClient`].
pub struct ClientProbe<'c> {
    client: &'c BmClient,
    policy: Option<&'c RetryPolicy>,
    cancel: &'c CancellationToken,
}

impl<'c> ClientProbe<'c> {
    pub fn new(
        client: &'c BmClient,
        policy: Option<&'c RetryPolicy>,
        cancel: &'c CancellationToken,
    ) -> Self {
        Self {
            client,
            policy,
            cancel,
        }
    }
}

impl TrackProbe for ClientProbe<'_> {
    fn probe<'a>(&'a self, url: &'a Url, dest: &'a Path) -> ProbeFuture<'a, FetchOutcome<u64>> {
        let timeout = self.policy.map(RetryPolicy::base_timeout);
        Box::pin(self.client.probe(url, dest, timeout, self.cancel))
    }

    fn escalate<'a>(&'a self, url: &'a Url, dest: &'a Path) -> ProbeFuture<'a, u64> {
        Box::pin(self.client.download(url, dest, self.policy, self.cancel))
    }
}

/// How a track was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiated {
    /// A probe succeeded. `downgraded_from` names the preferred variant when it was not used.
    Accepted {
        variant: String,
        downgraded_from: Option<String>,
        bytes: u64,
    },
    /// Every probe hit a server error; the preferred variant succeeded with full retry.
    Escalated { variant: String, bytes: u64 },
    /// The track offers none of the catalog's variants and was skipped.
    NoVariants,
}

enum State {
    Probe(usize),
    AllExhausted,
}

enum Verdict {
    /// Server error (or transport failure) on this variant; the next one may work.
    Degraded(String),
    /// The request itself is wrong; no other variant will fare better.
    Invalid(u16),
    Fatal(BmError),
}

fn classify(outcome: FetchOutcome<u64>) -> Result<u64, Verdict> {
    match outcome {
        FetchOutcome::Success(bytes) => Ok(bytes),
        FetchOutcome::Retryable(f) => match f.status {
            Some(s) if (500..=599).contains(&s) => Err(Verdict::Degraded(format!("HTTP {s}"))),
            Some(s) => Err(Verdict::Invalid(s)),
            None => Err(Verdict::Degraded(f.cause)),
        },
        FetchOutcome::Fatal(BmError::Status { status, .. }) if (500..=599).contains(&status) => {
            Err(Verdict::Degraded(format!("HTTP {status}")))
        }
        FetchOutcome::Fatal(BmError::Status { status, .. }) => Err(Verdict::Invalid(status)),
        FetchOutcome::Fatal(e) => Err(Verdict::Fatal(e)),
    }
}

/// Obtains `track` into `dest`, walking its try order derived from `preference`.
///
/// `label` is the padded track number used in reports and errors.
///
/// # Errors
///
/// [`BmError::RequestInvalid`] on a non-5xx rejection, anything the escalated download
/// returns, and [`BmError::Cancelled`].
pub async fn negotiate<P: TrackProbe + ?Sized>(
    probe: &P,
    track: &Track,
    label: &str,
    preference: &[String],
    dest: &Path,
) -> Result<Negotiated, BmError> {
    let order = track.try_order(preference);
    let Some(&preferred) = order.first() else {
        tracing::warn!(track = %label, "no offline variant for track; skipping");
        return Ok(Negotiated::NoVariants);
    };

    let mut state = State::Probe(0);
    loop {
        state = match state {
            State::Probe(k) if k >= order.len() => State::AllExhausted,
            State::Probe(k) => {
                let key = order[k];
                let url = &track.variants[key];
                match classify(probe.probe(url, dest).await?) {
                    Ok(bytes) => {
                        let downgraded_from = (k > 0).then(|| preferred.to_string());
                        if k > 0 {
                            tracing::warn!(
                                track = %label,
                                used = %key,
                                preferred = %preferred,
                                "fell back to a lower-priority variant; preferred one returned a server error"
                            );
                        }
                        return Ok(Negotiated::Accepted {
                            variant: key.to_string(),
                            downgraded_from,
                            bytes,
                        });
                    }
                    Err(Verdict::Degraded(cause)) => {
                        tracing::warn!(track = %label, variant = %key, %cause, "variant unavailable; trying next");
                        State::Probe(k + 1)
                    }
                    Err(Verdict::Invalid(status)) => {
                        return Err(BmError::RequestInvalid {
                            track: label.to_string(),
                            variant: key.to_string(),
                            status,
                        });
                    }
                    Err(Verdict::Fatal(e)) => return Err(e),
                }
            }
            State::AllExhausted => {
                tracing::warn!(
                    track = %label,
                    variant = %preferred,
                    "all variants returned server errors; retrying preferred variant with backoff"
                );
                let bytes = probe.escalate(&track.variants[preferred], dest).await?;
                return Ok(Negotiated::Escalated {
                    variant: preferred.to_string(),
                    bytes,
                });
            }
        };
    }
}
