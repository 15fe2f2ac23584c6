//! Streaming downloads with atomic commit.
//!
//! [`BmClient::download`] is the bounded-retry downloader; [`BmClient::fetch_once`] and
//! [`BmClient::probe`] make exactly one attempt and are used to probe audio variants.
//! All three write to `<dest>.part` and rename onto `dest` only after the whole body
//! has been received, so `dest` never holds a partial file.

mod part;

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::core::client::{AttemptContext, BmClient, RetryPolicy};
use crate::core::net::{
    Failure, FetchOutcome, cancellable, run_with_retry, status_outcome, transport_outcome,
};
use crate::core::BmError;

pub use part::{CHUNK_SIZE, part_path};

impl BmClient {
    /// Streams `url` into `dest`, retrying transient failures with backoff.
    ///
    /// Every attempt restarts from byte 0; a partial file from a failed attempt is removed
    /// before the next one is scheduled. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// [`BmError::Status`] for a non-retryable status, [`BmError::Exhausted`] when attempts
    /// run out, [`BmError::Io`] for local write failures, [`BmError::Cancelled`] when interrupted.
    #[tracing::instrument(skip_all, fields(url = %url, dest = %dest.display()))]
    pub async fn download(
        &self,
        url: &Url,
        dest: &Path,
        policy: Option<&RetryPolicy>,
        cancel: &CancellationToken,
    ) -> Result<u64, BmError> {
        let policy = policy.unwrap_or_else(|| self.download_policy());
        let bytes = run_with_retry(policy, cancel, "download", url, move |ctx| {
            self.stream_attempt(url, dest, ctx)
        })
        .await?;
        tracing::info!(path = %dest.display(), bytes, "file downloaded");
        Ok(bytes)
    }

    /// One streaming attempt with no retry, reported as a tagged outcome.
    ///
    /// `base_timeout` defaults to the download policy's base timeout.
    ///
    /// # Errors
    ///
    /// Only [`BmError::Cancelled`]; every other failure is part of the outcome.
    pub async fn probe(
        &self,
        url: &Url,
        dest: &Path,
        base_timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome<u64>, BmError> {
        let ctx = AttemptContext {
            index: 0,
            scale: 1,
            timeout: base_timeout.unwrap_or_else(|| self.download_policy().base_timeout()),
            is_final: true,
        };
        let outcome = cancellable(cancel, self.stream_attempt(url, dest, ctx)).await?;
        if let FetchOutcome::Success(bytes) = &outcome {
            tracing::info!(path = %dest.display(), bytes, "file downloaded");
        }
        Ok(outcome)
    }

    /// One streaming attempt with no retry.
    ///
    /// Any non-200 status surfaces as [`BmError::Status`] with a body excerpt; a transport
    /// failure surfaces as [`BmError::Exhausted`] with `attempts == 1`.
    ///
    /// # Errors
    ///
    /// See above, plus [`BmError::Io`] and [`BmError::Cancelled`].
    pub async fn fetch_once(
        &self,
        url: &Url,
        dest: &Path,
        base_timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<u64, BmError> {
        match self.probe(url, dest, base_timeout, cancel).await? {
            FetchOutcome::Success(bytes) => Ok(bytes),
            FetchOutcome::Fatal(e) => Err(e),
            FetchOutcome::Retryable(f) => Err(failure_to_error(url, f)),
        }
    }

    async fn stream_attempt(&self, url: &Url, dest: &Path, ctx: AttemptContext) -> FetchOutcome<u64> {
        if let Err(e) = part::discard_part(dest).await {
            return FetchOutcome::Fatal(e.into());
        }

        let send = self.http().get(url.clone()).send();
        let resp = match tokio::time::timeout(ctx.timeout, send).await {
            Err(_) => return FetchOutcome::Retryable(Failure::timed_out("request", ctx.timeout)),
            Ok(Err(e)) => return transport_outcome(e),
            Ok(Ok(resp)) => resp,
        };
        if resp.status() != StatusCode::OK {
            return status_outcome(resp, ctx.timeout).await;
        }

        let mut file = match part::PartFile::create(dest).await {
            Ok(f) => f,
            Err(e) => return FetchOutcome::Fatal(e.into()),
        };
        let mut body = resp.bytes_stream();
        loop {
            match tokio::time::timeout(ctx.timeout, body.next()).await {
                Err(_) => {
                    return FetchOutcome::Retryable(Failure::timed_out("body read", ctx.timeout));
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => return transport_outcome(e),
                Ok(Some(Ok(chunk))) => {
                    if let Err(e) = file.write(&chunk).await {
                        return FetchOutcome::Fatal(e.into());
                    }
                }
            }
        }

        match file.commit().await {
            Ok(bytes) => FetchOutcome::Success(bytes),
            Err(e) => FetchOutcome::Fatal(e.into()),
        }
    }
}

fn failure_to_error(url: &Url, f: Failure) -> BmError {
    match f.status {
        Some(status) => BmError::Status {
            status,
            url: url.to_string(),
            excerpt: f.excerpt,
        },
        None => BmError::Exhausted {
            url: url.to_string(),
            attempts: 1,
            last: f.cause,
        },
    }
}
