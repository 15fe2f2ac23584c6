//! Attempt outcomes, the bounded retry loop, and the metadata fetcher.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::RETRY_AFTER;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::core::BmError;
use crate::core::client::retry::{is_retryable_status, parse_retry_after};
use crate::core::client::{AttemptContext, BODY_EXCERPT_CHARS, BmClient, RetryPolicy};

/// What a single attempt produced. Inspected by the retry loop and the variant negotiator.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// The attempt succeeded.
    Success(T),
    /// The attempt failed in a way that another attempt may fix.
    Retryable(Failure),
    /// The attempt failed for good; no retry is made.
    Fatal(BmError),
}

/// A transient failure: either a retryable HTTP status or a transport error.
#[derive(Debug, Clone)]
pub struct Failure {
    /// HTTP status, or `None` for a transport error.
    pub status: Option<u16>,
    /// Human-readable cause.
    pub cause: String,
    /// Server-supplied `Retry-After` hint.
    pub retry_after: Option<Duration>,
    /// Leading part of the error response body.
    pub excerpt: Option<String>,
}

impl Failure {
    pub(crate) fn transport(err: &reqwest::Error) -> Self {
        Self {
            status: None,
            cause: describe_transport(err),
            retry_after: None,
            excerpt: None,
        }
    }

    pub(crate) fn timed_out(what: &str, after: Duration) -> Self {
        Self {
            status: None,
            cause: format!("{what} timed out after {after:?}"),
            retry_after: None,
            excerpt: None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {status}"),
            None => f.write_str(&self.cause),
        }
    }
}

/// Maps a transport error to an outcome: builder errors are fatal, everything else
/// (connect, timeout, body, decode, protocol) is retryable.
pub(crate) fn transport_outcome<T>(err: reqwest::Error) -> FetchOutcome<T> {
    if err.is_builder() {
        FetchOutcome::Fatal(BmError::Http(err))
    } else {
        FetchOutcome::Retryable(Failure::transport(&err))
    }
}

fn describe_transport(err: &reqwest::Error) -> String {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect error"
    } else if err.is_body() || err.is_decode() {
        "read error"
    } else {
        "protocol error"
    };
    format!("{kind}: {err}")
}

/// Classifies a non-success response, reading a body excerpt and any `Retry-After` hint.
pub(crate) async fn status_outcome<T>(
    resp: reqwest::Response,
    timeout: Duration,
) -> FetchOutcome<T> {
    let status = resp.status().as_u16();
    let url = resp.url().to_string();
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, Utc::now()));
    let excerpt = body_excerpt(resp, timeout).await;

    if let Some(text) = &excerpt {
        tracing::debug!(status, %url, body = %text, "error response body");
    }

    if is_retryable_status(status) {
        FetchOutcome::Retryable(Failure {
            status: Some(status),
            cause: format!("HTTP {status}"),
            retry_after,
            excerpt,
        })
    } else {
        FetchOutcome::Fatal(BmError::Status {
            status,
            url,
            excerpt,
        })
    }
}

/// Reads at most [`BODY_EXCERPT_CHARS`] characters of an error body. Best effort.
///
/// Stops pulling chunks once enough bytes for the excerpt have arrived, so a huge or
/// endless error body is never buffered whole.
pub(crate) async fn body_excerpt(resp: reqwest::Response, timeout: Duration) -> Option<String> {
    let bytes = tokio::time::timeout(timeout, read_prefix(resp, BODY_EXCERPT_CHARS * 4))
        .await
        .ok()?
        .ok()?;
    let text = String::from_utf8_lossy(&bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(BODY_EXCERPT_CHARS).collect())
}

async fn read_prefix(mut resp: reqwest::Response, limit: usize) -> reqwest::Result<Vec<u8>> {
    let mut buf = Vec::new();
    while buf.len() < limit {
        match resp.chunk().await? {
            Some(chunk) => buf.extend_from_slice(&chunk),
            None => break,
        }
    }
    Ok(buf)
}

/// Awaits `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, BmError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(BmError::Cancelled),
        out = fut => Ok(out),
    }
}

/// Sleeps for `wait` unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`BmError::Cancelled`] when interrupted.
pub async fn sleep_or_cancel(wait: Duration, cancel: &CancellationToken) -> Result<(), BmError> {
    cancellable(cancel, tokio::time::sleep(wait)).await
}

/// Drives `attempt` until it succeeds, fails fatally, or the policy runs out of attempts.
///
/// Each retryable failure is logged with its attempt number, cause and computed wait.
/// Both the attempt and the wait are cancellation points; a cancelled attempt future is
/// dropped where it stands.
pub(crate) async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    what: &str,
    url: &Url,
    mut attempt: F,
) -> Result<T, BmError>
where
    F: FnMut(AttemptContext) -> Fut,
    Fut: Future<Output = FetchOutcome<T>>,
{
    let max = policy.max_attempts();
    let mut last = String::from("no attempt made");

    for index in 0..max {
        if cancel.is_cancelled() {
            return Err(BmError::Cancelled);
        }
        let ctx = policy.attempt(index);

        let failure = match cancellable(cancel, attempt(ctx)).await? {
            FetchOutcome::Success(v) => return Ok(v),
            FetchOutcome::Fatal(e) => return Err(e),
            FetchOutcome::Retryable(f) => f,
        };
        last = failure.to_string();

        if ctx.is_final {
            tracing::warn!(
                attempt = ctx.number(),
                max,
                cause = %failure.cause,
                %url,
                "{what} failed on the last allowed attempt"
            );
            break;
        }

        let wait = policy.backoff(index, failure.retry_after);
        tracing::warn!(
            attempt = ctx.number(),
            max,
            cause = %failure.cause,
            retry_after = ?failure.retry_after,
            wait = ?wait,
            %url,
            "{what} attempt failed; retrying"
        );
        sleep_or_cancel(wait, cancel).await?;
    }

    Err(BmError::Exhausted {
        url: url.to_string(),
        attempts: max,
        last,
    })
}

/* ----------------------- Metadata fetcher ----------------------- */

impl BmClient {
    /// GETs `url` and returns the full body, retrying transient failures.
    ///
    /// Retries on transport errors and on [`RETRYABLE_STATUSES`](crate::core::client::RETRYABLE_STATUSES);
    /// any other non-2xx status is returned immediately as [`BmError::Status`].
    ///
    /// # Errors
    ///
    /// [`BmError::Exhausted`] when every attempt failed, [`BmError::Status`] for a fatal
    /// status, [`BmError::Cancelled`] when interrupted.
    #[tracing::instrument(skip_all, fields(url = %url))]
    pub async fn fetch_text(
        &self,
        url: &Url,
        policy: Option<&RetryPolicy>,
        cancel: &CancellationToken,
    ) -> Result<String, BmError> {
        let policy = policy.unwrap_or_else(|| self.metadata_policy());
        run_with_retry(policy, cancel, "request", url, move |ctx| {
            self.metadata_attempt(url, ctx)
        })
        .await
    }

    /// [`fetch_text`](Self::fetch_text) followed by JSON decoding into `T`.
    ///
    /// # Errors
    ///
    /// Everything `fetch_text` returns, plus [`BmError::Data`] if the body does not match `T`.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        policy: Option<&RetryPolicy>,
        cancel: &CancellationToken,
    ) -> Result<T, BmError> {
        let body = self.fetch_text(url, policy, cancel).await?;
        serde_json::from_str(&body)
            .map_err(|e| BmError::Data(format!("{}: json parse error: {e}", url.path())))
    }

    async fn metadata_attempt(&self, url: &Url, ctx: AttemptContext) -> FetchOutcome<String> {
        let send = self.http().get(url.clone()).send();
        let resp = match tokio::time::timeout(ctx.timeout, send).await {
            Err(_) => return FetchOutcome::Retryable(Failure::timed_out("request", ctx.timeout)),
            Ok(Err(e)) => return transport_outcome(e),
            Ok(Ok(resp)) => resp,
        };

        if !resp.status().is_success() {
            return status_outcome(resp, ctx.timeout).await;
        }

        match tokio::time::timeout(ctx.timeout, resp.text()).await {
            Err(_) => FetchOutcome::Retryable(Failure::timed_out("body read", ctx.timeout)),
            Ok(Err(e)) => transport_outcome(e),
            Ok(Ok(text)) => FetchOutcome::Success(text),
        }
    }
}
