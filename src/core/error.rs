use thiserror::Error;

/// The primary error type for all fallible operations in this crate.
#[derive(Debug, Error)]
pub enum BmError {
    /// A transport-level failure (connect, read, timeout, protocol) reported by the HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A provided URL could not be parsed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A local filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON payload could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server returned a status code that is not worth retrying.
    #[error("Unexpected response status: {status} at {url}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The URL that returned the error.
        url: String,
        /// The first few thousand characters of the response body, when one was sent.
        excerpt: Option<String>,
    },

    /// Every allowed attempt failed with a retryable error.
    #[error("gave up on {url} after {attempts} attempts (last failure: {last})")]
    Exhausted {
        /// The URL that could not be fetched.
        url: String,
        /// How many attempts were made.
        attempts: u32,
        /// A description of the last failure.
        last: String,
    },

    /// The operation was interrupted by a cancellation request.
    #[error("operation cancelled")]
    Cancelled,

    /// A track variant was rejected with a non-server-error status; no other variant is tried.
    #[error("track {track}: variant {variant} rejected with status {status}")]
    RequestInvalid {
        /// The track label (zero-padded number).
        track: String,
        /// The variant key that was rejected.
        variant: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The data received from the API was in an unexpected format or was missing a required field.
    #[error("Data format unexpected or missing field: {0}")]
    Data(String),

    /// The auth token could not be obtained.
    #[error("authentication error: {0}")]
    Auth(String),

    /// A configuration value is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An external collaborator (converter, merge tool) failed.
    #[error("{tool} failed: {reason}")]
    Collaborator {
        /// The collaborator name.
        tool: String,
        /// The reason reported by the collaborator.
        reason: String,
    },
}

impl BmError {
    /// `true` when the error stems from a cancellation request.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Process exit code for a command-line front end: 130 for a graceful interrupt, 1 otherwise.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.is_cancelled() { 130 } else { 1 }
    }
}
