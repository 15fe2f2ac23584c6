//! Public client surface + builder.
//! Internals are split into `auth` (token + identity headers), `constants` (defaults)
//! and `retry` (policy + backoff math).

mod auth;
mod constants;
pub mod retry;

pub use auth::{StaticToken, TokenFile, TokenProvider};
pub use retry::{AttemptContext, RETRYABLE_STATUSES, RetryPolicy, parse_retry_after};

use std::sync::Arc;
use std::time::Duration;

use constants::DEFAULT_BASE_API;
use reqwest::Client;
use url::Url;

use crate::core::BmError;
use crate::core::config::FetchConfig;

pub(crate) use constants::BODY_EXCERPT_CHARS;

/// HTTP client for the content API.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct BmClient {
    http: Client,
    base_api: Url,
    metadata_policy: RetryPolicy,
    download_policy: RetryPolicy,
}

impl BmClient {
    /// Create a new builder.
    pub fn builder() -> BmClientBuilder {
        BmClientBuilder::default()
    }

    /* -------- internal getters used by other modules -------- */

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// The API base every resource endpoint is joined onto.
    pub fn base_api(&self) -> &Url {
        &self.base_api
    }

    /// Retry policy used for metadata requests unless a call overrides it.
    pub fn metadata_policy(&self) -> &RetryPolicy {
        &self.metadata_policy
    }

    /// Retry policy used for downloads unless a call overrides it.
    pub fn download_policy(&self) -> &RetryPolicy {
        &self.download_policy
    }
}

/* ----------------------- Builder ----------------------- */

#[derive(Default)]
pub struct BmClientBuilder {
    base_api: Option<Url>,
    token: Option<String>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    app_user_agent: Option<String>,
    extra_headers: Vec<(String, String)>,
    proxy: Option<Url>,
    connect_timeout: Option<Duration>,
    accept_invalid_certs: bool,
    metadata_policy: Option<RetryPolicy>,
    download_policy: Option<RetryPolicy>,
}

impl BmClientBuilder {
    /// Override the API base (e.g., `https://api.bookmate.yandex.net/api/v5/`).
    #[must_use]
    pub fn base_api(mut self, url: Url) -> Self {
        self.base_api = Some(url);
        self
    }

    /// Use a known bearer token.
    #[must_use]
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Resolve the bearer token from a provider when the client is built.
    #[must_use]
    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Pin the `app-user-agent` header instead of picking one at random.
    #[must_use]
    pub fn app_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.app_user_agent = Some(ua.into());
        self
    }

    /// Add or override an identity header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Route all traffic through a proxy (`http://`, `https://` or `socks5h://`).
    #[must_use]
    pub fn proxy(mut self, url: Url) -> Self {
        self.proxy = Some(url);
        self
    }

    /// Set a connect timeout. Default: none (per-attempt timeouts still apply).
    #[must_use]
    pub fn connect_timeout(mut self, dur: Duration) -> Self {
        self.connect_timeout = Some(dur);
        self
    }

    /// Skip TLS certificate validation. Off by default.
    #[must_use]
    pub fn danger_accept_invalid_certs(mut self, yes: bool) -> Self {
        self.accept_invalid_certs = yes;
        self
    }

    /// Default retry policy for metadata requests.
    #[must_use]
    pub fn metadata_policy(mut self, policy: RetryPolicy) -> Self {
        self.metadata_policy = Some(policy);
        self
    }

    /// Default retry policy for binary downloads.
    #[must_use]
    pub fn download_policy(mut self, policy: RetryPolicy) -> Self {
        self.download_policy = Some(policy);
        self
    }

    /// Apply the network-related values of a [`FetchConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`BmError::Config`] if the configured values violate a policy invariant,
    /// or [`BmError::Url`] for a malformed proxy URL.
    pub fn config(mut self, cfg: &FetchConfig) -> Result<Self, BmError> {
        self.metadata_policy = Some(cfg.metadata_policy()?);
        self.download_policy = Some(cfg.download_policy()?);
        if let Some(proxy) = &cfg.proxy_url {
            self.proxy = Some(Url::parse(proxy)?);
        }
        Ok(self)
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Fails when the token provider fails, a header is malformed, or the HTTP client
    /// cannot be constructed.
    pub fn build(self) -> Result<BmClient, BmError> {
        let base_api = match self.base_api {
            Some(u) => u,
            None => Url::parse(DEFAULT_BASE_API)?,
        };

        let token = match (self.token, &self.token_provider) {
            (Some(t), _) => Some(t),
            (None, Some(p)) => Some(p.token()?),
            (None, None) => None,
        };

        let headers = auth::identity_headers(
            token.as_deref(),
            self.app_user_agent.as_deref(),
            &self.extra_headers,
        )?;

        let mut httpb = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(self.accept_invalid_certs);

        if let Some(ct) = self.connect_timeout {
            httpb = httpb.connect_timeout(ct);
        }
        if let Some(proxy) = self.proxy {
            httpb = httpb.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }

        let http = httpb.build()?;

        Ok(BmClient {
            http,
            base_api,
            metadata_policy: self.metadata_policy.unwrap_or_else(RetryPolicy::metadata),
            download_policy: self.download_policy.unwrap_or_else(RetryPolicy::download),
        })
    }
}
