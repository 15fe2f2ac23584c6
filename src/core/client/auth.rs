//! Bearer token acquisition and identity headers.
//!
//! The interactive OAuth flow lives outside this crate; a [`TokenProvider`] only has to
//! hand over the resulting token string.

use std::path::PathBuf;

use rand::seq::IndexedRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::constants::{
    APP_USER_AGENT_HEADER, APP_USER_AGENTS, AUTH_TOKEN_HEADER, IDENTITY_HEADERS,
};
use crate::core::BmError;

/// Yields the bearer token sent with every request.
pub trait TokenProvider: Send + Sync {
    /// Returns the token.
    ///
    /// # Errors
    ///
    /// Returns [`BmError::Auth`] when no usable token is available.
    fn token(&self) -> Result<String, BmError>;
}

/// A token known up front.
#[derive(Clone)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn token(&self) -> Result<String, BmError> {
        if self.0.trim().is_empty() {
            return Err(BmError::Auth("empty token".into()));
        }
        Ok(self.0.trim().to_string())
    }
}

/// A token stored in a text file (surrounding whitespace is ignored).
#[derive(Clone, Debug)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenProvider for TokenFile {
    fn token(&self) -> Result<String, BmError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            BmError::Auth(format!("cannot read token file {}: {e}", self.path.display()))
        })?;
        let token = raw.trim();
        if token.is_empty() {
            return Err(BmError::Auth(format!(
                "token file {} is empty",
                self.path.display()
            )));
        }
        Ok(token.to_string())
    }
}

/// Builds the fixed identity header set plus the token and any caller overrides.
pub(crate) fn identity_headers(
    token: Option<&str>,
    app_user_agent: Option<&str>,
    extra: &[(String, String)],
) -> Result<HeaderMap, BmError> {
    let mut headers = HeaderMap::new();
    for (name, value) in IDENTITY_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }

    let ua = app_user_agent
        .or_else(|| APP_USER_AGENTS.choose(&mut rand::rng()).copied())
        .unwrap_or_default();
    headers.insert(
        HeaderName::from_static(APP_USER_AGENT_HEADER),
        header_value(ua)?,
    );
    headers.insert(
        HeaderName::from_static(AUTH_TOKEN_HEADER),
        header_value(token.unwrap_or_default())?,
    );

    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| BmError::Config(format!("invalid header name {name:?}: {e}")))?;
        headers.insert(name, header_value(value)?);
    }
    Ok(headers)
}

fn header_value(v: &str) -> Result<HeaderValue, BmError> {
    HeaderValue::from_str(v).map_err(|e| BmError::Config(format!("invalid header value: {e}")))
}
