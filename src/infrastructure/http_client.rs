//! HTTP client for the procurement portal
//!
//! The portal tracks visitors with a session cookie issued on the first page
//! load; every later request must replay it or the portal serves an expired
//! session page instead of listings and details.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;

use crate::infrastructure::config::HttpClientConfig;

/// Opaque session identifier issued by the portal
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are credentials; keep them out of logs
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// A fetched page, whatever its status
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
    /// Session cookie value set by this response, if any
    pub session_token: Option<SessionToken>,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Page retrieval seam used by the crawler
///
/// Transport failures are errors; HTTP error statuses are returned as pages
/// so callers decide how to treat them.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, session: Option<&SessionToken>) -> Result<FetchedPage>;
}

/// reqwest-backed [`PageFetcher`]
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    session_cookie: String,
}

impl HttpClient {
    /// Create a new HTTP client; `session_cookie` names the cookie to read and replay
    pub fn new(config: HttpClientConfig, session_cookie: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .gzip(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            session_cookie: session_cookie.into(),
        })
    }

    fn cookie_header(&self, token: &SessionToken) -> Result<HeaderValue> {
        HeaderValue::from_str(&format!("{}={}", self.session_cookie, token.as_str()))
            .context("Session token is not a valid header value")
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &str, session: Option<&SessionToken>) -> Result<FetchedPage> {
        tracing::debug!("Fetching URL: {}", url);

        let mut request = self.client.get(url);
        if let Some(token) = session {
            request = request.header(COOKIE, self.cookie_header(token)?);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to fetch URL: {url}"))?;

        let status = response.status().as_u16();
        let session_token = response
            .cookies()
            .find(|cookie| cookie.name() == self.session_cookie)
            .map(|cookie| SessionToken::new(cookie.value()));

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from: {url}"))?;

        tracing::debug!("Fetched {} ({}, {} chars)", url, status, body.len());
        Ok(FetchedPage {
            url: url.to_string(),
            status,
            body,
            session_token,
        })
    }
}
