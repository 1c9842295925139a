//! Refresh endpoint client.
//!
//! [`TokenRefresher`] is the seam between the guard and the network. The
//! production implementation, [`HttpTokenRefresher`], posts to the
//! backend's refresh route with the session cookies and the refresh CSRF
//! token, then copies any `Set-Cookie` headers back into the jar.

use super::credentials::{CredentialStore, TokenKind};
use super::error::{AuthError, map_http_error};
use crate::error::FlowdoError;
use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

/// Header carrying the CSRF companion token.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Default refresh route on the backend.
pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/refresh";

/// Body returned by a successful refresh.
///
/// The tokens themselves travel only in cookies; the body carries metadata.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RefreshOutcome {
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the new access token in seconds.
    #[serde(default)]
    pub expires_in: Option<f64>,
}

/// Performs a single renewal of the access credential.
///
/// Implementations make exactly one attempt; retrying is the caller's job.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Renew the access credential held in `credentials`.
    async fn refresh(&self, credentials: &CredentialStore) -> Result<RefreshOutcome, AuthError>;
}

/// Connection settings for [`HttpTokenRefresher`].
#[derive(Debug, Clone)]
pub struct HttpRefreshConfig {
    /// Backend origin, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Route of the refresh endpoint.
    pub refresh_path: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl HttpRefreshConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: DEFAULT_REFRESH_PATH.to_owned(),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Absolute URL of the refresh endpoint.
    pub fn refresh_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.refresh_path.starts_with('/') {
            format!("{base}{}", self.refresh_path)
        } else {
            format!("{base}/{}", self.refresh_path)
        }
    }
}

/// [`TokenRefresher`] over HTTP.
pub struct HttpTokenRefresher {
    config: HttpRefreshConfig,
    client: reqwest::Client,
}

impl HttpTokenRefresher {
    pub fn new(config: HttpRefreshConfig) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FlowdoError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpRefreshConfig {
        &self.config
    }
}

impl std::fmt::Debug for HttpTokenRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTokenRefresher")
            .field("url", &self.config.refresh_url())
            .finish()
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    fn name(&self) -> &str {
        "http"
    }

    async fn refresh(&self, credentials: &CredentialStore) -> Result<RefreshOutcome, AuthError> {
        if !credentials.has_refresh_token() {
            return Err(AuthError::MissingCredential);
        }

        let url = self.config.refresh_url();
        debug!(url = %url, "sending refresh request");

        let mut request = self.client.post(&url).json(&serde_json::json!({}));
        if let Some(cookies) = credentials.cookie_header() {
            request = request.header(COOKIE, cookies);
        }
        if let Some(csrf) = credentials.csrf_token(TokenKind::Refresh) {
            request = request.header(CSRF_HEADER, csrf);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "refresh request failed");
            AuthError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read body".into());
            error!(status = %status, body = %body, "refresh request returned error");
            return Err(map_http_error(status, &body));
        }

        for value in response.headers().get_all(SET_COOKIE) {
            match value.to_str() {
                Ok(header) => credentials.apply_set_cookie(header),
                Err(_) => debug!("skipping non-ASCII Set-Cookie header"),
            }
        }

        let body = response.text().await?;
        let outcome = if body.trim().is_empty() {
            RefreshOutcome::default()
        } else {
            serde_json::from_str(&body).unwrap_or_else(|e| {
                debug!(error = %e, "unrecognised refresh response body");
                RefreshOutcome::default()
            })
        };

        info!(expires_in = ?outcome.expires_in, "access credential renewed");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn refresh_url_joins_base_and_path() {
        let cfg = HttpRefreshConfig::new("http://localhost:8000/");
        assert_eq!(cfg.refresh_url(), "http://localhost:8000/api/auth/refresh");

        let cfg = HttpRefreshConfig::new("http://api.test").with_refresh_path("auth/refresh");
        assert_eq!(cfg.refresh_url(), "http://api.test/auth/refresh");
    }

    #[test]
    fn refresh_outcome_parses_backend_body() {
        let body = r#"{"access_token":"","refresh_token":"","token_type":"bearer","expires_in":900.0}"#;
        let outcome: RefreshOutcome = serde_json::from_str(body).unwrap();
        assert_eq!(outcome.token_type.as_deref(), Some("bearer"));
        assert_eq!(outcome.expires_in, Some(900.0));
    }

    #[tokio::test]
    async fn missing_refresh_cookie_fails_without_a_request() {
        // Port 9 (discard) is never contacted because the check comes first.
        let refresher = HttpTokenRefresher::new(HttpRefreshConfig::new("http://127.0.0.1:9")).unwrap();
        let store = CredentialStore::from_cookie_header("access_token=a");
        let err = refresher.refresh(&store).await.unwrap_err();
        assert_eq!(err, AuthError::MissingCredential);
    }
}
