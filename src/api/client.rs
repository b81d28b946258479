//! The authenticated request pipeline.
//!
//! Every call to the backend flows through [`ApiClient`]. Authenticated
//! requests get exactly one transparent recovery path: on HTTP 401 the
//! client exchanges the stored refresh token for a new access token and
//! replays the original request once. The second attempt's outcome is final
//! — a 401 on the replay is reported as a plain request failure, never
//! another refresh. If the refresh itself fails, the stored session is
//! wiped and the caller sees [`ApiError::AuthenticationExpired`], which the
//! UI layer must treat as "log in again".
use crate::api::types::RefreshResponse;
use crate::auth::TokenStore;
use crate::config::Config;
use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Response bodies larger than this are rejected outright.
const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// How much of a non-JSON error body is kept for the error message.
const MAX_DETAIL_LEN: usize = 200;

// ============================================================================
// Error Types
// ============================================================================

/// Errors surfaced by the request pipeline.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No access token in the store; the endpoint requires one. Detected
    /// before any network traffic.
    #[error("Not logged in")]
    Unauthenticated,
    /// The access token was rejected and could not be refreshed. The stored
    /// session has been cleared; the caller must prompt for a fresh login.
    #[error("Session expired, please log in again")]
    AuthenticationExpired,
    /// Any HTTP error other than the recoverable 401. `detail` carries the
    /// backend's `{"detail": ...}` message when one was sent.
    #[error("Request failed with status {status}: {detail}")]
    RequestFailed { status: u16, detail: String },
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the configured transport timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response body was not the JSON shape the endpoint promises
    #[error("Malformed response: {0}")]
    InvalidResponse(String),
    /// A request path could not be joined onto the base URL
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
    /// The session could not be written to the credentials file
    #[error("Failed to persist session: {0}")]
    Store(#[from] crate::auth::StoreError),
}

/// Failure modes of the refresh exchange. Always converted to
/// [`ApiError::AuthenticationExpired`] by the request pipeline; exposed
/// separately so the flow is testable on its own.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// No refresh token stored; no network call was made.
    #[error("No refresh token stored")]
    NoRefreshToken,
    /// The refresh endpoint rejected the exchange. The store is unmodified.
    #[error("Token refresh rejected: {0}")]
    RefreshRejected(String),
}

/// Which round of the 401-recovery loop a request is in. The replayed
/// attempt never refreshes again, so the loop is structurally bounded at
/// two iterations even if the backend answers 401 forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Fresh,
    Retried,
}

/// Whether an endpoint demands a bearer token up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthMode {
    Required,
    Public,
}

// ============================================================================
// ApiClient
// ============================================================================

/// Shared HTTP client for the news aggregation backend.
///
/// Cheap to clone-by-reference: endpoint wrappers and the subscription
/// reconciler all borrow one instance, and concurrent in-flight requests
/// are fine (`reqwest::Client` is internally pooled, the token store is
/// internally locked).
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    store: Arc<TokenStore>,
}

impl ApiClient {
    /// Build a client from configuration and a token store.
    ///
    /// The transport timeout comes from `config.timeout_secs` and applies
    /// to every request including the refresh exchange.
    pub fn new(config: &Config, store: Arc<TokenStore>) -> Result<Self> {
        let base_url = Url::parse(&config.api_base_url)
            .with_context(|| format!("Invalid API base URL '{}'", config.api_base_url))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            store,
        })
    }

    /// The token store this client reads and (on refresh/expiry) mutates.
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Issue an authenticated request.
    ///
    /// Fails fast with [`ApiError::Unauthenticated`] when no access token is
    /// stored. On HTTP 401, refreshes once and replays once; see the module
    /// docs for the exact recovery contract.
    pub async fn send_authed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let Some(token) = self.store.access_token() else {
            return Err(ApiError::Unauthenticated);
        };
        self.send_inner(method, path, body, AuthMode::Required, Some(token))
            .await
    }

    /// Issue a request to an endpoint that does not require authentication
    /// (login, signup, the refresh exchange itself, account recovery, and
    /// the general news feed).
    pub async fn send_public<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        self.send_inner(method, path, body, AuthMode::Public, None)
            .await
    }

    async fn send_inner<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        auth: AuthMode,
        mut token: Option<SecretString>,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        let mut attempt = Attempt::Fresh;

        loop {
            let (status, bytes) = self
                .execute(method.clone(), url.clone(), body.as_ref(), token.as_ref())
                .await?;

            // The one recovery path: first 401 on an authenticated call.
            if status == StatusCode::UNAUTHORIZED
                && auth == AuthMode::Required
                && attempt == Attempt::Fresh
            {
                tracing::debug!(path = %path, "Access token rejected, attempting refresh");
                match self.refresh_access_token().await {
                    Ok(new_token) => {
                        token = Some(new_token);
                        attempt = Attempt::Retried;
                        continue;
                    }
                    Err(e) => {
                        tracing::info!(error = %e, "Token refresh failed, clearing stored session");
                        if let Err(clear_err) = self.store.clear() {
                            tracing::warn!(error = %clear_err, "Failed to remove stored credentials");
                        }
                        return Err(ApiError::AuthenticationExpired);
                    }
                }
            }

            if !status.is_success() {
                return Err(ApiError::RequestFailed {
                    status: status.as_u16(),
                    detail: error_detail(&bytes),
                });
            }

            return serde_json::from_slice(&bytes)
                .map_err(|e| ApiError::InvalidResponse(e.to_string()));
        }
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// On success the new token is persisted to the store and returned. On
    /// any failure the store is left untouched — deciding what an
    /// irrecoverable failure means (wipe the session) is the request
    /// pipeline's job, not this function's.
    pub async fn refresh_access_token(&self) -> Result<SecretString, RefreshError> {
        let Some(refresh) = self.store.refresh_token() else {
            return Err(RefreshError::NoRefreshToken);
        };

        let url = self
            .endpoint("/refresh-token")
            .map_err(|e| RefreshError::RefreshRejected(e.to_string()))?;
        let payload = serde_json::json!({ "refreshToken": refresh.expose_secret() });

        let (status, bytes) = self
            .execute(Method::POST, url, Some(&payload), None)
            .await
            .map_err(|e| RefreshError::RefreshRejected(e.to_string()))?;

        if !status.is_success() {
            return Err(RefreshError::RefreshRejected(format!(
                "status {}: {}",
                status.as_u16(),
                error_detail(&bytes)
            )));
        }

        let parsed: RefreshResponse = serde_json::from_slice(&bytes)
            .map_err(|e| RefreshError::RefreshRejected(format!("malformed response: {}", e)))?;
        let new_token = SecretString::from(parsed.access_token);

        self.store
            .set_access_token(new_token.clone())
            .map_err(|e| RefreshError::RefreshRejected(format!("failed to persist token: {}", e)))?;

        tracing::debug!("Access token refreshed");
        Ok(new_token)
    }

    /// One round trip: send the request, read the body within the size cap.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
        token: Option<&SecretString>,
    ) -> Result<(StatusCode, Vec<u8>), ApiError> {
        let mut request = self.http.request(method, url);

        if let Some(token) = token {
            request = request.header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            );
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Network(e)
            }
        })?;

        let status = response.status();
        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        Ok((status, bytes))
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
    }
}

// ============================================================================
// Body Handling
// ============================================================================

/// Pull the human-readable message out of an error body. The backend
/// follows the `{"detail": "..."}` convention; anything else is kept as
/// truncated text so the caller still sees something.
fn error_detail(bytes: &[u8]) -> String {
    #[derive(serde::Deserialize)]
    struct DetailBody {
        detail: String,
    }

    if let Ok(parsed) = serde_json::from_slice::<DetailBody>(bytes) {
        return parsed.detail;
    }

    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "(no response body)".to_string();
    }
    let mut detail: String = trimmed.chars().take(MAX_DETAIL_LEN).collect();
    if detail.len() < trimmed.len() {
        detail.push('…');
    }
    detail
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ApiError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ApiError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

// ============================================================================
// Tests
// ============================================================================
