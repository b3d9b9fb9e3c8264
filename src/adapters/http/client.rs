//! Authenticated HTTP transport for the document-automation backend.
//!
//! Attaches the persisted bearer token to every call, performs a one-shot
//! token refresh on 401 before retrying the original request once, and maps
//! transport/status failures into the `ApiError` taxonomy.

use crate::adapters::persistence::TokenStore;
use crate::domain::ApiError;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// URL builder for the backend API groups.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn documents(&self) -> String {
        format!("{}/documents/", self.base)
    }

    pub fn document(&self, id: &str) -> String {
        format!("{}/documents/{}/", self.base, id)
    }

    pub fn upload(&self) -> String {
        format!("{}/documents/upload/", self.base)
    }

    pub fn preview(&self, id: &str) -> String {
        format!("{}/documents/{}/preview/", self.base, id)
    }

    pub fn download(&self, id: &str) -> String {
        format!("{}/documents/{}/download/", self.base, id)
    }

    pub fn analyze(&self) -> String {
        format!("{}/nlp/analyze/", self.base)
    }

    pub fn chat_messages(&self) -> String {
        format!("{}/chat/messages/", self.base)
    }

    pub fn chat_history(&self, document_id: &str) -> String {
        format!("{}/chat/history/{}/", self.base, document_id)
    }

    pub fn token(&self) -> String {
        format!("{}/token/", self.base)
    }

    pub fn token_refresh(&self) -> String {
        format!("{}/token/refresh/", self.base)
    }
}

#[derive(Deserialize)]
struct TokenPairResponse {
    access: String,
    refresh: String,
}

#[derive(Deserialize)]
struct TokenRefreshResponse {
    access: String,
}

/// Shared transport client. Cloned into each resource gateway via `Arc`.
pub struct HttpClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    tokens: Arc<TokenStore>,
    upload_timeout: Duration,
}

impl HttpClient {
    pub fn new(
        base_url: &str,
        tokens: Arc<TokenStore>,
        request_timeout: Duration,
        upload_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoints: Endpoints::new(base_url),
            tokens,
            upload_timeout,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Ceiling for multipart uploads; larger than the default request
    /// timeout. Applied per request by the documents gateway.
    pub fn upload_timeout(&self) -> Duration {
        self.upload_timeout
    }

    /// Obtain and persist a token pair for `username`.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.endpoints.token())
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(classify_transport)?;
        let response = check_status(response).await?;

        let pair: TokenPairResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Auth(format!("malformed token response: {e}")))?;
        self.tokens
            .store(&pair.access, &pair.refresh)
            .await
            .map_err(|e| ApiError::Auth(format!("failed to persist credentials: {e}")))?;
        info!(username, "logged in");
        Ok(())
    }

    /// Send an authorized request built by `build`. On 401 the access token
    /// is refreshed once and the request is rebuilt and retried; a second
    /// 401 surfaces as a session-level auth error.
    pub async fn execute<F>(&self, build: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let response = self.send_authorized(&build).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        debug!("credential rejected, attempting one-shot token refresh");
        self.refresh_access_token().await?;

        let retried = self.send_authorized(&build).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            self.tokens.clear().await;
            return Err(ApiError::Auth(
                "session expired, please log in again".into(),
            ));
        }
        check_status(retried).await
    }

    async fn send_authorized<F>(&self, build: &F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut request = build(&self.http);
        if let Some(token) = self.tokens.access_token().await {
            request = request.bearer_auth(token);
        }
        request.send().await.map_err(classify_transport)
    }

    async fn refresh_access_token(&self) -> Result<(), ApiError> {
        let Some(refresh) = self.tokens.refresh_token().await else {
            return Err(ApiError::Auth("no refresh token, please log in".into()));
        };

        let response = self
            .http
            .post(self.endpoints.token_refresh())
            .json(&serde_json::json!({ "refresh": refresh }))
            .send()
            .await
            .map_err(classify_transport)?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "token refresh rejected");
            self.tokens.clear().await;
            return Err(ApiError::Auth(
                "session expired, please log in again".into(),
            ));
        }

        let refreshed: TokenRefreshResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Auth(format!("malformed refresh response: {e}")))?;
        self.tokens
            .set_access(&refreshed.access)
            .await
            .map_err(|e| ApiError::Auth(format!("failed to persist credentials: {e}")))?;
        debug!("access token refreshed");
        Ok(())
    }
}

/// Transport-level failures (connect, timeout, TLS) — no response was
/// received, so they are all retryable network errors.
fn classify_transport(error: reqwest::Error) -> ApiError {
    ApiError::Network(error.to_string())
}

/// Map a non-success status into the error taxonomy, consuming the body as
/// the human-readable message (truncated).
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(200).collect();
    Err(classify_status(status.as_u16(), message))
}

pub fn classify_status(status: u16, message: String) -> ApiError {
    match status {
        401 => ApiError::Auth(message),
        404 => ApiError::NotFound(message),
        409 => ApiError::Conflict(message),
        500..=599 => ApiError::ServerFault { status, message },
        _ => ApiError::Validation { status, message },
    }
}
