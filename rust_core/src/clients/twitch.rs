//! Twitch Helix API client with reactive token refresh.
//!
//! Three layers:
//! - [`TwitchOAuth`]: client-credentials token exchange
//! - [`HelixApi`] / [`HelixHttpApi`]: raw `/streams` and `/users` calls
//! - [`TwitchClient`]: wraps every Helix call and asks the
//!   [`CredentialManager`] for a new token whenever Helix answers 401

use crate::credentials::{AccessToken, CredentialManager, TokenEndpoint};
use crate::error::{AuthError, UpstreamError};
use crate::models::{StreamData, UserData};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const HELIX_API_BASE: &str = "https://api.twitch.tv/helix";
pub const TWITCH_AUTH_BASE: &str = "https://id.twitch.tv";

/// Default per-request timeout for Twitch calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent("streamwatch/0.1")
        .build()
        .context("Failed to create HTTP client for Twitch")
}

// ============================================================================
// Token exchange
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// `POST /oauth2/token` with `grant_type=client_credentials`.
#[derive(Clone)]
pub struct TwitchOAuth {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl std::fmt::Debug for TwitchOAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchOAuth")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl TwitchOAuth {
    pub fn new(
        auth_base_url: &str,
        client_id: String,
        client_secret: String,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            token_url: format!("{}/oauth2/token", auth_base_url.trim_end_matches('/')),
            client_id,
            client_secret,
        })
    }
}

#[async_trait]
impl TokenEndpoint for TwitchOAuth {
    async fn exchange(&self) -> Result<AccessToken, AuthError> {
        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::Malformed(e.to_string()))?;
        if let Some(expires_in) = token.expires_in {
            debug!("Twitch token expires in {}s", expires_in);
        }
        token
            .access_token
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
            .ok_or(AuthError::MissingToken)
    }
}

// ============================================================================
// Helix
// ============================================================================

/// Helix wraps every list in `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
struct HelixResponse<T> {
    data: Vec<T>,
}

/// Raw Helix lookups. Errors map 401 to [`UpstreamError::Unauthorized`].
#[async_trait]
pub trait HelixApi: Send + Sync {
    async fn get_streams(
        &self,
        login: &str,
        token: &AccessToken,
    ) -> Result<Vec<StreamData>, UpstreamError>;

    async fn get_users(
        &self,
        login: &str,
        token: &AccessToken,
    ) -> Result<Vec<UserData>, UpstreamError>;
}

#[derive(Clone)]
pub struct HelixHttpApi {
    client: Client,
    base_url: String,
    client_id: String,
}

impl std::fmt::Debug for HelixHttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelixHttpApi")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl HelixHttpApi {
    pub fn new(base_url: &str, client_id: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id,
        })
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: (&str, &str),
        token: &AccessToken,
    ) -> Result<Vec<T>, UpstreamError> {
        let url = format!("{}/{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .query(&[query])
            .header("Client-ID", &self.client_id)
            .bearer_auth(token.secret())
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(UpstreamError::Unauthorized);
        }
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_helix_list(&body)
    }
}

fn parse_helix_list<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, UpstreamError> {
    serde_json::from_str::<HelixResponse<T>>(body)
        .map(|r| r.data)
        .map_err(|e| UpstreamError::Malformed(e.to_string()))
}

#[async_trait]
impl HelixApi for HelixHttpApi {
    async fn get_streams(
        &self,
        login: &str,
        token: &AccessToken,
    ) -> Result<Vec<StreamData>, UpstreamError> {
        self.get_list("streams", ("user_login", login), token).await
    }

    async fn get_users(
        &self,
        login: &str,
        token: &AccessToken,
    ) -> Result<Vec<UserData>, UpstreamError> {
        self.get_list("users", ("login", login), token).await
    }
}

// ============================================================================
// Refreshing wrapper
// ============================================================================

/// Helix access for the poll loop. Every call that comes back 401 triggers
/// exactly one token refresh before the error is returned.
#[derive(Clone)]
pub struct TwitchClient {
    api: Arc<dyn HelixApi>,
    credentials: Arc<CredentialManager>,
}

impl std::fmt::Debug for TwitchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchClient")
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl TwitchClient {
    pub fn new(api: Arc<dyn HelixApi>, credentials: Arc<CredentialManager>) -> Self {
        Self { api, credentials }
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    /// Current stream for `login`, `None` when offline.
    pub async fn stream_status(&self, login: &str) -> Result<Option<StreamData>, UpstreamError> {
        let token = self.token()?;
        let result = self.api.get_streams(login, &token).await;
        self.refresh_if_unauthorized(result)
            .await
            .map(|streams| streams.into_iter().next())
    }

    /// Profile for `login`, `None` when Twitch does not know the user.
    pub async fn user_info(&self, login: &str) -> Result<Option<UserData>, UpstreamError> {
        let token = self.token()?;
        let result = self.api.get_users(login, &token).await;
        self.refresh_if_unauthorized(result)
            .await
            .map(|users| users.into_iter().next())
    }

    fn token(&self) -> Result<AccessToken, UpstreamError> {
        self.credentials.current_token().ok_or(UpstreamError::NoToken)
    }

    async fn refresh_if_unauthorized<T>(
        &self,
        result: Result<T, UpstreamError>,
    ) -> Result<T, UpstreamError> {
        if let Err(UpstreamError::Unauthorized) = &result {
            // Failure is logged by the credential manager; the caller still
            // sees the 401 for this call.
            let _ = self.credentials.refresh_on_unauthorized().await;
        }
        result
    }
}
