//! Bearer token ownership for the Helix API.
//!
//! The token is fetched once at startup and then only refreshed reactively:
//! whoever gets a 401 calls [`CredentialManager::refresh_on_unauthorized`].
//! A failed exchange keeps the previous token, so the next call fails again
//! and triggers another refresh.

use crate::error::AuthError;
use async_trait::async_trait;
use log::{error, info, warn};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Bearer token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Something that can exchange client credentials for a token.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn exchange(&self) -> Result<AccessToken, AuthError>;
}

pub struct CredentialManager {
    endpoint: Arc<dyn TokenEndpoint>,
    token: RwLock<Option<AccessToken>>,
    refresh_count: AtomicU64,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("has_token", &self.has_token())
            .field("refresh_count", &self.refresh_count())
            .finish()
    }
}

impl CredentialManager {
    pub fn new(endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            endpoint,
            token: RwLock::new(None),
            refresh_count: AtomicU64::new(0),
        }
    }

    /// Exchange credentials for a fresh token and hold on to it.
    ///
    /// On failure the previously held token, if any, stays in place.
    pub async fn acquire_token(&self) -> Result<AccessToken, AuthError> {
        match self.endpoint.exchange().await {
            Ok(token) => {
                *self.token.write() = Some(token.clone());
                info!("Obtained Twitch access token");
                Ok(token)
            }
            Err(e) => {
                error!("Error getting Twitch token: {}", e);
                Err(e)
            }
        }
    }

    /// Called after an upstream 401. One exchange attempt, no backoff.
    pub async fn refresh_on_unauthorized(&self) -> Result<(), AuthError> {
        let attempt = self.refresh_count.fetch_add(1, Ordering::SeqCst) + 1;
        warn!("Twitch rejected the access token, refreshing (attempt #{})", attempt);
        self.acquire_token().await.map(|_| ())
    }

    pub fn current_token(&self) -> Option<AccessToken> {
        self.token.read().clone()
    }

    pub fn has_token(&self) -> bool {
        self.token.read().is_some()
    }

    /// Number of refreshes triggered by 401s since startup.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::SeqCst)
    }
}
