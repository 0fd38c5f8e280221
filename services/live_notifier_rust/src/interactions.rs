//! HTTP endpoint Discord delivers slash commands to.
//!
//! Every request is signed by Discord with the application's Ed25519 key
//! over `timestamp || body`. Unsigned or badly signed requests get 401
//! before the body is looked at.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use streamwatch_core::commands::{Command, CommandHandler, SET_CHANNEL};
use streamwatch_core::context::AppContext;
use tracing::{debug, info, warn};

use crate::discord::{CHANNEL_OPTION, USERNAME_OPTION};

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

// Interaction types
const PING: u8 = 1;
const APPLICATION_COMMAND: u8 = 2;

// Interaction callback types
const PONG: u8 = 1;
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;

// ============================================================================
// Signature verification
// ============================================================================

#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Check a hex signature over `timestamp` followed by the raw body.
    pub fn verify(&self, timestamp: &str, body: &[u8], signature_hex: &str) -> bool {
        let Ok(raw) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(raw): Result<[u8; 64], _> = raw.try_into() else {
            return false;
        };
        let signature = Signature::from_bytes(&raw);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);
        self.key.verify(&message, &signature).is_ok()
    }
}

// ============================================================================
// Payload
// ============================================================================

#[derive(Debug, Deserialize)]
struct Interaction {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    data: Option<InteractionData>,
    /// Present for guild invocations
    #[serde(default)]
    member: Option<Member>,
    /// Present for DM invocations
    #[serde(default)]
    user: Option<DiscordUser>,
}

#[derive(Debug, Deserialize)]
struct InteractionData {
    name: String,
    #[serde(default)]
    options: Vec<InteractionOption>,
}

#[derive(Debug, Deserialize)]
struct InteractionOption {
    name: String,
    #[serde(default)]
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Member {
    #[serde(default)]
    user: Option<DiscordUser>,
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    username: String,
}

impl Interaction {
    fn invoked_by(&self) -> &str {
        self.member
            .as_ref()
            .and_then(|m| m.user.as_ref())
            .or(self.user.as_ref())
            .map(|u| u.username.as_str())
            .unwrap_or("unknown")
    }
}

impl InteractionData {
    fn option(&self, name: &str) -> Option<String> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.value.as_ref())
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn argument(&self) -> Option<String> {
        match self.name.as_str() {
            SET_CHANNEL => self.option(CHANNEL_OPTION),
            _ => self.option(USERNAME_OPTION),
        }
    }
}

// ============================================================================
// Router
// ============================================================================

struct Inner {
    ctx: Arc<AppContext>,
    handler: CommandHandler,
    verifier: SignatureVerifier,
}

#[derive(Clone)]
pub struct InteractionState {
    inner: Arc<Inner>,
}

impl InteractionState {
    pub fn new(ctx: Arc<AppContext>, verifier: SignatureVerifier) -> Self {
        Self {
            inner: Arc::new(Inner {
                handler: CommandHandler::new(ctx.clone()),
                ctx,
                verifier,
            }),
        }
    }

    /// Verify, decode and answer one interaction request.
    pub async fn handle(&self, headers: &HeaderMap, body: &[u8]) -> (StatusCode, Value) {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let (Some(signature), Some(timestamp)) = (header(SIGNATURE_HEADER), header(TIMESTAMP_HEADER))
        else {
            warn!("Interaction without signature headers");
            return (StatusCode::UNAUTHORIZED, json!({"error": "missing signature"}));
        };
        if !self.inner.verifier.verify(timestamp, body, signature) {
            warn!("Interaction with invalid signature");
            return (StatusCode::UNAUTHORIZED, json!({"error": "invalid request signature"}));
        }

        let interaction: Interaction = match serde_json::from_slice(body) {
            Ok(i) => i,
            Err(e) => {
                warn!("Malformed interaction payload: {}", e);
                return (StatusCode::BAD_REQUEST, json!({"error": "malformed interaction"}));
            }
        };

        match (interaction.kind, interaction.data.as_ref()) {
            (PING, _) => {
                debug!("Interaction ping");
                (StatusCode::OK, json!({"type": PONG}))
            }
            (APPLICATION_COMMAND, Some(data)) => {
                let reply = self.run_command(&interaction, data).await;
                (
                    StatusCode::OK,
                    json!({"type": CHANNEL_MESSAGE_WITH_SOURCE, "data": {"content": reply}}),
                )
            }
            (kind, _) => {
                warn!("Unsupported interaction type {}", kind);
                (StatusCode::BAD_REQUEST, json!({"error": "unsupported interaction type"}))
            }
        }
    }

    async fn run_command(&self, interaction: &Interaction, data: &InteractionData) -> String {
        let invoked_by = interaction.invoked_by();
        info!("/{} from {}", data.name, invoked_by);
        match Command::parse(&data.name, data.argument()) {
            Ok(command) => self.inner.handler.handle(command, invoked_by).await,
            Err(e) => {
                warn!("{}", e);
                e.user_message()
            }
        }
    }

    async fn health(&self) -> Value {
        let (tracked, channel) = self.inner.ctx.snapshot().await;
        let live = tracked
            .iter()
            .filter(|login| self.inner.ctx.live.lock().is_live(login))
            .count();
        json!({
            "service": "live_notifier",
            "status": "healthy",
            "tracked_streamers": tracked.len(),
            "live_streamers": live,
            "notification_channel_set": channel.is_some(),
            "timestamp": Utc::now().to_rfc3339(),
        })
    }
}

pub fn router(state: InteractionState) -> Router {
    Router::new()
        .route("/interactions", post(interactions))
        .route("/health", get(health))
        .with_state(state)
}

async fn interactions(
    State(state): State<InteractionState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let (status, body) = state.handle(&headers, &body).await;
    (status, Json(body))
}

async fn health(State(state): State<InteractionState>) -> Json<Value> {
    Json(state.health().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use std::path::PathBuf;
    use streamwatch_core::models::PersistedState;
    use streamwatch_core::store::StateStore;

    const TIMESTAMP: &str = "1700000000";

    struct Fixture {
        signing: SigningKey,
        state: InteractionState,
        ctx: Arc<AppContext>,
        path: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let path = std::env::temp_dir()
                .join(format!("live-notifier-{}", uuid::Uuid::new_v4()))
                .join("data.json");
            let ctx = AppContext::with_state(
                StateStore::new(&path),
                PersistedState::default(),
            );
            let signing = SigningKey::from_bytes(&[9u8; 32]);
            let state =
                InteractionState::new(ctx.clone(), SignatureVerifier::new(signing.verifying_key()));
            Self {
                signing,
                state,
                ctx,
                path,
            }
        }

        fn signed_headers(&self, body: &[u8]) -> HeaderMap {
            let mut message = TIMESTAMP.as_bytes().to_vec();
            message.extend_from_slice(body);
            let signature = hex::encode(self.signing.sign(&message).to_bytes());

            let mut headers = HeaderMap::new();
            headers.insert(SIGNATURE_HEADER, signature.parse().unwrap());
            headers.insert(TIMESTAMP_HEADER, TIMESTAMP.parse().unwrap());
            headers
        }

        async fn send(&self, payload: Value) -> (StatusCode, Value) {
            let body = serde_json::to_vec(&payload).unwrap();
            let headers = self.signed_headers(&body);
            self.state.handle(&headers, &body).await
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            if let Some(dir) = self.path.parent() {
                std::fs::remove_dir_all(dir).ok();
            }
        }
    }

    fn command(name: &str, option: &str, value: &str) -> Value {
        json!({
            "type": 2,
            "data": {"name": name, "options": [{"name": option, "type": 3, "value": value}]},
            "member": {"user": {"id": "1", "username": "moderator"}}
        })
    }

    #[tokio::test]
    async fn test_ping_is_ponged() {
        let f = Fixture::new();
        let (status, body) = f.send(json!({"type": 1})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"type": 1}));
    }

    #[tokio::test]
    async fn test_bad_or_missing_signature_is_rejected() {
        let f = Fixture::new();
        let body = br#"{"type":1}"#;

        let (status, _) = f.state.handle(&HeaderMap::new(), body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Signed for a different body
        let headers = f.signed_headers(br#"{"type":2}"#);
        let (status, _) = f.state.handle(&headers, body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut headers = f.signed_headers(body);
        headers.insert(SIGNATURE_HEADER, "nothex".parse().unwrap());
        let (status, _) = f.state.handle(&headers, body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_add_streamer_command() {
        let f = Fixture::new();
        let (status, body) = f.send(command("addstreamer", "username", "Alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], 4);
        assert_eq!(body["data"]["content"], "Added alice to tracked streamers");
        assert!(f.ctx.is_tracked("alice").await);
    }

    #[tokio::test]
    async fn test_set_channel_command() {
        let f = Fixture::new();
        let (_, body) = f.send(command("setchannel", "channel", "987654321")).await;
        assert_eq!(body["data"]["content"], "Notification channel set to <#987654321>");
        assert_eq!(
            f.ctx.notification_channel().await.as_deref(),
            Some("987654321")
        );
    }

    #[tokio::test]
    async fn test_missing_option_and_unknown_command() {
        let f = Fixture::new();
        let (_, body) = f
            .send(json!({"type": 2, "data": {"name": "removestreamer"}, "user": {"username": "dm"}}))
            .await;
        assert_eq!(body["data"]["content"], "Please provide a username");

        let (status, body) = f.send(command("ban", "username", "alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], 4);
        assert!(f.ctx.state.read().await.tracked_streamers.is_empty());
        assert!(body["data"]["content"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let f = Fixture::new();
        let body = b"not json";
        let headers = f.signed_headers(body);
        let (status, _) = f.state.handle(&headers, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_reports_counts() {
        let f = Fixture::new();
        f.send(command("addstreamer", "username", "alice")).await;
        f.send(command("addstreamer", "username", "bob")).await;
        f.ctx.live.lock().observe("bob", true);

        let health = f.state.health().await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["tracked_streamers"], 2);
        assert_eq!(health["live_streamers"], 1);
        assert_eq!(health["notification_channel_set"], false);
    }
}
