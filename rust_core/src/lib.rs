//! Streamwatch Core - Twitch go-live detection and tracked-streamer storage.
//!
//! This crate provides:
//! - Twitch Helix client with reactive bearer-token refresh
//! - Offline -> live transition detection per streamer
//! - File-backed JSON store for tracked streamers and the notification channel
//! - Fixed-interval poll loop that notifies on every go-live edge
//! - Chat command handling (set channel, add/remove streamer)

pub mod clients;
pub mod commands;
pub mod context;
pub mod credentials;
pub mod error;
pub mod live_state;
pub mod models;
pub mod notifier;
pub mod poller;
pub mod store;

pub use commands::{Command, CommandHandler};
pub use context::AppContext;
pub use credentials::{AccessToken, CredentialManager, TokenEndpoint};
pub use error::{AuthError, CommandError, StoreError, UpstreamError};
pub use live_state::{LiveStateTracker, LiveTransition};
pub use models::{LiveNotification, PersistedState, StreamData, UserData};
pub use notifier::Notifier;
pub use poller::{CycleReport, Poller, DEFAULT_CHECK_INTERVAL};
pub use store::StateStore;
