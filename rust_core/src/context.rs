//! State shared by the poll loop and the command handler.

use crate::live_state::LiveStateTracker;
use crate::models::PersistedState;
use crate::store::StateStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Owned application context.
///
/// `state` is what gets persisted. Commands hold its write lock across
/// mutate + save so the file never lags behind a confirmed reply. `live` is
/// only locked for short synchronous sections and never across an await.
#[derive(Debug)]
pub struct AppContext {
    pub state: RwLock<PersistedState>,
    pub live: Mutex<LiveStateTracker>,
    pub store: StateStore,
}

impl AppContext {
    /// Load persisted state from `store` and wrap it for sharing.
    pub fn load(store: StateStore) -> Arc<Self> {
        let state = store.load();
        Self::with_state(store, state)
    }

    /// Wrap an already loaded state without reading the store.
    pub fn with_state(store: StateStore, state: PersistedState) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(state),
            live: Mutex::new(LiveStateTracker::new()),
            store,
        })
    }

    /// Tracked logins (in set order) and the notification channel, copied out
    /// so a poll cycle does not hold the lock while it talks to Twitch.
    pub async fn snapshot(&self) -> (Vec<String>, Option<String>) {
        let state = self.state.read().await;
        (
            state.tracked_streamers.iter().cloned().collect(),
            state.notification_channel_id.clone(),
        )
    }

    pub async fn notification_channel(&self) -> Option<String> {
        self.state.read().await.notification_channel_id.clone()
    }

    pub async fn is_tracked(&self, login: &str) -> bool {
        self.state.read().await.is_tracked(login)
    }
}
