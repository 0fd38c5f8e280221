//! Last observed liveness per streamer.
//!
//! This is the whole notification-suppression rule: an event is produced only
//! on the offline -> live edge, so one continuous broadcast yields exactly one
//! notification and a streamer has to be seen offline before they can trigger
//! another one. Nothing here is persisted; after a restart every streamer
//! starts out as offline.

use std::collections::HashMap;

/// Offline -> live edge for one streamer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveTransition {
    pub login: String,
}

#[derive(Debug, Default)]
pub struct LiveStateTracker {
    live: HashMap<String, bool>,
}

impl LiveStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest observation and report whether it is a go-live edge.
    ///
    /// Unseen streamers count as offline.
    pub fn observe(&mut self, login: &str, is_live_now: bool) -> Option<LiveTransition> {
        let was_live = self
            .live
            .insert(login.to_string(), is_live_now)
            .unwrap_or(false);

        if is_live_now && !was_live {
            Some(LiveTransition {
                login: login.to_string(),
            })
        } else {
            None
        }
    }

    pub fn is_live(&self, login: &str) -> bool {
        self.live.get(login).copied().unwrap_or(false)
    }

    /// Whether the streamer has been observed at least once.
    pub fn has_seen(&self, login: &str) -> bool {
        self.live.contains_key(login)
    }

    pub fn forget(&mut self, login: &str) {
        self.live.remove(login);
    }

    /// Drop every entry `keep` rejects.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.live.retain(|login, _| keep(login));
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
