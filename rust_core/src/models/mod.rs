// Shared models for the live notifier
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Persisted state
// ============================================================================

/// Everything that survives a restart.
///
/// On disk this is `{ "trackedStreamers": [...], "notificationChannelId": ... }`.
/// Older files wrote the channel as `notificationChannel`, which is still
/// accepted on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub tracked_streamers: BTreeSet<String>,
    #[serde(default, alias = "notificationChannel")]
    pub notification_channel_id: Option<String>,
}

impl PersistedState {
    /// Lowercase and trim every login, dropping blanks. Applied after load so
    /// hand-edited files cannot introduce duplicates that differ by case.
    pub fn normalized(self) -> Self {
        let tracked_streamers = self
            .tracked_streamers
            .into_iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        let notification_channel_id = self
            .notification_channel_id
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Self {
            tracked_streamers,
            notification_channel_id,
        }
    }

    /// Returns false if the login was already tracked.
    pub fn track(&mut self, login: &str) -> bool {
        self.tracked_streamers.insert(login.to_string())
    }

    /// Returns false if the login was not tracked.
    pub fn untrack(&mut self, login: &str) -> bool {
        self.tracked_streamers.remove(login)
    }

    pub fn is_tracked(&self, login: &str) -> bool {
        self.tracked_streamers.contains(login)
    }
}

// ============================================================================
// Twitch data
// ============================================================================

/// One entry of the Helix `/streams` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamData {
    #[serde(default)]
    pub user_login: String,
    #[serde(default)]
    pub user_name: String,
    /// "live" while broadcasting; Helix sends "" on errors.
    #[serde(rename = "type", default)]
    pub stream_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub game_name: String,
    /// Contains `{width}` and `{height}` placeholders.
    #[serde(default)]
    pub thumbnail_url: String,
}

impl StreamData {
    pub fn is_live(&self) -> bool {
        self.stream_type == "live"
    }

    /// Thumbnail URL with the size placeholders filled in.
    pub fn thumbnail_at(&self, width: u32, height: u32) -> String {
        self.thumbnail_url
            .replace("{width}", &width.to_string())
            .replace("{height}", &height.to_string())
    }
}

/// One entry of the Helix `/users` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub profile_image_url: String,
}

// ============================================================================
// Notifications
// ============================================================================

/// Handed to the notifier when a streamer goes from offline to live.
#[derive(Debug, Clone)]
pub struct LiveNotification {
    pub login: String,
    pub stream: StreamData,
    /// Best effort; `None` if the user lookup failed.
    pub user: Option<UserData>,
    pub detected_at: DateTime<Utc>,
}

impl LiveNotification {
    /// Name to show, preferring what the stream reports.
    pub fn display_name(&self) -> &str {
        if !self.stream.user_name.is_empty() {
            &self.stream.user_name
        } else if let Some(user) = self.user.as_ref().filter(|u| !u.display_name.is_empty()) {
            &user.display_name
        } else {
            &self.login
        }
    }

    pub fn channel_url(&self) -> String {
        format!("https://twitch.tv/{}", self.login)
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|u| u.profile_image_url.as_str())
            .filter(|url| !url.is_empty())
    }
}
