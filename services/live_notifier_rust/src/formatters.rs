use serde::Serialize;
use streamwatch_core::models::LiveNotification;

/// Twitch brand purple
pub const TWITCH_PURPLE: u32 = 0x9146FF;

pub const THUMBNAIL_WIDTH: u32 = 1280;
pub const THUMBNAIL_HEIGHT: u32 = 720;

// Discord embed limits
const MAX_TITLE_LEN: usize = 256;
const MAX_FIELD_VALUE_LEN: usize = 1024;

const NO_TITLE: &str = "No title";
const NO_GAME: &str = "No game set";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
    pub timestamp: String,
}

pub fn live_embed(notification: &LiveNotification) -> Embed {
    let stream = &notification.stream;

    let image = if stream.thumbnail_url.is_empty() {
        None
    } else {
        Some(EmbedImage {
            url: stream.thumbnail_at(THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT),
        })
    };

    Embed {
        title: truncate(
            &format!("{} is now live on Twitch!", notification.display_name()),
            MAX_TITLE_LEN,
        ),
        url: notification.channel_url(),
        color: TWITCH_PURPLE,
        thumbnail: notification.avatar_url().map(|url| EmbedImage {
            url: url.to_string(),
        }),
        fields: vec![
            field("Title", &stream.title, NO_TITLE),
            field("Game", &stream.game_name, NO_GAME),
        ],
        image,
        timestamp: notification.detected_at.to_rfc3339(),
    }
}

fn field(name: &str, value: &str, placeholder: &str) -> EmbedField {
    let value = value.trim();
    EmbedField {
        name: name.to_string(),
        value: if value.is_empty() {
            placeholder.to_string()
        } else {
            truncate(value, MAX_FIELD_VALUE_LEN)
        },
        inline: true,
    }
}

/// Cut to at most `max` characters, marking the cut with an ellipsis.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
