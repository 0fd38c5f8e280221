use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use streamwatch_core::commands::{ADD_STREAMER, REMOVE_STREAMER, SET_CHANNEL};
use streamwatch_core::models::LiveNotification;
use streamwatch_core::notifier::Notifier;

use crate::config::DiscordSettings;
use crate::formatters::{live_embed, Embed};

/// Option name carrying the target channel of `/setchannel`.
pub const CHANNEL_OPTION: &str = "channel";
/// Option name carrying the Twitch login of `/addstreamer` and `/removestreamer`.
pub const USERNAME_OPTION: &str = "username";

// Application command option types
const OPTION_STRING: u8 = 3;
const OPTION_CHANNEL: u8 = 7;

// ============================================================================
// Slash command definitions
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommandOptionSpec {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "type")]
    pub kind: u8,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub options: Vec<CommandOptionSpec>,
}

pub fn command_definitions() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: SET_CHANNEL,
            description: "Set the notification channel",
            options: vec![CommandOptionSpec {
                name: CHANNEL_OPTION,
                description: "The channel to send notifications to",
                kind: OPTION_CHANNEL,
                required: true,
            }],
        },
        CommandSpec {
            name: ADD_STREAMER,
            description: "Add a Twitch streamer to track",
            options: vec![CommandOptionSpec {
                name: USERNAME_OPTION,
                description: "Twitch username to track",
                kind: OPTION_STRING,
                required: true,
            }],
        },
        CommandSpec {
            name: REMOVE_STREAMER,
            description: "Remove a tracked Twitch streamer",
            options: vec![CommandOptionSpec {
                name: USERNAME_OPTION,
                description: "Twitch username to stop tracking",
                kind: OPTION_STRING,
                required: true,
            }],
        },
    ]
}

// ============================================================================
// REST client
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    embeds: &'a [Embed],
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegisteredCommand {
    name: String,
}

#[derive(Clone)]
pub struct DiscordClient {
    http: Client,
    base_url: String,
    bot_token: String,
}

impl std::fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl DiscordClient {
    pub fn new(settings: &DiscordSettings, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for Discord")?;
        Ok(Self {
            http,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            bot_token: settings.bot_token.clone(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    pub async fn send_embed(&self, channel_id: &str, embed: &Embed) -> Result<()> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel_id);
        let body = CreateMessage {
            embeds: std::slice::from_ref(embed),
        };

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Discord API request failed: {url}"))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Discord API non-2xx: {status} body={text}");
        }
        Ok(())
    }

    /// Look up a channel the bot can see. Used to check the saved channel at startup.
    pub async fn fetch_channel(&self, channel_id: &str) -> Result<ChannelInfo> {
        let url = format!("{}/channels/{}", self.base_url, channel_id);
        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .with_context(|| format!("Discord API request failed: {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Discord API non-2xx: {status} body={text}");
        }
        resp.json::<ChannelInfo>()
            .await
            .context("Failed to parse Discord channel")
    }

    /// Overwrite the application's global slash commands. Returns the names
    /// Discord acknowledged.
    pub async fn register_commands(
        &self,
        app_id: &str,
        commands: &[CommandSpec],
    ) -> Result<Vec<String>> {
        let url = format!("{}/applications/{}/commands", self.base_url, app_id);
        let resp = self
            .http
            .put(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(commands)
            .send()
            .await
            .with_context(|| format!("Discord API request failed: {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Discord API non-2xx: {status} body={text}");
        }
        let registered: Vec<RegisteredCommand> = resp
            .json()
            .await
            .context("Failed to parse registered commands")?;
        Ok(registered.into_iter().map(|c| c.name).collect())
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Posts go-live embeds through the bot account.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: DiscordClient,
}

impl DiscordNotifier {
    pub fn new(client: DiscordClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, channel_id: &str, notification: &LiveNotification) -> Result<()> {
        let embed = live_embed(notification);
        self.client.send_embed(channel_id, &embed).await
    }
}
