use anyhow::{anyhow, Context, Result};
use ed25519_dalek::VerifyingKey;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use streamwatch_core::clients::twitch::{HELIX_API_BASE, TWITCH_AUTH_BASE};
use streamwatch_core::store::DEFAULT_DATA_FILE;

pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Bot credentials and endpoint, shared by the service and command registration.
#[derive(Clone)]
pub struct DiscordSettings {
    pub bot_token: String,
    pub app_id: String,
    pub api_base_url: String,
}

impl std::fmt::Debug for DiscordSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordSettings")
            .field("app_id", &self.app_id)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl DiscordSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            bot_token: required(&lookup, "DISCORD_TOKEN")?,
            app_id: required(&lookup, "DISCORD_APP_ID")?,
            api_base_url: optional(&lookup, "DISCORD_API_BASE_URL", DEFAULT_DISCORD_API_BASE),
        })
    }
}

#[derive(Clone)]
pub struct Config {
    pub discord: DiscordSettings,
    pub discord_public_key: VerifyingKey,

    pub twitch_client_id: String,
    pub twitch_client_secret: String,
    pub twitch_api_base_url: String,
    pub twitch_auth_base_url: String,

    pub data_file: PathBuf,
    pub check_interval: Duration,
    pub http_timeout: Duration,
    pub bind_addr: SocketAddr,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord", &self.discord)
            .field("twitch_client_id", &self.twitch_client_id)
            .field("twitch_api_base_url", &self.twitch_api_base_url)
            .field("twitch_auth_base_url", &self.twitch_auth_base_url)
            .field("data_file", &self.data_file)
            .field("check_interval", &self.check_interval)
            .field("http_timeout", &self.http_timeout)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let discord = DiscordSettings::from_lookup(&lookup)?;
        let discord_public_key = parse_public_key(&required(&lookup, "DISCORD_PUBLIC_KEY")?)
            .context("DISCORD_PUBLIC_KEY")?;

        let twitch_client_id = required(&lookup, "TWITCH_CLIENT_ID")?;
        let twitch_client_secret = required(&lookup, "TWITCH_CLIENT_SECRET")?;
        let twitch_api_base_url = optional(&lookup, "TWITCH_API_BASE_URL", HELIX_API_BASE);
        let twitch_auth_base_url = optional(&lookup, "TWITCH_AUTH_BASE_URL", TWITCH_AUTH_BASE);

        let data_file = PathBuf::from(optional(&lookup, "DATA_FILE", DEFAULT_DATA_FILE));

        let check_interval_secs =
            parse_u64(&lookup, "CHECK_INTERVAL_SECS", DEFAULT_CHECK_INTERVAL_SECS)?;
        if check_interval_secs == 0 {
            return Err(anyhow!("CHECK_INTERVAL_SECS must be at least 1"));
        }
        let http_timeout_secs = parse_u64(&lookup, "HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        if http_timeout_secs == 0 {
            return Err(anyhow!("HTTP_TIMEOUT_SECS must be at least 1"));
        }

        let bind_raw = optional(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid BIND_ADDR: {bind_raw} (expected host:port)"))?;

        Ok(Self {
            discord,
            discord_public_key,
            twitch_client_id,
            twitch_client_secret,
            twitch_api_base_url,
            twitch_auth_base_url,
            data_file,
            check_interval: Duration::from_secs(check_interval_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
            bind_addr,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("{key} must be set"))
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    let raw = optional(lookup, key, &default.to_string());
    raw.parse::<u64>()
        .with_context(|| format!("Invalid {key}: {raw} (expected integer)"))
}

/// Application public key as shown in the Discord developer portal (hex).
pub fn parse_public_key(raw: &str) -> Result<VerifyingKey> {
    let bytes = hex::decode(raw.trim()).context("expected a hex string")?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow!("expected 32 bytes, got {}", b.len()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| anyhow!("not a valid Ed25519 key: {e}"))
}
