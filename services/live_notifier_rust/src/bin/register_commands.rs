//! One-shot registration of the bot's global slash commands.

use anyhow::{Context, Result};
use dotenv::dotenv;
use live_notifier_rust::config::{DiscordSettings, DEFAULT_HTTP_TIMEOUT_SECS};
use live_notifier_rust::discord::{command_definitions, DiscordClient};
use log::info;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let settings = DiscordSettings::from_env().context("Invalid configuration")?;
    let client = DiscordClient::new(&settings, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))?;

    let commands = command_definitions();
    info!(
        "Registering {} command(s) for application {}",
        commands.len(),
        settings.app_id
    );
    let registered = client
        .register_commands(&settings.app_id, &commands)
        .await
        .context("Failed to register commands")?;

    info!("Registered: {}", registered.join(", "));
    Ok(())
}
