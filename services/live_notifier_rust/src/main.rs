use anyhow::{Context, Result};
use dotenv::dotenv;
use live_notifier_rust::config::Config;
use live_notifier_rust::discord::{DiscordClient, DiscordNotifier};
use live_notifier_rust::interactions::{self, InteractionState, SignatureVerifier};
use std::sync::Arc;
use streamwatch_core::clients::{HelixHttpApi, TwitchClient, TwitchOAuth};
use streamwatch_core::{AppContext, CredentialManager, Poller, StateStore};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Live Notifier Service...");

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        "Config: data_file={} interval={}s timeout={}s bind={}",
        config.data_file.display(),
        config.check_interval.as_secs(),
        config.http_timeout.as_secs(),
        config.bind_addr
    );

    // Persisted state
    let ctx = AppContext::load(StateStore::new(&config.data_file));
    {
        let (tracked, channel) = ctx.snapshot().await;
        info!(
            "Loaded {} tracked streamer(s), notification channel: {}",
            tracked.len(),
            channel.as_deref().unwrap_or("not set")
        );
    }

    // Discord
    let discord = DiscordClient::new(&config.discord, config.http_timeout)?;
    if let Some(channel_id) = ctx.notification_channel().await {
        match discord.fetch_channel(&channel_id).await {
            Ok(channel) => info!(
                "Notification channel #{} ({}) is reachable",
                channel.name.unwrap_or_default(),
                channel.id
            ),
            Err(e) => warn!("Notification channel {} is not reachable: {:#}", channel_id, e),
        }
    }

    // Twitch
    let oauth = TwitchOAuth::new(
        &config.twitch_auth_base_url,
        config.twitch_client_id.clone(),
        config.twitch_client_secret.clone(),
        config.http_timeout,
    )?;
    let credentials = Arc::new(CredentialManager::new(Arc::new(oauth)));
    if credentials.acquire_token().await.is_err() {
        warn!("Starting without a Twitch token, the poll loop will retry");
    }
    let helix = HelixHttpApi::new(
        &config.twitch_api_base_url,
        config.twitch_client_id.clone(),
        config.http_timeout,
    )?;
    let twitch = TwitchClient::new(Arc::new(helix), credentials);

    // Poll loop
    let notifier = Arc::new(DiscordNotifier::new(discord));
    let poller = Poller::new(twitch, ctx.clone(), notifier, config.check_interval);
    let poll_task = tokio::spawn(poller.run());

    // Interactions endpoint
    let state = InteractionState::new(
        ctx.clone(),
        SignatureVerifier::new(config.discord_public_key),
    );
    let app = interactions::router(state);
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening for Discord interactions on {}", config.bind_addr);

    tokio::select! {
        res = axum::serve(listener, app) => {
            res.context("Interactions server failed")?;
        }
        res = poll_task => {
            error!("Poll loop exited unexpectedly: {:?}", res);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
