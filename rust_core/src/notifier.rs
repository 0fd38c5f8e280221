//! Delivery of go-live notifications.

use crate::models::LiveNotification;
use anyhow::Result;
use async_trait::async_trait;

/// Posts a go-live message to a chat channel.
///
/// The poll loop only calls this when a channel is configured.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, channel_id: &str, notification: &LiveNotification) -> Result<()>;
}
