//! Fixed-interval poll loop.
//!
//! Each cycle walks the tracked streamers one at a time in set order, asks
//! Helix whether they are live, feeds the answer to the [`LiveStateTracker`]
//! and posts a notification on every offline -> live edge. Cycles never
//! overlap: the next tick is only awaited once the current cycle is done.
//!
//! Failures are isolated per streamer. A failed lookup leaves that streamer's
//! recorded state untouched for the cycle, so an error can never look like a
//! transition.
//!
//! [`LiveStateTracker`]: crate::live_state::LiveStateTracker

use crate::clients::twitch::TwitchClient;
use crate::context::AppContext;
use crate::error::UpstreamError;
use crate::models::{LiveNotification, StreamData};
use crate::notifier::Notifier;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Default time between poll cycles (60 seconds)
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// What one cycle did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Streamers queried
    pub checked: usize,
    /// Streamers seen live
    pub live: usize,
    /// Offline -> live edges
    pub transitions: usize,
    /// Notifications delivered
    pub notified: usize,
    /// Streamers whose lookup failed
    pub errors: usize,
    /// Token refreshes triggered by 401s
    pub refreshes: u64,
    /// Cycle skipped because no token could be obtained
    pub skipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamOutcome {
    Offline,
    Live,
    WentLive { notified: bool },
}

pub struct Poller {
    twitch: TwitchClient,
    ctx: Arc<AppContext>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
}

impl Poller {
    pub fn new(
        twitch: TwitchClient,
        ctx: Arc<AppContext>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> Self {
        Self {
            twitch,
            ctx,
            notifier,
            interval,
        }
    }

    /// Poll forever. The first cycle runs immediately.
    pub async fn run(self) {
        info!(
            "Poll loop started (interval: {}s)",
            self.interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.interval);
        // A slow cycle pushes the schedule back instead of bunching cycles up
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let report = self.run_cycle().await;
            if report.skipped {
                continue;
            }
            info!(
                "Poll cycle done: checked={} live={} went_live={} notified={} errors={} refreshes={}",
                report.checked,
                report.live,
                report.transitions,
                report.notified,
                report.errors,
                report.refreshes
            );
        }
    }

    /// Run one full pass over the tracked streamers.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        let credentials = self.twitch.credentials().clone();

        if !credentials.has_token() {
            warn!("No Twitch access token, requesting one before polling");
            if credentials.acquire_token().await.is_err() {
                warn!("Skipping poll cycle: no Twitch access token");
                report.skipped = true;
                return report;
            }
        }

        let (logins, _) = self.ctx.snapshot().await;
        let refreshes_before = credentials.refresh_count();

        for login in &logins {
            report.checked += 1;
            match self.check_streamer(login).await {
                Ok(StreamOutcome::Offline) => {}
                Ok(StreamOutcome::Live) => report.live += 1,
                Ok(StreamOutcome::WentLive { notified }) => {
                    report.live += 1;
                    report.transitions += 1;
                    if notified {
                        report.notified += 1;
                    }
                }
                Err(e) => {
                    report.errors += 1;
                    error!("Error checking {}: {}", login, e);
                }
            }
        }

        report.refreshes = credentials.refresh_count() - refreshes_before;

        // Streamers removed while the cycle was running may have been
        // observed again after their entry was pruned.
        let state = self.ctx.state.read().await;
        self.ctx.live.lock().retain(|login| state.is_tracked(login));

        report
    }

    async fn check_streamer(&self, login: &str) -> Result<StreamOutcome, UpstreamError> {
        let stream = self.twitch.stream_status(login).await?;
        let is_live = stream.as_ref().map(StreamData::is_live).unwrap_or(false);

        let transition = self.ctx.live.lock().observe(login, is_live);
        debug!("{} live={} transition={}", login, is_live, transition.is_some());

        match (transition, stream) {
            (Some(_), Some(stream)) => {
                let notified = self.announce(login, stream).await;
                Ok(StreamOutcome::WentLive { notified })
            }
            _ if is_live => Ok(StreamOutcome::Live),
            _ => Ok(StreamOutcome::Offline),
        }
    }

    /// Look up the streamer's profile and hand off to the notifier.
    /// Returns whether a message was delivered.
    async fn announce(&self, login: &str, stream: StreamData) -> bool {
        let Some(channel_id) = self.ctx.notification_channel().await else {
            info!("{} went live but no notification channel is set", login);
            return false;
        };

        let user = match self.twitch.user_info(login).await {
            Ok(user) => user,
            Err(e) => {
                warn!("Error getting streamer info for {}: {}", login, e);
                None
            }
        };

        let notification = LiveNotification {
            login: login.to_string(),
            stream,
            user,
            detected_at: Utc::now(),
        };

        match self.notifier.notify(&channel_id, &notification).await {
            Ok(()) => {
                info!(
                    "Sent live notification for {} to channel {}",
                    login, channel_id
                );
                true
            }
            Err(e) => {
                error!("Failed to send live notification for {}: {:#}", login, e);
                false
            }
        }
    }
}
