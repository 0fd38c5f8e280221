//! Chat commands that edit the tracked streamers and notification channel.
//!
//! Every accepted mutation is saved before the reply is produced. If the save
//! fails the in-memory change is rolled back, so memory and disk agree on
//! what the user was told.

use crate::context::AppContext;
use crate::error::CommandError;
use log::{error, info};
use std::sync::Arc;

pub const SET_CHANNEL: &str = "setchannel";
pub const ADD_STREAMER: &str = "addstreamer";
pub const REMOVE_STREAMER: &str = "removestreamer";

/// Twitch logins are at most 25 characters.
const MAX_LOGIN_LEN: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetChannel { channel_id: Option<String> },
    AddStreamer { username: Option<String> },
    RemoveStreamer { username: Option<String> },
}

impl Command {
    /// Build a command from its name and its single (optional) argument.
    pub fn parse(name: &str, argument: Option<String>) -> Result<Self, CommandError> {
        match name {
            SET_CHANNEL => Ok(Command::SetChannel {
                channel_id: argument,
            }),
            ADD_STREAMER => Ok(Command::AddStreamer { username: argument }),
            REMOVE_STREAMER => Ok(Command::RemoveStreamer { username: argument }),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::SetChannel { .. } => SET_CHANNEL,
            Command::AddStreamer { .. } => ADD_STREAMER,
            Command::RemoveStreamer { .. } => REMOVE_STREAMER,
        }
    }
}

/// Trim and lowercase a username, rejecting anything that is not a valid
/// Twitch login.
pub fn normalize_login(raw: Option<&str>) -> Result<String, CommandError> {
    let login = raw
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .ok_or(CommandError::MissingArgument("username"))?;

    let valid = login.len() <= MAX_LOGIN_LEN
        && login
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(CommandError::InvalidUsername(login));
    }
    Ok(login)
}

#[derive(Debug, Clone)]
pub struct CommandHandler {
    ctx: Arc<AppContext>,
}

impl CommandHandler {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Run a command and always produce a reply, turning rejections into
    /// user-facing messages.
    pub async fn handle(&self, command: Command, invoked_by: &str) -> String {
        let name = command.name();
        match self.execute(command, invoked_by).await {
            Ok(reply) => reply,
            Err(e) => {
                match &e {
                    CommandError::Store(_) => {
                        error!("/{} from {} failed: {}", name, invoked_by, e)
                    }
                    _ => info!("/{} from {} rejected: {}", name, invoked_by, e),
                }
                e.user_message()
            }
        }
    }

    pub async fn execute(&self, command: Command, invoked_by: &str) -> Result<String, CommandError> {
        match command {
            Command::SetChannel { channel_id } => {
                self.set_channel(channel_id.as_deref(), invoked_by).await
            }
            Command::AddStreamer { username } => {
                self.add_streamer(username.as_deref(), invoked_by).await
            }
            Command::RemoveStreamer { username } => {
                self.remove_streamer(username.as_deref(), invoked_by).await
            }
        }
    }

    pub async fn set_channel(
        &self,
        channel_id: Option<&str>,
        invoked_by: &str,
    ) -> Result<String, CommandError> {
        let channel_id = channel_id
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(CommandError::MissingArgument("channel"))?
            .to_string();

        let mut state = self.ctx.state.write().await;
        let previous = state.notification_channel_id.replace(channel_id.clone());
        if let Err(e) = self.ctx.store.save(&state) {
            state.notification_channel_id = previous;
            return Err(e.into());
        }

        info!("Set notification channel to {} - {}", channel_id, invoked_by);
        Ok(format!("Notification channel set to <#{}>", channel_id))
    }

    pub async fn add_streamer(
        &self,
        username: Option<&str>,
        invoked_by: &str,
    ) -> Result<String, CommandError> {
        let login = normalize_login(username)?;

        let mut state = self.ctx.state.write().await;
        if !state.track(&login) {
            return Ok(format!("{} is already being tracked", login));
        }
        if let Err(e) = self.ctx.store.save(&state) {
            state.untrack(&login);
            return Err(e.into());
        }

        info!("Added {} to tracked streamers - {}", login, invoked_by);
        Ok(format!("Added {} to tracked streamers", login))
    }

    pub async fn remove_streamer(
        &self,
        username: Option<&str>,
        invoked_by: &str,
    ) -> Result<String, CommandError> {
        let login = normalize_login(username)?;

        let mut state = self.ctx.state.write().await;
        if !state.untrack(&login) {
            return Ok(format!("{} is not being tracked", login));
        }
        if let Err(e) = self.ctx.store.save(&state) {
            state.track(&login);
            return Err(e.into());
        }
        drop(state);

        self.ctx.live.lock().forget(&login);
        info!("Removed {} from tracked streamers - {}", login, invoked_by);
        Ok(format!("Removed {} from tracked streamers", login))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PersistedState;
    use crate::store::StateStore;
    use std::path::PathBuf;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("streamwatch-cmd-{}", uuid::Uuid::new_v4()))
            .join("data.json")
    }

    fn handler_at(path: PathBuf) -> (CommandHandler, Arc<AppContext>) {
        let ctx = AppContext::load(StateStore::new(path));
        (CommandHandler::new(ctx.clone()), ctx)
    }

    fn cleanup(path: &PathBuf) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_normalize_login() {
        assert_eq!(normalize_login(Some("  Alice_99 ")).unwrap(), "alice_99");
        assert!(matches!(
            normalize_login(None),
            Err(CommandError::MissingArgument("username"))
        ));
        assert!(matches!(
            normalize_login(Some("   ")),
            Err(CommandError::MissingArgument("username"))
        ));
        assert!(matches!(
            normalize_login(Some("bad name")),
            Err(CommandError::InvalidUsername(_))
        ));
        assert!(matches!(
            normalize_login(Some("a&b=c")),
            Err(CommandError::InvalidUsername(_))
        ));
        assert!(normalize_login(Some(&"x".repeat(26))).is_err());
    }

    #[test]
    fn test_parse_command_names() {
        assert_eq!(
            Command::parse("addstreamer", Some("alice".to_string())).unwrap(),
            Command::AddStreamer {
                username: Some("alice".to_string())
            }
        );
        assert_eq!(
            Command::parse("setchannel", None).unwrap().name(),
            SET_CHANNEL
        );
        assert!(matches!(
            Command::parse("ban", None),
            Err(CommandError::UnknownCommand(_))
        ));
    }

    #[tokio::test]
    async fn test_add_streamer_lowercases_and_persists() {
        let path = temp_path();
        let (handler, ctx) = handler_at(path.clone());

        let reply = handler
            .handle(
                Command::AddStreamer {
                    username: Some("Alice".to_string()),
                },
                "mod#0001",
            )
            .await;
        assert_eq!(reply, "Added alice to tracked streamers");
        assert!(ctx.is_tracked("alice").await);

        let on_disk = StateStore::new(&path).load();
        assert!(on_disk.is_tracked("alice"));
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_add_without_username_is_rejected() {
        let path = temp_path();
        let (handler, ctx) = handler_at(path.clone());

        let reply = handler
            .handle(Command::AddStreamer { username: None }, "mod")
            .await;
        assert_eq!(reply, "Please provide a username");

        let reply = handler
            .handle(
                Command::AddStreamer {
                    username: Some(String::new()),
                },
                "mod",
            )
            .await;
        assert_eq!(reply, "Please provide a username");

        assert!(ctx.state.read().await.tracked_streamers.is_empty());
        assert!(!path.exists());
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_add_remove_add_leaves_one_entry() {
        let path = temp_path();
        let (handler, ctx) = handler_at(path.clone());

        handler.add_streamer(Some("Alice"), "mod").await.unwrap();
        handler.remove_streamer(Some("ALICE"), "mod").await.unwrap();
        handler.add_streamer(Some("aLiCe"), "mod").await.unwrap();

        let state = ctx.state.read().await;
        assert_eq!(state.tracked_streamers.len(), 1);
        assert!(state.is_tracked("alice"));
        drop(state);

        assert_eq!(StateStore::new(&path).load().tracked_streamers.len(), 1);
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_duplicate_add_and_unknown_remove() {
        let path = temp_path();
        let (handler, _ctx) = handler_at(path.clone());

        handler.add_streamer(Some("bob"), "mod").await.unwrap();
        assert_eq!(
            handler.add_streamer(Some("BOB"), "mod").await.unwrap(),
            "bob is already being tracked"
        );
        assert_eq!(
            handler.remove_streamer(Some("carol"), "mod").await.unwrap(),
            "carol is not being tracked"
        );
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_remove_prunes_live_state() {
        let path = temp_path();
        let (handler, ctx) = handler_at(path.clone());

        handler.add_streamer(Some("alice"), "mod").await.unwrap();
        ctx.live.lock().observe("alice", true);

        let reply = handler.remove_streamer(Some("alice"), "mod").await.unwrap();
        assert_eq!(reply, "Removed alice from tracked streamers");
        assert!(!ctx.live.lock().has_seen("alice"));
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_set_channel_replaces_and_persists() {
        let path = temp_path();
        let (handler, ctx) = handler_at(path.clone());

        handler.set_channel(Some("111"), "mod").await.unwrap();
        let reply = handler.set_channel(Some("222"), "mod").await.unwrap();
        assert_eq!(reply, "Notification channel set to <#222>");
        assert_eq!(ctx.notification_channel().await.as_deref(), Some("222"));
        assert_eq!(
            StateStore::new(&path).load().notification_channel_id.as_deref(),
            Some("222")
        );

        let reply = handler
            .handle(Command::SetChannel { channel_id: None }, "mod")
            .await;
        assert_eq!(reply, "Please provide a channel");
        assert_eq!(ctx.notification_channel().await.as_deref(), Some("222"));
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back() {
        // A directory where the data file should be makes the rename fail
        let path = temp_path();
        std::fs::create_dir_all(&path).unwrap();
        let ctx = AppContext::with_state(
            StateStore::new(&path),
            PersistedState::default(),
        );
        let handler = CommandHandler::new(ctx.clone());

        let reply = handler
            .handle(
                Command::AddStreamer {
                    username: Some("alice".to_string()),
                },
                "mod",
            )
            .await;
        assert_eq!(reply, "Could not save the change, please try again later");
        assert!(!ctx.is_tracked("alice").await);
        cleanup(&path);
    }
}
