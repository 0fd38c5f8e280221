//! Error taxonomy for upstream calls, token exchange, storage and commands.
//!
//! None of these are fatal once the service is running: the poll loop logs
//! and moves on to the next streamer, and commands turn them into replies.

use thiserror::Error;

/// Token exchange with the OAuth endpoint failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("token response missing access_token")]
    MissingToken,

    #[error("malformed token response: {0}")]
    Malformed(String),
}

/// A Helix call failed.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// 401 from Helix. The caller has already asked for a token refresh.
    #[error("unauthorized (401)")]
    Unauthorized,

    #[error("no access token available")]
    NoToken,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl UpstreamError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, UpstreamError::Unauthorized)
    }
}

/// Writing the persisted state failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A chat command was rejected or could not be applied.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid username: {0}")]
    InvalidUsername(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CommandError {
    /// Message shown to the user who issued the command.
    pub fn user_message(&self) -> String {
        match self {
            CommandError::MissingArgument("username") => "Please provide a username".to_string(),
            CommandError::MissingArgument("channel") => "Please provide a channel".to_string(),
            CommandError::MissingArgument(arg) => format!("Please provide a {arg}"),
            CommandError::InvalidUsername(name) => format!(
                "`{name}` is not a valid Twitch username (1-25 letters, digits or underscores)"
            ),
            CommandError::UnknownCommand(name) => format!("Unknown command: {name}"),
            CommandError::Store(_) => {
                "Could not save the change, please try again later".to_string()
            }
        }
    }
}
