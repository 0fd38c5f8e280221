pub mod twitch;

// Re-export commonly used types
pub use twitch::{HelixApi, HelixHttpApi, TwitchClient, TwitchOAuth};
