//! Discord side of the live notifier: configuration, the bot REST client,
//! go-live embeds and the signed interactions endpoint.

pub mod config;
pub mod discord;
pub mod formatters;
pub mod interactions;
