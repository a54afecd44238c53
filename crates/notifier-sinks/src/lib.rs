//! Notification sinks for the game update notifier.

pub mod discord;
pub mod telegram;

pub use discord::DiscordSink;
pub use telegram::TelegramSink;
