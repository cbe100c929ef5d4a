//! Error types for the Telegram front end.

use thiserror::Error;

use fanuc_adapters::AdapterError;
use fanuc_persistence::PersistenceError;

/// Errors that can stop the bot from starting.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Bot token not provided.
    #[error("Telegram bot token not set. Set TELEGRAM_BOT_TOKEN (or TG_TOKEN).")]
    NoToken,

    /// The Bot API rejected a startup call.
    #[error("Failed to start bot: {0}")]
    BotStartFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] PersistenceError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),
}

/// Result type for Telegram operations.
pub type Result<T> = std::result::Result<T, TelegramError>;

impl From<teloxide::RequestError> for TelegramError {
    fn from(e: teloxide::RequestError) -> Self {
        TelegramError::BotStartFailed(e.to_string())
    }
}
