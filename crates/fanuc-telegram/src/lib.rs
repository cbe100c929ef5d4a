//! Telegram front end for the Fanuc client bot.
//!
//! Wraps [`fanuc_core::Dispatcher`] in a teloxide long-polling bot. Button
//! presses edit the message they came from; text messages get new replies.
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN` (or `TG_TOKEN`): bot token from @BotFather
//!
//! Optional:
//! - `FANUC_BOT_STATE_DIR`: where `store.json` and `.env` live (default `~/.fanuc-bot`)
//! - `FANUC_LIVE_PERIOD_MS`, `FANUC_LIVE_FETCH_TIMEOUT_MS`: live refresh timing
//! - `FANUC_HTTP_TIMEOUT_MS`: timeout for control-API calls
//!
//! # Commands
//!
//! - `/start` - Main menu
//! - `/help` - Help
//! - `/kafka` - Kafka targets
//! - `/services` - API services
//! - `/profile` - Profile
//! - `/cancel` - Cancel the current input

pub mod bot;
pub mod error;
pub mod handlers;
pub mod keyboards;
pub mod renderer;

pub use bot::TelegramBot;
pub use error::{Result, TelegramError};
pub use renderer::TelegramRenderer;
