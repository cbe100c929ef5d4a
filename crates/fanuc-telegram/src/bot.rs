//! Long-polling bot wiring.

use std::sync::Arc;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::error::{Result, TelegramError};
use crate::handlers::{
    handle_callback, handle_command, handle_message, handle_unknown_command, Command,
};

/// The Telegram bot for the Fanuc client.
pub struct TelegramBot {
    bot: Bot,
    dispatcher: Arc<fanuc_core::Dispatcher>,
}

impl TelegramBot {
    pub fn new(token: impl Into<String>, dispatcher: Arc<fanuc_core::Dispatcher>) -> Self {
        Self {
            bot: Bot::new(token),
            dispatcher,
        }
    }

    /// Create a bot using `TELEGRAM_BOT_TOKEN` (or `TG_TOKEN`).
    pub fn from_env(dispatcher: Arc<fanuc_core::Dispatcher>) -> Result<Self> {
        let token = fanuc_core::config::telegram_token().ok_or(TelegramError::NoToken)?;
        Ok(Self::new(token, dispatcher))
    }

    /// Get the bot's username.
    pub async fn get_me(&self) -> Result<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| TelegramError::BotStartFailed(e.to_string()))?;
        Ok(me.username().to_string())
    }

    /// Run until Ctrl+C.
    pub async fn start_polling(&self) -> Result<()> {
        info!("Starting Telegram bot in polling mode...");

        if let Err(e) = self.bot.set_my_commands(Command::bot_commands()).await {
            warn!(error = %e, "Failed to register bot commands");
        }

        let for_callbacks = Arc::clone(&self.dispatcher);
        let for_commands = Arc::clone(&self.dispatcher);
        let for_messages = Arc::clone(&self.dispatcher);

        let handler = dptree::entry()
            .branch(
                Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
                    let dispatcher = Arc::clone(&for_callbacks);
                    async move { handle_callback(bot, q, dispatcher).await }
                }),
            )
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                        let dispatcher = Arc::clone(&for_commands);
                        async move { handle_command(bot, msg, cmd, dispatcher).await }
                    }),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.text().is_some_and(|t| t.starts_with('/')))
                    .endpoint(handle_unknown_command),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.text().is_some())
                    .endpoint(move |bot: Bot, msg: Message| {
                        let dispatcher = Arc::clone(&for_messages);
                        async move { handle_message(bot, msg, dispatcher).await }
                    }),
            );

        info!("Bot is running! Send /start to begin.");

        Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|upd| async move {
                warn!("Unhandled update: {:?}", upd.kind);
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}
