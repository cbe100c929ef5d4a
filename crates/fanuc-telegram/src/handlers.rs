//! Update handlers: turn Telegram updates into dispatcher calls.

use std::sync::Arc;
use std::time::Instant;

use teloxide::prelude::*;
use teloxide::types::User;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use fanuc_core::{Action, Dispatcher, Renderer};
use fanuc_models::UserId;

use crate::renderer::TelegramRenderer;

/// Bot commands that can be invoked with /.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Show the main menu")]
    Start,

    #[command(description = "Show help")]
    Help,

    #[command(description = "Kafka targets")]
    Kafka,

    #[command(description = "Fanuc API services")]
    Services,

    #[command(description = "Your profile")]
    Profile,

    #[command(description = "Cancel the current input")]
    Cancel,
}

fn user_id(user: &User) -> UserId {
    UserId(user.id.0 as i64)
}

/// Logs one handled update with how long it took.
fn log_request(user: UserId, kind: &str, payload: &str, started: Instant) {
    info!(
        user_id = %user,
        kind,
        payload = %payload,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Handled update"
    );
}

/// Handle a parsed /command.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dispatcher: Arc<Dispatcher>,
) -> ResponseResult<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let started = Instant::now();
    let user = user_id(from);
    let renderer: Arc<dyn Renderer> = Arc::new(TelegramRenderer::new(bot, msg.chat.id));

    match cmd {
        Command::Start => {
            dispatcher
                .on_start(user, &from.full_name(), renderer)
                .await
        }
        Command::Help => dispatcher.on_help(renderer).await,
        Command::Kafka => dispatcher.on_action(user, Action::TargetsList, renderer).await,
        Command::Services => {
            dispatcher
                .on_action(user, Action::ServicesList, renderer)
                .await
        }
        Command::Profile => dispatcher.on_action(user, Action::WhoAmI, renderer).await,
        Command::Cancel => dispatcher.on_cancel(user, renderer).await,
    }

    log_request(user, "CMD", &format!("{:?}", cmd), started);
    Ok(())
}

/// Handle a `/something` that is not a known command.
pub async fn handle_unknown_command(bot: Bot, msg: Message) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        let command = text.split_whitespace().next().unwrap_or(text);
        info!(cmd = %command, "Unrecognized command");
        bot.send_message(
            msg.chat.id,
            format!("Unknown command: {}\n\nUse /help to see available commands.", command),
        )
        .await?;
    }
    Ok(())
}

/// Handle free text: menu labels and wizard input.
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    dispatcher: Arc<Dispatcher>,
) -> ResponseResult<()> {
    let (Some(text), Some(from)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };
    let started = Instant::now();
    let user = user_id(from);
    let renderer: Arc<dyn Renderer> = Arc::new(TelegramRenderer::new(bot, msg.chat.id));

    dispatcher.on_text(user, text, renderer).await;

    log_request(user, "TEXT", text, started);
    Ok(())
}

/// Handle an inline button press. The query is always answered.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    dispatcher: Arc<Dispatcher>,
) -> ResponseResult<()> {
    let started = Instant::now();
    let user = user_id(&q.from);
    let data = q.data.clone().unwrap_or_default();

    let mut toast = None;
    match q.message.as_ref().map(|m| (m.chat().id, m.id())) {
        Some((chat_id, message_id)) => {
            let renderer = Arc::new(TelegramRenderer::anchored(bot.clone(), chat_id, message_id));
            match data.parse::<Action>() {
                Ok(action) => {
                    dispatcher
                        .on_action(user, action, renderer.clone())
                        .await;
                    toast = renderer.take_toast().await;
                }
                Err(e) => {
                    warn!(user_id = %user, error = %e, "Ignoring callback");
                    toast = Some("Unknown action".to_string());
                }
            }
        }
        None => warn!(user_id = %user, data = %data, "Callback without an accessible message"),
    }

    let mut answer = bot.answer_callback_query(q.id.clone());
    if let Some(text) = toast {
        answer = answer.text(text);
    }
    if let Err(e) = answer.await {
        warn!(user_id = %user, error = %e, "Failed to answer callback query");
    }

    log_request(user, "BTN", &data, started);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_parse() {
        assert_eq!(Command::parse("/start", "fanuc_bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/kafka", "fanuc_bot").unwrap(), Command::Kafka);
        assert_eq!(Command::parse("/cancel", "fanuc_bot").unwrap(), Command::Cancel);
        assert!(Command::parse("/connect", "fanuc_bot").is_err());
    }

    #[test]
    fn test_descriptions_list_every_command() {
        let help = Command::descriptions().to_string();
        for name in ["/start", "/help", "/kafka", "/services", "/profile", "/cancel"] {
            assert!(help.contains(name), "missing {}", name);
        }
    }
}
