//! [`Renderer`] implementation backed by the Bot API.
//!
//! One renderer answers one inbound update. For a button press it is
//! anchored to the message holding the button, so screens replace each
//! other in place; for text it starts unanchored and anchors to the first
//! message it sends through `edit_current`.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use tokio::sync::Mutex;
use tracing::debug;

use fanuc_core::{Controls, RenderError, Renderer, View};

use crate::keyboards::{inline_keyboard, reply_markup};

pub struct TelegramRenderer {
    bot: Bot,
    chat_id: ChatId,
    anchor: Mutex<Option<MessageId>>,
    toast: Mutex<Option<String>>,
}

impl TelegramRenderer {
    /// Renderer for a text message or command: nothing to edit yet.
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self {
            bot,
            chat_id,
            anchor: Mutex::new(None),
            toast: Mutex::new(None),
        }
    }

    /// Renderer for a button press on `message_id`.
    pub fn anchored(bot: Bot, chat_id: ChatId, message_id: MessageId) -> Self {
        Self {
            anchor: Mutex::new(Some(message_id)),
            ..Self::new(bot, chat_id)
        }
    }

    /// The last notice queued for the callback answer.
    pub async fn take_toast(&self) -> Option<String> {
        self.toast.lock().await.take()
    }

    async fn send(&self, view: View) -> Result<MessageId, RenderError> {
        let mut request = self
            .bot
            .send_message(self.chat_id, view.text)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = reply_markup(&view.controls) {
            request = request.reply_markup(markup);
        }
        let sent = request.await.map_err(map_request_error)?;
        Ok(sent.id)
    }

    async fn edit(&self, message_id: MessageId, view: View) -> Result<(), RenderError> {
        let mut request = self
            .bot
            .edit_message_text(self.chat_id, message_id, view.text)
            .parse_mode(ParseMode::Html);
        if let Controls::Inline(rows) = &view.controls {
            request = request.reply_markup(inline_keyboard(rows));
        }
        match request.await {
            Ok(_) => Ok(()),
            Err(RequestError::Api(ApiError::MessageNotModified)) => {
                debug!(chat_id = %self.chat_id, "Message not modified");
                Ok(())
            }
            Err(e) => Err(map_request_error(e)),
        }
    }
}

/// Maps Bot API failures onto render outcomes.
pub fn map_request_error(err: RequestError) -> RenderError {
    match err {
        RequestError::Api(
            api @ (ApiError::MessageToEditNotFound
            | ApiError::MessageIdInvalid
            | ApiError::MessageCantBeEdited
            | ApiError::ChatNotFound
            | ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::UserDeactivated),
        ) => RenderError::TargetGone(api.to_string()),
        other => RenderError::Transport(other.to_string()),
    }
}

#[async_trait]
impl Renderer for TelegramRenderer {
    async fn show_prompt(&self, view: View) -> Result<(), RenderError> {
        self.send(view).await.map(|_| ())
    }

    async fn edit_current(&self, view: View) -> Result<(), RenderError> {
        // A reply keyboard cannot be attached by editing.
        if view.controls == Controls::ReplyMenu {
            return self.show_prompt(view).await;
        }

        let mut anchor = self.anchor.lock().await;
        match *anchor {
            Some(message_id) => self.edit(message_id, view).await,
            None => {
                let message_id = self.send(view).await?;
                *anchor = Some(message_id);
                Ok(())
            }
        }
    }

    async fn notify(&self, text: &str) -> Result<(), RenderError> {
        *self.toast.lock().await = Some(text.to_string());
        Ok(())
    }

    async fn send_document(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        caption: &str,
    ) -> Result<(), RenderError> {
        self.bot
            .send_document(
                self.chat_id,
                InputFile::memory(contents).file_name(file_name.to_string()),
            )
            .caption(caption.to_string())
            .parse_mode(ParseMode::Html)
            .await
            .map_err(map_request_error)?;
        Ok(())
    }
}
