//! Transport-neutral output model.
//!
//! Screens are described as a [`View`] (HTML text plus controls) and handed
//! to a [`Renderer`], which is created by the transport for one inbound
//! interaction and knows which chat and message it answers.

use async_trait::async_trait;
use thiserror::Error;

use crate::action::Action;

/// An inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

impl Button {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Controls attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Controls {
    #[default]
    None,
    /// Inline keyboard, one inner vector per row.
    Inline(Vec<Vec<Button>>),
    /// The persistent reply-keyboard main menu.
    ReplyMenu,
}

/// A rendered screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    /// HTML-formatted message text.
    pub text: String,
    pub controls: Controls,
}

impl View {
    /// Plain text without controls.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            controls: Controls::None,
        }
    }

    /// Text with an inline keyboard.
    pub fn inline(text: impl Into<String>, rows: Vec<Vec<Button>>) -> Self {
        Self {
            text: text.into(),
            controls: Controls::Inline(rows),
        }
    }

    /// Text with the reply-keyboard main menu.
    pub fn with_reply_menu(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            controls: Controls::ReplyMenu,
        }
    }

    /// Every action reachable from this view's buttons.
    pub fn actions(&self) -> Vec<&Action> {
        match &self.controls {
            Controls::Inline(rows) => rows.iter().flatten().map(|b| &b.action).collect(),
            _ => Vec::new(),
        }
    }
}

/// Failures reported by a [`Renderer`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The message or chat being rendered into no longer exists.
    #[error("render target gone: {0}")]
    TargetGone(String),

    /// Any other delivery failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Outbound side of one interaction.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Sends a new message.
    async fn show_prompt(&self, view: View) -> Result<(), RenderError>;

    /// Replaces the interaction's current message.
    ///
    /// When there is no current message yet, a new one is sent and becomes
    /// current for later calls.
    async fn edit_current(&self, view: View) -> Result<(), RenderError>;

    /// Short transient notice (a callback toast on Telegram).
    async fn notify(&self, _text: &str) -> Result<(), RenderError> {
        Ok(())
    }

    /// Sends a file.
    async fn send_document(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        caption: &str,
    ) -> Result<(), RenderError>;
}
