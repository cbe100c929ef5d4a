//! Conversions from core controls to Telegram keyboards.

use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup,
};
use tracing::warn;

use fanuc_core::views::REPLY_MENU;
use fanuc_core::{Button, Controls};

/// Telegram's limit for callback payloads, in bytes.
pub const MAX_CALLBACK_DATA: usize = 64;

/// Builds an inline keyboard, one Telegram row per row of buttons.
pub fn inline_keyboard(rows: &[Vec<Button>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|button| {
                let data = button.action.to_string();
                if data.len() > MAX_CALLBACK_DATA {
                    warn!(data = %data, "Callback data exceeds Telegram limit");
                }
                InlineKeyboardButton::callback(button.label.clone(), data)
            })
            .collect::<Vec<_>>()
    }))
}

/// The persistent main-menu reply keyboard.
pub fn main_menu() -> KeyboardMarkup {
    KeyboardMarkup::new(
        REPLY_MENU
            .iter()
            .map(|row| row.iter().map(|label| KeyboardButton::new(*label)).collect::<Vec<_>>()),
    )
    .resize_keyboard()
}

/// Markup for a new message, if the controls need any.
pub fn reply_markup(controls: &Controls) -> Option<ReplyMarkup> {
    match controls {
        Controls::None => None,
        Controls::Inline(rows) => Some(ReplyMarkup::InlineKeyboard(inline_keyboard(rows))),
        Controls::ReplyMenu => Some(ReplyMarkup::Keyboard(main_menu())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanuc_core::Action;
    use fanuc_models::{MachineId, ServiceId};
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_inline_keyboard_keeps_rows_and_tokens() {
        let rows = vec![
            vec![Button::new("▶ Start polling", Action::StartPolling(ServiceId(3), MachineId::new("m:1")))],
            vec![Button::new("🏠 Home", Action::Home)],
        ];
        let markup = inline_keyboard(&rows);

        assert_eq!(markup.inline_keyboard.len(), 2);
        match &markup.inline_keyboard[0][0].kind {
            InlineKeyboardButtonKind::CallbackData(data) => assert_eq!(data, "sp:3:m:1"),
            other => panic!("unexpected button kind: {:?}", other),
        }
        assert_eq!(markup.inline_keyboard[1][0].text, "🏠 Home");
    }

    #[test]
    fn test_main_menu_has_two_rows() {
        let menu = main_menu();
        assert_eq!(menu.keyboard.len(), 2);
        assert_eq!(menu.keyboard[0][0].text, "📋 Kafka Reader");
        assert_eq!(menu.keyboard[1][1].text, "🏠 Home");
    }

    #[test]
    fn test_plain_views_have_no_markup() {
        assert!(reply_markup(&Controls::None).is_none());
        assert!(matches!(
            reply_markup(&Controls::ReplyMenu),
            Some(ReplyMarkup::Keyboard(_))
        ));
    }
}
