//! Delivery of relay replies over the Bot API.

use crate::client::BotClient;
use crate::error::TelegramError;
use crate::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, ReplyKeyboardMarkup,
    ReplyKeyboardRemove, ReplyMarkup,
};
use async_trait::async_trait;
use relaybot_conversation::{ChatTransport, Keyboard, OutboundMessage, TransportError};
use relaybot_core::ChatId;
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Longest text a single `sendMessage` accepts, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// A [`ChatTransport`] that sends through a [`BotClient`].
pub struct TelegramTransport {
    client: Arc<BotClient>,
    destination: Option<ChatId>,
}

impl TelegramTransport {
    /// Creates a transport that replies in the chat each event came from.
    #[must_use]
    pub fn new(client: Arc<BotClient>) -> Self {
        Self {
            client,
            destination: None,
        }
    }

    /// Sends every reply to `chat` instead of the originating chat.
    #[must_use]
    pub fn with_destination(mut self, chat: Option<ChatId>) -> Self {
        self.destination = chat;
        self
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    #[instrument(skip(self, message), fields(%chat))]
    async fn deliver(
        &self,
        chat: ChatId,
        message: &OutboundMessage,
    ) -> Result<(), Report<TransportError>> {
        let target = self.destination.unwrap_or(chat);
        let markup = message.keyboard.as_ref().map(reply_markup);
        let chunks = split_text(&message.text, MAX_MESSAGE_CHARS);
        let last = chunks.len().saturating_sub(1);

        for (index, chunk) in chunks.iter().enumerate() {
            // Buttons go on the final chunk so they sit under the whole answer.
            let chunk_markup = if index == last { markup.as_ref() } else { None };
            self.client
                .send_message(target.get(), chunk, chunk_markup)
                .await
                .map_err(|e| match e.current_context() {
                    TelegramError::Http { .. } => TransportError::Unreachable {
                        reason: e.to_string(),
                    },
                    _ => TransportError::Rejected {
                        chat: target,
                        reason: e.to_string(),
                    },
                })?;
        }

        debug!(%target, chunks = chunks.len(), "reply delivered");
        Ok(())
    }
}

/// Converts a relay keyboard into Bot API markup.
///
/// Action buttons become inline buttons, one row each; choices become a
/// reply keyboard, one entry per row.
#[must_use]
pub fn reply_markup(keyboard: &Keyboard) -> ReplyMarkup {
    match keyboard {
        Keyboard::Actions(actions) => ReplyMarkup::Inline(InlineKeyboardMarkup {
            inline_keyboard: actions
                .iter()
                .map(|action| {
                    vec![InlineKeyboardButton {
                        text: action.label().to_string(),
                        callback_data: action.callback_data().to_string(),
                    }]
                })
                .collect(),
        }),
        Keyboard::Choices(choices) => ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
            keyboard: choices
                .iter()
                .map(|choice| {
                    vec![KeyboardButton {
                        text: choice.clone(),
                    }]
                })
                .collect(),
            resize_keyboard: true,
        }),
        Keyboard::Remove => ReplyMarkup::Remove(ReplyKeyboardRemove {
            remove_keyboard: true,
        }),
    }
}

/// Splits `text` into pieces of at most `limit` characters.
///
/// Prefers to break after a newline, then after whitespace, and only cuts a
/// word when a piece has neither. Empty text yields one empty piece.
#[must_use]
pub fn split_text(text: &str, limit: usize) -> Vec<&str> {
    let limit = limit.max(1);
    let mut pieces = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        // Byte offset just past the `limit`th character.
        let hard = rest
            .char_indices()
            .nth(limit)
            .map_or(rest.len(), |(offset, _)| offset);
        let window = &rest[..hard];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(char::is_whitespace))
            .map(|offset| offset + window[offset..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(hard);

        pieces.push(&rest[..cut]);
        rest = &rest[cut..];
    }

    pieces.push(rest);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaybot_conversation::Action;

    #[test]
    fn follow_ups_become_inline_buttons() {
        let markup = reply_markup(&Keyboard::Actions(Action::FOLLOW_UPS.to_vec()));

        assert_eq!(
            serde_json::to_value(&markup).unwrap(),
            serde_json::json!({
                "inline_keyboard": [
                    [{"text": "Continue", "callback_data": "continue"}],
                    [{"text": "Another answer", "callback_data": "regenerate"}]
                ]
            })
        );
    }

    #[test]
    fn choices_become_reply_keyboard() {
        let markup = reply_markup(&Keyboard::Choices(vec![
            "Programmer".to_string(),
            "Historian".to_string(),
        ]));

        assert_eq!(
            serde_json::to_value(&markup).unwrap(),
            serde_json::json!({
                "keyboard": [[{"text": "Programmer"}], [{"text": "Historian"}]],
                "resize_keyboard": true
            })
        );
    }

    #[test]
    fn short_text_is_one_piece() {
        assert_eq!(split_text("hello", 10), vec!["hello"]);
        assert_eq!(split_text("", 10), vec![""]);
    }

    #[test]
    fn long_text_breaks_on_newlines_first() {
        let text = "first line\nsecond line\nthird";
        let pieces = split_text(text, 15);

        assert_eq!(pieces, vec!["first line\n", "second line\n", "third"]);
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn long_text_breaks_on_spaces_without_newlines() {
        let pieces = split_text("alpha beta gamma", 11);
        assert_eq!(pieces, vec!["alpha beta ", "gamma"]);
    }

    #[test]
    fn unbroken_text_is_cut_at_the_limit() {
        let pieces = split_text("abcdefghij", 4);
        assert_eq!(pieces, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let text = "ééééé";
        let pieces = split_text(text, 2);

        assert_eq!(pieces, vec!["éé", "éé", "é"]);
        assert!(pieces.iter().all(|p| p.chars().count() <= 2));
    }
}
