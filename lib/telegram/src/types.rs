//! Bot API wire types.
//!
//! Only the fields the relay reads or writes are modelled; everything else in
//! an update is ignored on deserialization.

use serde::{Deserialize, Serialize};

/// Envelope around every Bot API response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
    pub parameters: Option<ResponseParameters>,
}

/// Extra detail attached to some failed responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

/// An incoming update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// A press on an inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    /// The message the button was attached to. Old messages arrive with only
    /// the chat and message id filled in, which is all the relay needs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Markup attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline(InlineKeyboardMarkup),
    Keyboard(ReplyKeyboardMarkup),
    Remove(ReplyKeyboardRemove),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyKeyboardRemove {
    pub remove_keyboard: bool,
}

/// Parameters of `sendMessage`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<&'a ReplyMarkup>,
}

/// Parameters of `getUpdates`.
#[derive(Debug, Clone, Serialize)]
pub struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: &'static [&'static str],
}

/// Parameters of `answerCallbackQuery`.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerCallbackQuery<'a> {
    pub callback_query_id: &'a str,
}

/// Parameters of `setWebhook`.
#[derive(Debug, Clone, Serialize)]
pub struct SetWebhook<'a> {
    pub url: &'a str,
    pub allowed_updates: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<&'a str>,
    pub drop_pending_updates: bool,
}

/// Parameters of `deleteWebhook`.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteWebhook {
    pub drop_pending_updates: bool,
}

/// Update types the relay subscribes to.
pub const ALLOWED_UPDATES: &[&str] = &["message", "callback_query"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_update_decodes() {
        let raw = r#"{
            "update_id": 10,
            "message": {
                "message_id": 5,
                "date": 1700000000,
                "from": {"id": 42, "is_bot": false, "first_name": "Ann", "language_code": "en"},
                "chat": {"id": 42, "type": "private", "first_name": "Ann"},
                "text": "hello"
            }
        }"#;

        let update: Update = serde_json::from_str(raw).unwrap();

        let message = update.message.unwrap();
        assert_eq!(message.from.unwrap().id, 42);
        assert_eq!(message.chat.kind, "private");
        assert_eq!(message.text.as_deref(), Some("hello"));
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn callback_on_inaccessible_message_decodes() {
        let raw = r#"{
            "update_id": 11,
            "callback_query": {
                "id": "cbq-1",
                "from": {"id": 42, "is_bot": false, "first_name": "Ann"},
                "chat_instance": "x",
                "message": {"message_id": 7, "date": 0, "chat": {"id": 42, "type": "private"}},
                "data": "continue"
            }
        }"#;

        let update: Update = serde_json::from_str(raw).unwrap();

        let query = update.callback_query.unwrap();
        assert_eq!(query.data.as_deref(), Some("continue"));
        assert_eq!(query.message.unwrap().chat.id, 42);
    }

    #[test]
    fn markup_variants_encode_untagged() {
        let inline = ReplyMarkup::Inline(InlineKeyboardMarkup {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: "Continue".to_string(),
                callback_data: "continue".to_string(),
            }]],
        });
        assert_eq!(
            serde_json::to_value(&inline).unwrap(),
            serde_json::json!({
                "inline_keyboard": [[{"text": "Continue", "callback_data": "continue"}]]
            })
        );

        let remove = ReplyMarkup::Remove(ReplyKeyboardRemove {
            remove_keyboard: true,
        });
        assert_eq!(
            serde_json::to_value(&remove).unwrap(),
            serde_json::json!({"remove_keyboard": true})
        );
    }

    #[test]
    fn error_envelope_decodes_retry_after() {
        let raw = r#"{
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 3",
            "parameters": {"retry_after": 3}
        }"#;

        let response: ApiResponse<serde_json::Value> = serde_json::from_str(raw).unwrap();

        assert!(!response.ok);
        assert_eq!(response.error_code, Some(429));
        assert_eq!(response.parameters.unwrap().retry_after, Some(3));
    }
}
