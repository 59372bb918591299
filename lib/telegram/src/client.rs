//! Typed Bot API client.

use crate::error::TelegramError;
use crate::types::{
    ALLOWED_UPDATES, AnswerCallbackQuery, ApiResponse, DeleteWebhook, GetUpdates, Message,
    ReplyMarkup, SendMessage, SetWebhook, Update,
};
use reqwest::Client;
use rootcause::prelude::Report;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default Bot API server.
pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Slack added on top of the long-poll timeout before the HTTP request
/// itself gives up.
const REQUEST_SLACK: Duration = Duration::from_secs(15);

/// Client for the Telegram Bot API.
///
/// The token is part of every method URL; it is never logged and is removed
/// from HTTP errors before they are reported.
pub struct BotClient {
    http: Client,
    method_base: String,
}

impl BotClient {
    /// Creates a client for `token` against `api_base_url`.
    ///
    /// `poll_timeout` is the longest `getUpdates` wait the client will be
    /// asked to perform.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is blank or the HTTP client cannot be
    /// constructed.
    pub fn new(
        token: &str,
        api_base_url: &str,
        poll_timeout: Duration,
    ) -> Result<Self, Report<TelegramError>> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TelegramError::Config {
                reason: "bot token is empty".to_string(),
            }
            .into());
        }

        let http = Client::builder()
            .timeout(poll_timeout + REQUEST_SLACK)
            .build()
            .map_err(|e| TelegramError::Config {
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            method_base: format!("{}/bot{token}", api_base_url.trim_end_matches('/')),
        })
    }

    /// Long-polls for updates after `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    #[instrument(skip(self))]
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_seconds: u64,
    ) -> Result<Vec<Update>, Report<TelegramError>> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: timeout_seconds,
                allowed_updates: ALLOWED_UPDATES,
            },
        )
        .await
    }

    /// Sends a text message, optionally with a keyboard.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    #[instrument(skip(self, text, reply_markup), fields(len = text.len()))]
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&ReplyMarkup>,
    ) -> Result<Message, Report<TelegramError>> {
        self.call(
            "sendMessage",
            &SendMessage {
                chat_id,
                text,
                reply_markup,
            },
        )
        .await
    }

    /// Stops the client's loading indicator on a pressed inline button.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    #[instrument(skip(self))]
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
    ) -> Result<bool, Report<TelegramError>> {
        self.call(
            "answerCallbackQuery",
            &AnswerCallbackQuery { callback_query_id },
        )
        .await
    }

    /// Registers `url` as the webhook, dropping updates queued before now.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    #[instrument(skip(self, secret_token))]
    pub async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&str>,
    ) -> Result<bool, Report<TelegramError>> {
        self.call(
            "setWebhook",
            &SetWebhook {
                url,
                allowed_updates: ALLOWED_UPDATES,
                secret_token,
                drop_pending_updates: true,
            },
        )
        .await
    }

    /// Removes any webhook so `getUpdates` can be used.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    #[instrument(skip(self))]
    pub async fn delete_webhook(
        &self,
        drop_pending_updates: bool,
    ) -> Result<bool, Report<TelegramError>> {
        self.call("deleteWebhook", &DeleteWebhook { drop_pending_updates })
            .await
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, Report<TelegramError>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}/{method}", self.method_base))
            .json(params)
            .send()
            .await
            .map_err(|e| TelegramError::Http {
                method: method.to_string(),
                reason: e.without_url().to_string(),
            })?;

        let body = response.text().await.map_err(|e| TelegramError::Http {
            method: method.to_string(),
            reason: e.without_url().to_string(),
        })?;

        let result = decode(method, &body)?;
        debug!(method, "bot api call succeeded");
        Ok(result)
    }
}

/// Unwraps a Bot API envelope.
fn decode<R: DeserializeOwned>(method: &str, body: &str) -> Result<R, TelegramError> {
    let envelope: ApiResponse<R> =
        serde_json::from_str(body).map_err(|e| TelegramError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        })?;

    if !envelope.ok {
        return Err(TelegramError::Api {
            method: method.to_string(),
            code: envelope.error_code,
            description: envelope
                .description
                .unwrap_or_else(|| "no description".to_string()),
            retry_after_secs: envelope.parameters.and_then(|p| p.retry_after),
        });
    }

    envelope.result.ok_or_else(|| TelegramError::Decode {
        method: method.to_string(),
        reason: "response has no result".to_string(),
    })
}
