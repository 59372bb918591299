//! Centralized server configuration.
//!
//! Configuration is loaded via the `config` crate from an optional
//! `relaybot.{toml,yaml,json}` file in the working directory, then from
//! environment variables with `__` separating nested keys, for example
//! `TELEGRAM__TOKEN` or `COMPLETION__MODEL`. Environment wins.
//!
//! See [`OpenAiConfig`] for the completion settings and [`RelayTexts`] for
//! the reply texts that can be overridden.

use crate::error::ServerError;
use relaybot_ai::OpenAiConfig;
use relaybot_conversation::{PersonaCatalog, PersonaEntry, RelayTexts};
use relaybot_core::{ChatId, Result};
use rootcause::prelude::Report;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Telegram connection settings.
    pub telegram: TelegramConfig,

    /// Completion service settings.
    pub completion: OpenAiConfig,

    /// Relay behaviour.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Persona catalog override. The curated catalog is used when empty.
    #[serde(default)]
    pub personas: Vec<PersonaEntry>,
}

/// How updates reach the relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Long-poll `getUpdates`.
    #[default]
    Polling,
    /// Receive updates on an HTTP endpoint registered with `setWebhook`.
    Webhook,
}

/// Telegram-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from BotFather.
    pub token: String,

    /// Bot API server.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default)]
    pub mode: DeliveryMode,

    /// How long a single `getUpdates` call waits for updates, in seconds.
    #[serde(default = "default_poll_timeout_seconds")]
    pub poll_timeout_seconds: u64,

    /// Local address the webhook server binds to.
    #[serde(default = "default_webhook_addr")]
    pub webhook_addr: String,

    /// Local path updates are POSTed to.
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,

    /// Public URL registered with Telegram. Required in webhook mode.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Secret Telegram echoes back on every webhook call.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Deliver every reply to this chat instead of the chat the event came
    /// from.
    #[serde(default)]
    pub chat_id: Option<i64>,
}

fn default_api_base_url() -> String {
    relaybot_telegram::client::DEFAULT_API_BASE_URL.to_string()
}

fn default_poll_timeout_seconds() -> u64 {
    30
}

fn default_webhook_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_webhook_path() -> String {
    "/telegram/webhook".to_string()
}

impl TelegramConfig {
    /// Returns the fixed destination chat, if one is configured.
    #[must_use]
    pub fn destination(&self) -> Option<ChatId> {
        self.chat_id.map(ChatId::new)
    }
}

/// Relay behaviour configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Persona used for users who never picked one.
    #[serde(default = "default_persona")]
    pub default_persona: String,

    /// Reply text overrides.
    #[serde(default)]
    pub texts: RelayTexts,
}

fn default_persona() -> String {
    "A scientist who knows every way to earn money and understands how to work with people"
        .to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_persona: default_persona(),
            texts: RelayTexts::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `relaybot.*` and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn load() -> Result<Self, ServerError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::with_name("relaybot").required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ServerError::Config {
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Checks settings that depend on each other.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.telegram.token.trim().is_empty() {
            return Err(invalid("telegram.token", "must not be empty"));
        }
        if self.completion.api_key.trim().is_empty() {
            return Err(invalid("completion.api_key", "must not be empty"));
        }
        if self.relay.default_persona.trim().is_empty() {
            return Err(invalid("relay.default_persona", "must not be empty"));
        }
        if self.telegram.mode == DeliveryMode::Webhook {
            if self.telegram.webhook_url.as_deref().is_none_or(str::is_empty) {
                return Err(invalid("telegram.webhook_url", "required in webhook mode"));
            }
            if !self.telegram.webhook_path.starts_with('/') {
                return Err(invalid("telegram.webhook_path", "must start with '/'"));
            }
        }
        Ok(())
    }

    /// Builds the persona catalog, falling back to the curated one.
    #[must_use]
    pub fn catalog(&self) -> PersonaCatalog {
        if self.personas.is_empty() {
            PersonaCatalog::curated()
        } else {
            PersonaCatalog::new(self.personas.iter().cloned())
        }
    }
}

fn invalid(field: &str, reason: &str) -> Report<ServerError> {
    ServerError::Config {
        reason: format!("{field} {reason}"),
    }
    .into()
}
