//! OpenAI-compatible chat completion client.

use crate::backend::{CompletionClient, CompletionRequest, CompletionResponse, TokenUsage};
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Configuration for an OpenAI-compatible backend.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    /// API key sent as a bearer token.
    pub api_key: String,

    /// Base URL of the API, without the `/chat/completions` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Sampling temperature applied to every request that does not set one.
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Token cap applied to every request that does not set one.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo-16k".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

impl OpenAiConfig {
    /// Creates a configuration with defaults for everything but the key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_seconds: default_timeout_seconds(),
            temperature: None,
            max_tokens: None,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Client for OpenAI-compatible `chat/completions` endpoints.
pub struct OpenAiClient {
    http: Client,
    config: OpenAiConfig,
    endpoint: String,
}

impl OpenAiClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: OpenAiConfig) -> Result<Self, Report<LlmError>> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            endpoint: config.endpoint(),
            config,
        })
    }

    fn build_body<'a>(&'a self, request: &'a CompletionRequest) -> ChatCompletionBody<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        ChatCompletionBody {
            model: &self.config.model,
            messages,
            temperature: request.temperature.or(self.config.temperature),
            max_tokens: request.max_tokens.or(self.config.max_tokens),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    #[instrument(skip(self, request), fields(completion = %request.id, model = %self.config.model))]
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, Report<LlmError>> {
        let body = self.build_body(request);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            warn!(?retry_after_secs, "completion provider rate limited the request");
            return Err(LlmError::RateLimited { retry_after_secs }.into());
        }

        let text = response
            .text()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if !status.is_success() {
            return Err(LlmError::RequestFailed {
                status: Some(status.as_u16()),
                reason: error_message(&text),
            }
            .into());
        }

        let parsed = parse_response(&text, &self.config.model)?;
        debug!(
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "completion finished"
        );
        Ok(parsed)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

fn classify_transport_error(e: &reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else if e.is_connect() {
        LlmError::ProviderUnavailable {
            provider: "openai".to_string(),
            reason: e.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            status: e.status().map(|s| s.as_u16()),
            reason: e.to_string(),
        }
    }
}

/// Extracts `error.message` from an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}

fn parse_response(body: &str, requested_model: &str) -> Result<CompletionResponse, LlmError> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| LlmError::ResponseParseFailed {
            reason: e.to_string(),
        })?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or(LlmError::EmptyResponse)?;

    let usage = parsed
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        content,
        usage,
        model: parsed.model.unwrap_or_else(|| requested_model.to_string()),
    })
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
