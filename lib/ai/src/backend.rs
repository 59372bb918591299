//! Completion backend abstraction.
//!
//! Provides a unified interface over completion providers. The relay only
//! ever sends one system prompt and one user prompt, so the request type is
//! deliberately flat.

use crate::error::LlmError;
use async_trait::async_trait;
use relaybot_core::CompletionId;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};

/// A request to a completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Identifier used to correlate log lines for this invocation.
    pub id: CompletionId,
    /// The user prompt.
    pub prompt: String,
    /// System prompt (the persona), if any.
    pub system: Option<String>,
    /// Temperature for sampling (0.0 - 2.0).
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Creates a new request with just a prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: CompletionId::new(),
            prompt: prompt.into(),
            system: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Adds a system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the max tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A response from a completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated content, trimmed of surrounding whitespace.
    pub content: String,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Model that generated the response.
    pub model: String,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens.
    pub input_tokens: u32,
    /// Number of output tokens.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Returns the total number of tokens.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Trait for completion backends.
///
/// Implementations may suspend for as long as the upstream takes; any
/// timeout policy belongs to the implementation.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generates a completion for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream call fails or its response is
    /// unusable.
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, Report<LlmError>>;

    /// Returns the model name.
    fn model(&self) -> &str;
}
