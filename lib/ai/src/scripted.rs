//! Deterministic completion client for tests and local runs.

use crate::backend::{CompletionClient, CompletionRequest, CompletionResponse, TokenUsage};
use crate::error::LlmError;
use async_trait::async_trait;
use rootcause::prelude::Report;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A completion client that answers every prompt with a fixed shape and
/// records what it was asked.
///
/// Replies are `answer to: <prompt>`. Requests whose prompt contains one of
/// the configured failure markers fail with `LlmError::RequestFailed`.
#[derive(Debug, Default)]
pub struct ScriptedCompletionClient {
    fail_markers: Vec<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletionClient {
    /// Creates a client that answers everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails any request whose prompt contains `marker`.
    #[must_use]
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_markers.push(marker.into());
        self
    }

    /// Sleeps before answering, to simulate upstream latency.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the reply this client produces for `prompt`.
    #[must_use]
    pub fn reply_for(prompt: &str) -> String {
        format!("answer to: {prompt}")
    }

    /// Returns every request received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, Report<LlmError>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self
            .fail_markers
            .iter()
            .any(|marker| request.prompt.contains(marker.as_str()))
        {
            return Err(LlmError::RequestFailed {
                status: Some(500),
                reason: "scripted failure".to_string(),
            }
            .into());
        }

        Ok(CompletionResponse {
            content: Self::reply_for(&request.prompt),
            usage: TokenUsage::default(),
            model: "scripted".to_string(),
        })
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
