//! Error types for the AI crate.
//!
//! `LlmError` covers every way a completion call can fail. Callers receive
//! it wrapped in a rootcause `Report`.

use std::fmt;

/// Errors from completion backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Provider could not be reached.
    ProviderUnavailable { provider: String, reason: String },
    /// Request was rejected by the provider.
    RequestFailed { status: Option<u16>, reason: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// Response parsed but contained no generated text.
    EmptyResponse,
    /// Timeout waiting for response.
    Timeout,
    /// Rate limit or quota exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable { provider, reason } => {
                write!(f, "completion provider '{provider}' unavailable: {reason}")
            }
            Self::RequestFailed { status, reason } => match status {
                Some(code) => write!(f, "completion request failed ({code}): {reason}"),
                None => write!(f, "completion request failed: {reason}"),
            },
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse completion response: {reason}")
            }
            Self::EmptyResponse => write!(f, "completion response contained no text"),
            Self::Timeout => write!(f, "completion request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid completion configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}
