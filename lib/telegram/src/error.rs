//! Error types for the Telegram transport.

use std::fmt;

/// Errors from Bot API calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelegramError {
    /// The HTTP request itself failed.
    Http { method: String, reason: String },
    /// The Bot API answered with `ok: false`.
    Api {
        method: String,
        code: Option<i64>,
        description: String,
        retry_after_secs: Option<u64>,
    },
    /// The response body was not what the method returns.
    Decode { method: String, reason: String },
    /// The client could not be configured.
    Config { reason: String },
}

impl TelegramError {
    /// Returns how long the API asked us to back off, if it did.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Api {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

impl fmt::Display for TelegramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { method, reason } => write!(f, "{method} request failed: {reason}"),
            Self::Api {
                method,
                code,
                description,
                ..
            } => match code {
                Some(code) => write!(f, "{method} rejected ({code}): {description}"),
                None => write!(f, "{method} rejected: {description}"),
            },
            Self::Decode { method, reason } => {
                write!(f, "failed to decode {method} response: {reason}")
            }
            Self::Config { reason } => write!(f, "invalid telegram configuration: {reason}"),
        }
    }
}

impl std::error::Error for TelegramError {}
