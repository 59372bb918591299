//! Domain error types for server startup and operation.

use std::fmt;

/// Errors that stop the relay.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration is missing or invalid.
    Config { reason: String },
    /// A component could not be constructed.
    Setup { component: &'static str, reason: String },
    /// Registering the webhook or removing it failed.
    Telegram { reason: String },
    /// The webhook listener could not bind.
    Bind { addr: String, reason: String },
    /// The webhook server stopped with an error.
    Serve { reason: String },
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { reason } => write!(f, "invalid configuration: {reason}"),
            Self::Setup { component, reason } => {
                write!(f, "failed to set up {component}: {reason}")
            }
            Self::Telegram { reason } => write!(f, "telegram error: {reason}"),
            Self::Bind { addr, reason } => write!(f, "failed to bind {addr}: {reason}"),
            Self::Serve { reason } => write!(f, "webhook server failed: {reason}"),
        }
    }
}

impl std::error::Error for ServerError {}
