//! Error types for the conversation crate.
//!
//! The router itself never fails: completion failures become an apology
//! reply and missing context becomes a neutral reply. The only error that
//! crosses a seam here is a failed delivery, which is logged by the router.

use relaybot_core::ChatId;
use std::fmt;

/// Errors reported by a chat transport when delivering a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport could not be reached.
    Unreachable { reason: String },
    /// The transport rejected the message.
    Rejected { chat: ChatId, reason: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable { reason } => write!(f, "chat transport unreachable: {reason}"),
            Self::Rejected { chat, reason } => {
                write!(f, "delivery to {chat} rejected: {reason}")
            }
        }
    }
}

impl std::error::Error for TransportError {}
