//! Telegram Bot API transport for relaybot.
//!
//! This crate is the only place that knows about Telegram. It provides:
//!
//! - **Client**: a thin typed wrapper over the Bot API HTTP methods
//! - **Intake**: classification of raw updates into relay events
//! - **Transport**: delivery of relay replies, including keyboards
//! - **Polling** and **Webhook**: the two ways updates reach the relay

pub mod client;
pub mod error;
pub mod intake;
pub mod polling;
pub mod transport;
pub mod types;
pub mod webhook;

pub use client::BotClient;
pub use error::TelegramError;
pub use intake::{UpdateIntake, classify};
pub use polling::run_polling;
pub use transport::TelegramTransport;
pub use types::Update;
pub use webhook::{WebhookState, webhook_router};
