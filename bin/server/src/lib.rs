//! relaybot server.
//!
//! Wires the conversation core to the OpenAI-compatible completion client
//! and the Telegram transport, and runs the update loop.

pub mod app;
pub mod config;
pub mod error;
