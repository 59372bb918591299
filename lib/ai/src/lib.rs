//! Completion service primitives for relaybot.
//!
//! This crate provides the single AI operation the relay needs: a
//! single-shot completion of a user prompt under a system prompt (the
//! persona). It contains:
//!
//! - **Backend**: the `CompletionClient` seam and its request/response types
//! - **OpenAI**: an HTTP client for OpenAI-compatible chat completion APIs
//! - **Scripted**: a deterministic in-memory client for tests

pub mod backend;
pub mod error;
pub mod openai;
pub mod scripted;

pub use backend::{CompletionClient, CompletionRequest, CompletionResponse, TokenUsage};
pub use error::LlmError;
pub use openai::{OpenAiClient, OpenAiConfig};
pub use scripted::ScriptedCompletionClient;
