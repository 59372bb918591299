//! Core types and utilities for the relaybot conversational relay.
//!
//! This crate provides the foundational identifiers and error handling
//! shared by the completion, conversation and transport crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ChatId, CompletionId, ParseIdError, UserId};
