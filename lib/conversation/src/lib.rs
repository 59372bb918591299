//! Conversation core for relaybot.
//!
//! This crate provides:
//!
//! - **Persona Catalog**: curated labels and their system prompts
//! - **Session Store**: per-user persona, capture mode and last question
//! - **Event Router**: the priority chain that turns inbound events into replies
//! - **Dispatcher**: per-user queues so one user's events stay ordered while
//!   different users run concurrently
//! - **Transport seam**: what the router needs from a chat front-end

pub mod dispatch;
pub mod error;
pub mod event;
pub mod persona;
pub mod router;
pub mod session;
pub mod transport;

pub use dispatch::Dispatcher;
pub use error::TransportError;
pub use event::{Action, Command, EventKind, InboundEvent};
pub use persona::{PersonaCatalog, PersonaEntry};
pub use router::{EventRouter, RelayTexts, Route, continuation_prompt};
pub use session::{CaptureMode, Session, SessionStore};
pub use transport::{ChatTransport, Keyboard, OutboundMessage, RecordingTransport};
