//! The chat transport seam.
//!
//! The router hands finished replies to a [`ChatTransport`]; how they reach
//! the user is the transport's business. Keyboards are described in terms of
//! the relay's own [`Action`]s and persona labels so the core never builds
//! transport markup.

use crate::error::TransportError;
use crate::event::Action;
use async_trait::async_trait;
use relaybot_core::ChatId;
use rootcause::prelude::Report;
use std::sync::{Mutex, PoisonError};

/// Buttons attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Buttons under the message that report an [`Action`] when pressed.
    Actions(Vec<Action>),
    /// A menu replacing the user's keyboard; pressing an entry sends its
    /// text as a message.
    Choices(Vec<String>),
    /// Take away whatever menu the user currently has.
    Remove,
}

/// A reply on its way to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Message body.
    pub text: String,
    /// Buttons to attach, if any.
    pub keyboard: Option<Keyboard>,
}

impl OutboundMessage {
    /// Creates a plain message.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    /// Attaches action buttons.
    #[must_use]
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.keyboard = Some(Keyboard::Actions(actions.into_iter().collect()));
        self
    }

    /// Attaches a menu of choices.
    #[must_use]
    pub fn with_choices<S: Into<String>>(mut self, choices: impl IntoIterator<Item = S>) -> Self {
        self.keyboard = Some(Keyboard::Choices(
            choices.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Removes the user's current menu.
    #[must_use]
    pub fn removing_keyboard(mut self) -> Self {
        self.keyboard = Some(Keyboard::Remove);
        self
    }

    /// Returns the attached action buttons, or an empty slice.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        match &self.keyboard {
            Some(Keyboard::Actions(actions)) => actions,
            _ => &[],
        }
    }
}

/// Delivers messages to chat participants.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Delivers `message` to `chat`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport did not accept the message. The
    /// caller does not retry.
    async fn deliver(
        &self,
        chat: ChatId,
        message: &OutboundMessage,
    ) -> Result<(), Report<TransportError>>;
}

/// A transport that keeps every delivered message in memory.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    delivered: Mutex<Vec<(ChatId, OutboundMessage)>>,
    reject_all: bool,
}

impl RecordingTransport {
    /// Creates a transport that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that records and then rejects every delivery.
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            reject_all: true,
        }
    }

    /// Returns everything delivered so far, in order.
    #[must_use]
    pub fn delivered(&self) -> Vec<(ChatId, OutboundMessage)> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the messages delivered to `chat`, in order.
    #[must_use]
    pub fn delivered_to(&self, chat: ChatId) -> Vec<OutboundMessage> {
        self.delivered()
            .into_iter()
            .filter(|(c, _)| *c == chat)
            .map(|(_, m)| m)
            .collect()
    }

    /// Returns the last message delivered to `chat`.
    #[must_use]
    pub fn last_to(&self, chat: ChatId) -> Option<OutboundMessage> {
        self.delivered_to(chat).pop()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn deliver(
        &self,
        chat: ChatId,
        message: &OutboundMessage,
    ) -> Result<(), Report<TransportError>> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((chat, message.clone()));

        if self.reject_all {
            return Err(TransportError::Rejected {
                chat,
                reason: "recording transport rejects everything".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_keyboard() {
        let message = OutboundMessage::text("hi").with_actions(Action::FOLLOW_UPS);
        assert_eq!(message.actions(), &[Action::Continue, Action::Regenerate]);

        let menu = OutboundMessage::text("pick").with_choices(["A", "B"]);
        assert_eq!(
            menu.keyboard,
            Some(Keyboard::Choices(vec!["A".to_string(), "B".to_string()]))
        );
        assert!(menu.actions().is_empty());

        let cleared = OutboundMessage::text("bye").removing_keyboard();
        assert_eq!(cleared.keyboard, Some(Keyboard::Remove));
    }

    #[tokio::test]
    async fn recording_transport_keeps_order_per_chat() {
        let transport = RecordingTransport::new();
        let a = ChatId::new(1);
        let b = ChatId::new(2);

        transport.deliver(a, &OutboundMessage::text("one")).await.unwrap();
        transport.deliver(b, &OutboundMessage::text("other")).await.unwrap();
        transport.deliver(a, &OutboundMessage::text("two")).await.unwrap();

        let texts: Vec<_> = transport.delivered_to(a).into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(transport.last_to(b).unwrap().text, "other");
    }

    #[tokio::test]
    async fn rejecting_transport_still_records() {
        let transport = RecordingTransport::rejecting();
        let chat = ChatId::new(1);

        let result = transport.deliver(chat, &OutboundMessage::text("lost")).await;

        assert!(result.is_err());
        assert_eq!(transport.delivered().len(), 1);
    }
}
