//! Turning Bot API updates into relay events.

use crate::client::BotClient;
use crate::types::Update;
use relaybot_conversation::{Action, Command, Dispatcher, EventKind, InboundEvent, PersonaCatalog};
use relaybot_core::{ChatId, UserId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Classifies an update into a relay event.
///
/// Message text is checked in this order: slash command, reply-menu entry,
/// persona label, then free text. Follow-ups only come from callback data. Callback queries map their payload to an
/// [`Action`]. Updates from bots, updates without a sender, blank text and
/// unknown callback payloads yield `None`.
#[must_use]
pub fn classify(update: &Update, catalog: &PersonaCatalog) -> Option<InboundEvent> {
    if let Some(query) = &update.callback_query {
        if query.from.is_bot {
            return None;
        }
        let action = Action::from_callback_data(query.data.as_deref()?)?;
        // Private chats share the user's id, so fall back to it when the
        // button's message is not included.
        let chat = query
            .message
            .as_ref()
            .map_or(query.from.id, |message| message.chat.id);
        return Some(InboundEvent::new(
            UserId::new(query.from.id),
            ChatId::new(chat),
            EventKind::Action(action),
        ));
    }

    let message = update.message.as_ref()?;
    let from = message.from.as_ref().filter(|user| !user.is_bot)?;
    let text = message.text.as_deref()?;
    if text.trim().is_empty() {
        return None;
    }

    let kind = if let Some(command) = Command::parse(text) {
        EventKind::Command(command)
    } else if let Some(action) = Action::from_menu_label(text) {
        EventKind::Action(action)
    } else if catalog.resolve(text).is_some() {
        EventKind::PersonaChoice(text.trim().to_string())
    } else {
        EventKind::Text(text.to_string())
    };

    Some(InboundEvent::new(
        UserId::new(from.id),
        ChatId::new(message.chat.id),
        kind,
    ))
}

/// Entry point for updates, whichever way they arrive.
///
/// Pressed inline buttons are acknowledged right away, then the update is
/// classified and queued on the dispatcher.
pub struct UpdateIntake {
    client: Arc<BotClient>,
    dispatcher: Arc<Dispatcher>,
}

impl UpdateIntake {
    #[must_use]
    pub fn new(client: Arc<BotClient>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { client, dispatcher }
    }

    /// Accepts one update.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn accept(&self, update: Update) {
        if let Some(query) = &update.callback_query {
            let client = Arc::clone(&self.client);
            let query_id = query.id.clone();
            tokio::spawn(async move {
                if let Err(error) = client.answer_callback_query(&query_id).await {
                    warn!(%error, "failed to acknowledge button press");
                }
            });
        }

        match classify(&update, self.dispatcher.router().catalog()) {
            Some(event) => self.dispatcher.dispatch(event),
            None => debug!(update_id = update.update_id, "ignoring update"),
        }
    }
}
