//! Inbound events.
//!
//! The transport adapter classifies every update it receives exactly once
//! into an [`EventKind`]. The router never inspects raw transport payloads.

use relaybot_core::{ChatId, UserId};
use serde::{Deserialize, Serialize};

/// An event from a chat participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Who sent it.
    pub user: UserId,
    /// Where it was sent from; replies go back here.
    pub chat: ChatId,
    /// What it is.
    pub kind: EventKind,
}

impl InboundEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(user: UserId, chat: ChatId, kind: EventKind) -> Self {
        Self { user, chat, kind }
    }
}

/// Classification of an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum EventKind {
    /// A slash command.
    Command(Command),
    /// A persona label picked from the selection menu.
    PersonaChoice(String),
    /// A button press, either a menu entry or a follow-up on an answer.
    Action(Action),
    /// Anything else the user typed.
    Text(String),
}

/// Slash commands understood by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// `/start`
    Start,
    /// `/persona`, same as pressing "Set persona".
    Persona,
    /// `/help`
    Help,
    /// `/stop`
    Stop,
}

impl Command {
    /// Parses a command from message text.
    ///
    /// Accepts `/name`, `/name@botname` and trailing arguments, which are
    /// ignored. Returns `None` for unknown commands and for non-command text.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "persona" | "role" => Some(Self::Persona),
            "help" => Some(Self::Help),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Buttons the relay attaches to its messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Open the persona selection menu.
    SetPersona,
    /// Type a persona instead of picking one.
    CustomPersona,
    /// Hide the menu.
    Stop,
    /// Show the help text.
    Help,
    /// Ask for the next part of the last answer.
    Continue,
    /// Ask the last question again.
    Regenerate,
}

impl Action {
    /// Entries of the main menu, in display order.
    pub const MAIN_MENU: [Self; 3] = [Self::SetPersona, Self::Help, Self::Stop];

    /// Entries of the reply-keyboard menus, whose text comes back as a message.
    const MENU_ENTRIES: [Self; 4] = [
        Self::SetPersona,
        Self::CustomPersona,
        Self::Help,
        Self::Stop,
    ];

    /// Follow-ups attached to every generated answer.
    pub const FOLLOW_UPS: [Self; 2] = [Self::Continue, Self::Regenerate];

    const ALL: [Self; 6] = [
        Self::SetPersona,
        Self::CustomPersona,
        Self::Stop,
        Self::Help,
        Self::Continue,
        Self::Regenerate,
    ];

    /// Text shown on the button.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::SetPersona => "Set persona",
            Self::CustomPersona => "Custom persona",
            Self::Stop => "Stop",
            Self::Help => "Help",
            Self::Continue => "Continue",
            Self::Regenerate => "Another answer",
        }
    }

    /// Opaque payload carried by inline buttons.
    #[must_use]
    pub fn callback_data(&self) -> &'static str {
        match self {
            Self::SetPersona => "set_persona",
            Self::CustomPersona => "custom_persona",
            Self::Stop => "stop",
            Self::Help => "help",
            Self::Continue => "continue",
            Self::Regenerate => "regenerate",
        }
    }

    /// Finds the action whose callback payload is `data`.
    #[must_use]
    pub fn from_callback_data(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.callback_data() == data)
    }

    /// Finds the menu entry whose text is `text`.
    ///
    /// Menu entries arrive as ordinary messages, so only they are matched.
    /// Follow-ups are inline buttons and only ever arrive as callback data;
    /// typing "Continue" is a question, not a follow-up.
    #[must_use]
    pub fn from_menu_label(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::MENU_ENTRIES.into_iter().find(|a| a.label() == text)
    }
}
