//! Event routing.
//!
//! Every inbound event resolves to exactly one [`Route`]. Resolution is a
//! fixed priority chain over the event kind and the user's capture mode,
//! first match wins:
//!
//! 1. `/start`
//! 2. "Set persona" (and "Custom persona")
//! 3. text that is a catalog label
//! 4. any text while a persona is being captured
//! 5. "Stop"
//! 6. "Help"
//! 7. follow-ups on the last answer ("Continue", "Another answer")
//! 8. any other text, which is a question
//!
//! Labels must be checked before capture so picking "Historian" from the
//! menu stores the curated prompt rather than the word, and capture must be
//! checked before questions so a persona is never sent upstream as a prompt.

use crate::event::{Action, Command, EventKind, InboundEvent};
use crate::persona::PersonaCatalog;
use crate::session::{CaptureMode, SessionStore};
use crate::transport::{ChatTransport, OutboundMessage};
use relaybot_ai::{CompletionClient, CompletionRequest};
use relaybot_core::{ChatId, UserId};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Builds the prompt sent when a user asks to continue the last answer.
#[must_use]
pub fn continuation_prompt(last_utterance: &str) -> String {
    format!("what would you say next on the topic: {last_utterance}?")
}

/// What the router decided to do with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Greet the user and show the main menu.
    Start,
    /// Show the persona selection menu.
    ShowPersonaMenu,
    /// Ask the user to type a persona.
    BeginPersonaCapture,
    /// Use a curated persona.
    SelectPersona { label: String, persona: String },
    /// Use the text the user typed as persona.
    CapturePersona(String),
    /// Acknowledge and hide the menu.
    Stop,
    /// Show the help text.
    Help,
    /// Generate the next part of the last answer.
    Continue,
    /// Ask the last question again.
    Regenerate,
    /// Answer a question.
    Ask(String),
}

impl Route {
    /// Resolves an event kind against the user's capture mode.
    #[must_use]
    pub fn resolve(kind: &EventKind, capture: CaptureMode, catalog: &PersonaCatalog) -> Self {
        match kind {
            // 1. start
            EventKind::Command(Command::Start) => Self::Start,
            // 2. persona menu
            EventKind::Command(Command::Persona) | EventKind::Action(Action::SetPersona) => {
                Self::ShowPersonaMenu
            }
            EventKind::Action(Action::CustomPersona) => Self::BeginPersonaCapture,
            // Text-carrying events only ever match steps 3, 4 or 8, so those
            // are decided together here, in that order.
            EventKind::PersonaChoice(text) | EventKind::Text(text) => {
                match catalog.resolve(text) {
                    Some(persona) => Self::SelectPersona {
                        label: text.trim().to_string(),
                        persona: persona.to_string(),
                    },
                    None if capture.is_capturing_persona() => Self::CapturePersona(text.clone()),
                    None => Self::Ask(text.clone()),
                }
            }
            // 5. stop
            EventKind::Command(Command::Stop) | EventKind::Action(Action::Stop) => Self::Stop,
            // 6. help
            EventKind::Command(Command::Help) | EventKind::Action(Action::Help) => Self::Help,
            // 7. follow-ups
            EventKind::Action(Action::Continue) => Self::Continue,
            EventKind::Action(Action::Regenerate) => Self::Regenerate,
        }
    }
}

/// Fixed reply texts.
///
/// Every field has a default so a deployment only overrides what it wants.
/// `persona_set` may contain `{persona}`, replaced with the label picked or
/// the text typed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayTexts {
    /// Reply to a user's first `/start`.
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Reply to `/start` from a user seen before.
    #[serde(default = "default_returning_greeting")]
    pub returning_greeting: String,

    /// Shown above the persona selection menu.
    #[serde(default = "default_persona_menu")]
    pub persona_menu: String,

    /// Asks the user to type a persona.
    #[serde(default = "default_custom_persona_prompt")]
    pub custom_persona_prompt: String,

    /// Confirms a persona change.
    #[serde(default = "default_persona_set")]
    pub persona_set: String,

    /// Acknowledges "Stop".
    #[serde(default = "default_stopped")]
    pub stopped: String,

    /// Help text.
    #[serde(default = "default_help")]
    pub help: String,

    /// Reply to a follow-up when there is nothing to follow up on.
    #[serde(default = "default_no_context")]
    pub no_context: String,

    /// Reply when the completion service fails.
    #[serde(default = "default_apology")]
    pub apology: String,
}

fn default_greeting() -> String {
    "Hello! Pick a persona for the bot, or just ask a question.".to_string()
}

fn default_returning_greeting() -> String {
    "Welcome back! Your persona is still set, ask away.".to_string()
}

fn default_persona_menu() -> String {
    "Choose a persona, or pick \"Custom persona\" to describe your own.".to_string()
}

fn default_custom_persona_prompt() -> String {
    "Describe the persona the bot should take on.".to_string()
}

fn default_persona_set() -> String {
    "Persona set to: {persona}. You can start the conversation now!".to_string()
}

fn default_stopped() -> String {
    "Bot stopped!".to_string()
}

fn default_help() -> String {
    "Send any message and the bot answers it in its current persona.\n\
     /start shows the menu, /persona changes the persona, /stop hides the menu.\n\
     Under every answer, \"Continue\" asks for more on the same topic and \
     \"Another answer\" asks the same question again."
        .to_string()
}

fn default_no_context() -> String {
    "There is nothing to continue yet. Ask a question first.".to_string()
}

fn default_apology() -> String {
    "Sorry, I couldn't get an answer right now. Please try again later.".to_string()
}

impl Default for RelayTexts {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            returning_greeting: default_returning_greeting(),
            persona_menu: default_persona_menu(),
            custom_persona_prompt: default_custom_persona_prompt(),
            persona_set: default_persona_set(),
            stopped: default_stopped(),
            help: default_help(),
            no_context: default_no_context(),
            apology: default_apology(),
        }
    }
}

impl RelayTexts {
    fn persona_confirmation(&self, persona: &str) -> String {
        self.persona_set.replace("{persona}", persona)
    }
}

/// Routes inbound events to replies.
pub struct EventRouter {
    sessions: Arc<SessionStore>,
    catalog: Arc<PersonaCatalog>,
    completion: Arc<dyn CompletionClient>,
    transport: Arc<dyn ChatTransport>,
    texts: RelayTexts,
    known_users: Mutex<HashSet<UserId>>,
}

impl EventRouter {
    /// Creates a new router.
    pub fn new(
        sessions: Arc<SessionStore>,
        catalog: Arc<PersonaCatalog>,
        completion: Arc<dyn CompletionClient>,
        transport: Arc<dyn ChatTransport>,
        texts: RelayTexts,
    ) -> Self {
        Self {
            sessions,
            catalog,
            completion,
            transport,
            texts,
            known_users: Mutex::new(HashSet::new()),
        }
    }

    /// Returns the session store.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Returns the persona catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<PersonaCatalog> {
        &self.catalog
    }

    /// Handles one event: resolves its route, applies it and delivers the
    /// reply. Never fails; problems are logged and answered in the chat.
    #[instrument(skip(self, event), fields(user = %event.user, chat = %event.chat))]
    pub async fn handle(&self, event: InboundEvent) -> Route {
        let capture = self.sessions.get_or_create(event.user).capture;
        let route = Route::resolve(&event.kind, capture, &self.catalog);
        debug!(?route, ?capture, "routing event");

        let reply = self.apply(event.user, &route).await;
        self.deliver(event.chat, &reply).await;
        route
    }

    async fn apply(&self, user: UserId, route: &Route) -> OutboundMessage {
        match route {
            Route::Start => {
                let first_time = self
                    .known_users
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(user);
                let text = if first_time {
                    &self.texts.greeting
                } else {
                    &self.texts.returning_greeting
                };
                self.main_menu(text)
            }
            Route::ShowPersonaMenu => {
                let mut choices: Vec<String> =
                    self.catalog.labels().into_iter().map(String::from).collect();
                choices.push(Action::CustomPersona.label().to_string());
                OutboundMessage::text(&self.texts.persona_menu).with_choices(choices)
            }
            Route::BeginPersonaCapture => {
                self.sessions.begin_persona_capture(user);
                OutboundMessage::text(&self.texts.custom_persona_prompt).removing_keyboard()
            }
            Route::SelectPersona { label, persona } => {
                self.sessions.set_persona(user, persona.as_str());
                info!(persona = %label, "persona selected from catalog");
                self.main_menu(&self.texts.persona_confirmation(label))
            }
            Route::CapturePersona(text) => {
                self.sessions.set_persona(user, text.as_str());
                info!("custom persona set");
                self.main_menu(&self.texts.persona_confirmation(text))
            }
            Route::Stop => OutboundMessage::text(&self.texts.stopped).removing_keyboard(),
            Route::Help => OutboundMessage::text(&self.texts.help),
            Route::Continue => match self.sessions.last_utterance(user) {
                Some(last) => self.generate(user, continuation_prompt(&last)).await,
                None => OutboundMessage::text(&self.texts.no_context),
            },
            Route::Regenerate => match self.sessions.last_utterance(user) {
                Some(last) => self.generate(user, last).await,
                None => OutboundMessage::text(&self.texts.no_context),
            },
            Route::Ask(question) => {
                self.sessions.record_utterance(user, question.as_str());
                self.generate(user, question.clone()).await
            }
        }
    }

    fn main_menu(&self, text: &str) -> OutboundMessage {
        OutboundMessage::text(text).with_choices(Action::MAIN_MENU.map(|a| a.label()))
    }

    async fn generate(&self, user: UserId, prompt: String) -> OutboundMessage {
        let persona = self.sessions.effective_persona(user);
        let request = CompletionRequest::new(prompt).with_system(persona);

        match self.completion.complete(&request).await {
            Ok(response) => {
                debug!(completion = %request.id, model = %response.model, "completion succeeded");
                OutboundMessage::text(response.content).with_actions(Action::FOLLOW_UPS)
            }
            Err(e) => {
                warn!(completion = %request.id, error = %e, "completion failed");
                OutboundMessage::text(&self.texts.apology)
            }
        }
    }

    async fn deliver(&self, chat: ChatId, message: &OutboundMessage) {
        if let Err(e) = self.transport.deliver(chat, message).await {
            warn!(%chat, error = %e, "failed to deliver reply");
        }
    }
}
