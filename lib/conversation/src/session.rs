//! Per-user conversation sessions.
//!
//! A session holds the persona a user picked, what the next free-text
//! message means, and the last question asked. Sessions are created on a
//! user's first event and live for the lifetime of the process.
//!
//! The store keeps one lock per user. The map lock is only held long enough
//! to find or insert a user's slot, so work on one user's session never
//! waits on another's.

use chrono::{DateTime, Utc};
use relaybot_core::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// How the next free-text message from a user is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Free text is a question for the completion service.
    #[default]
    Question,
    /// Free text is the user's persona definition.
    Persona,
}

impl CaptureMode {
    /// Returns true if the next free text defines a persona.
    #[must_use]
    pub fn is_capturing_persona(&self) -> bool {
        matches!(self, Self::Persona)
    }
}

/// A user's conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The user who owns this session.
    pub user_id: UserId,
    /// The system prompt chosen by the user, if any.
    pub persona: Option<String>,
    /// What the next free-text message means.
    pub capture: CaptureMode,
    /// The most recent question, used to resolve follow-up actions.
    pub last_utterance: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last mutated.
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    /// Creates a fresh session: no persona, question mode, no history.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            persona: None,
            capture: CaptureMode::Question,
            last_utterance: None,
            created_at: now,
            last_active_at: now,
        }
    }

    /// Sets the persona and returns to question mode.
    pub fn set_persona(&mut self, persona: impl Into<String>) {
        self.persona = Some(persona.into());
        self.capture = CaptureMode::Question;
        self.last_active_at = Utc::now();
    }

    /// Interprets the next free-text message as a persona definition.
    pub fn begin_persona_capture(&mut self) {
        self.capture = CaptureMode::Persona;
        self.last_active_at = Utc::now();
    }

    /// Records the latest question.
    pub fn record_utterance(&mut self, text: impl Into<String>) {
        self.last_utterance = Some(text.into());
        self.last_active_at = Utc::now();
    }
}

/// Concurrency-safe map from user to session.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<UserId, Arc<Mutex<Session>>>>,
    default_persona: String,
}

impl SessionStore {
    /// Creates an empty store; `default_persona` is used for users who never
    /// picked one.
    #[must_use]
    pub fn new(default_persona: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_persona: default_persona.into(),
        }
    }

    /// Returns the slot for `user_id`, creating it on first access.
    fn slot(&self, user_id: UserId) -> Arc<Mutex<Session>> {
        if let Some(slot) = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
        {
            return Arc::clone(slot);
        }

        // Another event for the same user may have inserted in between;
        // `entry` keeps whichever slot got there first.
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            sessions
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(Session::new(user_id)))),
        )
    }

    /// Runs `f` with exclusive access to the user's session.
    fn with_session<R>(&self, user_id: UserId, f: impl FnOnce(&mut Session) -> R) -> R {
        let slot = self.slot(user_id);
        let mut session = slot.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut session)
    }

    /// Returns a snapshot of the user's session, creating it if needed.
    #[must_use]
    pub fn get_or_create(&self, user_id: UserId) -> Session {
        self.with_session(user_id, |s| s.clone())
    }

    /// Sets the user's persona and leaves persona capture.
    pub fn set_persona(&self, user_id: UserId, persona: impl Into<String>) {
        let persona = persona.into();
        self.with_session(user_id, |s| s.set_persona(persona));
    }

    /// Makes the user's next free-text message a persona definition.
    pub fn begin_persona_capture(&self, user_id: UserId) {
        self.with_session(user_id, Session::begin_persona_capture);
    }

    /// Overwrites the user's last question.
    pub fn record_utterance(&self, user_id: UserId, text: impl Into<String>) {
        let text = text.into();
        self.with_session(user_id, |s| s.record_utterance(text));
    }

    /// Returns the user's current capture mode.
    #[must_use]
    pub fn capture_mode(&self, user_id: UserId) -> CaptureMode {
        self.with_session(user_id, |s| s.capture)
    }

    /// Returns the user's last question, if any.
    #[must_use]
    pub fn last_utterance(&self, user_id: UserId) -> Option<String> {
        self.with_session(user_id, |s| s.last_utterance.clone())
    }

    /// Returns the persona to run the user's prompts under.
    #[must_use]
    pub fn effective_persona(&self, user_id: UserId) -> String {
        self.with_session(user_id, |s| {
            s.persona
                .clone()
                .unwrap_or_else(|| self.default_persona.clone())
        })
    }

    /// Returns the persona used for users who never picked one.
    #[must_use]
    pub fn default_persona(&self) -> &str {
        &self.default_persona
    }

    /// Returns the number of sessions created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no session has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const DEFAULT: &str = "default persona";

    #[test]
    fn fresh_session_has_no_state() {
        let store = SessionStore::new(DEFAULT);
        let session = store.get_or_create(UserId::new(1));

        assert_eq!(session.user_id, UserId::new(1));
        assert_eq!(session.persona, None);
        assert_eq!(session.capture, CaptureMode::Question);
        assert_eq!(session.last_utterance, None);
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let store = SessionStore::new(DEFAULT);
        let user = UserId::new(1);

        let first = store.get_or_create(user);
        let second = store.get_or_create(user);

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn set_persona_leaves_capture_mode() {
        let store = SessionStore::new(DEFAULT);
        let user = UserId::new(1);

        store.begin_persona_capture(user);
        assert!(store.capture_mode(user).is_capturing_persona());

        store.set_persona(user, "A stoic philosopher");

        let session = store.get_or_create(user);
        assert_eq!(session.persona.as_deref(), Some("A stoic philosopher"));
        assert_eq!(session.capture, CaptureMode::Question);
    }

    #[test]
    fn effective_persona_falls_back_to_default() {
        let store = SessionStore::new(DEFAULT);
        let user = UserId::new(1);

        assert_eq!(store.effective_persona(user), DEFAULT);

        store.set_persona(user, "Historian prompt");
        assert_eq!(store.effective_persona(user), "Historian prompt");
    }

    #[test]
    fn record_utterance_overwrites() {
        let store = SessionStore::new(DEFAULT);
        let user = UserId::new(1);

        store.record_utterance(user, "first");
        store.record_utterance(user, "second");

        assert_eq!(store.last_utterance(user).as_deref(), Some("second"));
    }

    #[test]
    fn sessions_are_isolated_between_users() {
        let store = SessionStore::new(DEFAULT);
        let alice = UserId::new(1);
        let bob = UserId::new(2);

        store.set_persona(alice, "Alice persona");
        store.record_utterance(alice, "Alice question");

        assert_eq!(store.effective_persona(bob), DEFAULT);
        assert_eq!(store.last_utterance(bob), None);
    }

    #[test]
    fn concurrent_first_access_creates_one_session() {
        let store = Arc::new(SessionStore::new(DEFAULT));
        let user = UserId::new(7);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.record_utterance(user, format!("q{i}")))
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread");
        }

        assert_eq!(store.len(), 1);
        assert!(store.last_utterance(user).is_some());
    }

    #[test]
    fn concurrent_users_never_see_each_other() {
        let store = Arc::new(SessionStore::new(DEFAULT));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let user = UserId::new(i);
                    for round in 0..50 {
                        store.set_persona(user, format!("persona-{i}"));
                        store.record_utterance(user, format!("question-{i}-{round}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread");
        }

        for i in 0..8 {
            let session = store.get_or_create(UserId::new(i));
            assert_eq!(session.persona, Some(format!("persona-{i}")));
            assert_eq!(session.last_utterance, Some(format!("question-{i}-49")));
        }
    }
}
