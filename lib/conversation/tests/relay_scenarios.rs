//! End-to-end conversations through the dispatcher.

use relaybot_ai::ScriptedCompletionClient;
use relaybot_conversation::{
    Action, ChatTransport, Command, Dispatcher, EventKind, EventRouter, InboundEvent, Keyboard,
    PersonaCatalog, RecordingTransport, RelayTexts, Route, SessionStore, continuation_prompt,
};
use relaybot_core::{ChatId, UserId};
use std::sync::Arc;

const DEFAULT_PERSONA: &str =
    "A scientist who knows every way to earn money and understands how to work with people";

struct Relay {
    dispatcher: Dispatcher,
    completion: Arc<ScriptedCompletionClient>,
    transport: Arc<RecordingTransport>,
}

impl Relay {
    fn new(completion: ScriptedCompletionClient) -> Self {
        let completion = Arc::new(completion);
        let transport = Arc::new(RecordingTransport::new());
        let transport_dyn: Arc<dyn ChatTransport> = transport.clone();
        let router = EventRouter::new(
            Arc::new(SessionStore::new(DEFAULT_PERSONA)),
            Arc::new(PersonaCatalog::curated()),
            completion.clone(),
            transport_dyn,
            RelayTexts::default(),
        );
        Self {
            dispatcher: Dispatcher::new(Arc::new(router)),
            completion,
            transport,
        }
    }

    async fn send(&self, user: i64, kind: EventKind) -> Route {
        self.dispatcher
            .dispatch_and_wait(InboundEvent::new(UserId::new(user), ChatId::new(user), kind))
            .await
            .expect("event handled")
    }

    async fn say(&self, user: i64, text: &str) -> Route {
        self.send(user, EventKind::Text(text.to_string())).await
    }
}

#[tokio::test]
async fn full_persona_and_continue_flow() {
    let relay = Relay::new(ScriptedCompletionClient::new());
    let chat = ChatId::new(1);
    let historian = PersonaCatalog::curated()
        .resolve("Historian")
        .expect("curated")
        .to_string();

    assert_eq!(relay.send(1, EventKind::Command(Command::Start)).await, Route::Start);
    let greeting = relay.transport.last_to(chat).expect("greeting");
    assert_eq!(greeting.text, RelayTexts::default().greeting);
    assert!(matches!(greeting.keyboard, Some(Keyboard::Choices(_))));

    assert_eq!(
        relay.send(1, EventKind::Action(Action::SetPersona)).await,
        Route::ShowPersonaMenu
    );
    let Some(Keyboard::Choices(labels)) = relay.transport.last_to(chat).expect("menu").keyboard
    else {
        panic!("expected persona menu");
    };
    assert!(labels.iter().any(|l| l == "Historian"));

    relay
        .send(1, EventKind::PersonaChoice("Historian".to_string()))
        .await;
    let session = relay
        .dispatcher
        .router()
        .sessions()
        .get_or_create(UserId::new(1));
    assert_eq!(session.persona.as_deref(), Some(historian.as_str()));

    relay.say(1, "What caused the fall of Rome?").await;
    relay.send(1, EventKind::Action(Action::Continue)).await;

    let requests = relay.completion.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].system.as_deref(), Some(historian.as_str()));
    assert_eq!(requests[0].prompt, "What caused the fall of Rome?");
    assert_eq!(requests[1].system.as_deref(), Some(historian.as_str()));
    assert_eq!(
        requests[1].prompt,
        continuation_prompt("What caused the fall of Rome?")
    );
    assert!(requests[1].prompt.contains("What caused the fall of Rome?"));

    let answer = relay.transport.last_to(chat).expect("answer");
    assert_eq!(answer.actions(), &Action::FOLLOW_UPS);
}

#[tokio::test]
async fn question_without_persona_uses_default() {
    let relay = Relay::new(ScriptedCompletionClient::new());

    relay.say(5, "How do I start a business?").await;

    let requests = relay.completion.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].system.as_deref(), Some(DEFAULT_PERSONA));
}

#[tokio::test]
async fn typed_persona_replaces_default_for_later_questions() {
    let relay = Relay::new(ScriptedCompletionClient::new());

    relay.send(3, EventKind::Action(Action::CustomPersona)).await;
    assert_eq!(
        relay.say(3, "A patient chess coach").await,
        Route::CapturePersona("A patient chess coach".to_string())
    );
    assert_eq!(
        relay.say(3, "How should I open?").await,
        Route::Ask("How should I open?".to_string())
    );

    let requests = relay.completion.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].system.as_deref(), Some("A patient chess coach"));
}

#[tokio::test]
async fn continue_before_any_question_is_answered_neutrally() {
    let relay = Relay::new(ScriptedCompletionClient::new());

    let route = relay.send(9, EventKind::Action(Action::Continue)).await;

    assert_eq!(route, Route::Continue);
    assert!(relay.completion.requests().is_empty());
    assert_eq!(
        relay.transport.last_to(ChatId::new(9)).expect("reply").text,
        RelayTexts::default().no_context
    );
}

#[tokio::test]
async fn failure_for_one_user_leaves_others_working() {
    let relay = Relay::new(ScriptedCompletionClient::new().failing_on("explode"));

    relay.say(1, "please explode").await;
    relay.say(2, "a normal question").await;
    relay.say(1, "and now a normal one").await;

    assert_eq!(
        relay.transport.delivered_to(ChatId::new(1))[0].text,
        RelayTexts::default().apology
    );
    assert_eq!(
        relay.transport.last_to(ChatId::new(2)).expect("reply").text,
        ScriptedCompletionClient::reply_for("a normal question")
    );
    assert_eq!(
        relay.transport.last_to(ChatId::new(1)).expect("reply").text,
        ScriptedCompletionClient::reply_for("and now a normal one")
    );
}

#[tokio::test]
async fn concurrent_users_keep_separate_state() {
    let relay = Arc::new(Relay::new(ScriptedCompletionClient::new()));

    let tasks: Vec<_> = (1..=4)
        .map(|user| {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move {
                relay.send(user, EventKind::Action(Action::CustomPersona)).await;
                relay.say(user, &format!("persona {user}")).await;
                relay.say(user, &format!("question {user}")).await;
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("join");
    }

    let sessions = relay.dispatcher.router().sessions();
    for user in 1..=4 {
        let session = sessions.get_or_create(UserId::new(user));
        assert_eq!(session.persona, Some(format!("persona {user}")));
        assert_eq!(session.last_utterance, Some(format!("question {user}")));
    }
    for request in relay.completion.requests() {
        let user = request.prompt.trim_start_matches("question ");
        assert_eq!(request.system, Some(format!("persona {user}")));
    }
}

#[tokio::test]
async fn typed_follow_up_label_is_a_question() {
    let relay = Relay::new(ScriptedCompletionClient::new());

    let route = relay.say(4, "Continue").await;

    assert_eq!(route, Route::Ask("Continue".to_string()));
    let prompts: Vec<_> = relay
        .completion
        .requests()
        .into_iter()
        .map(|r| r.prompt)
        .collect();
    assert_eq!(prompts, vec!["Continue"]);
    assert_eq!(
        relay.transport.last_to(ChatId::new(4)).expect("reply").text,
        "answer to: Continue"
    );
}

#[tokio::test]
async fn typed_follow_up_label_during_capture_becomes_persona() {
    let relay = Relay::new(ScriptedCompletionClient::new());

    relay.send(5, EventKind::Action(Action::CustomPersona)).await;
    let route = relay.say(5, "Another answer").await;

    assert_eq!(route, Route::CapturePersona("Another answer".to_string()));
    relay.say(5, "Who are you?").await;
    assert_eq!(
        relay.completion.requests()[0].system.as_deref(),
        Some("Another answer")
    );
}

#[tokio::test]
async fn menu_entry_during_capture_keeps_capturing() {
    let relay = Relay::new(ScriptedCompletionClient::new());

    relay.send(6, EventKind::Action(Action::CustomPersona)).await;
    assert_eq!(relay.send(6, EventKind::Action(Action::Help)).await, Route::Help);
    assert_eq!(
        relay.say(6, "A gardener").await,
        Route::CapturePersona("A gardener".to_string())
    );
    assert!(relay.completion.requests().is_empty());
}
