//! Per-user event dispatch.
//!
//! Each user gets a queue and a worker task that feeds the router one event
//! at a time, so a user's events are applied in arrival order. Workers for
//! different users run concurrently; a slow completion for one user never
//! holds up another. A worker with nothing to do for a while retires, and the
//! user's next event starts a new one.

use crate::event::InboundEvent;
use crate::router::{EventRouter, Route};
use relaybot_core::UserId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

/// How long a worker waits for its next event before retiring.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(25);

type Job = (InboundEvent, Option<oneshot::Sender<Route>>);
type Queues = Mutex<HashMap<UserId, mpsc::UnboundedSender<Job>>>;

/// State shared between the dispatcher and its workers.
struct Shared {
    queues: Queues,
    /// Events queued or being handled.
    pending: AtomicUsize,
}

/// Fans inbound events out to per-user workers.
pub struct Dispatcher {
    router: Arc<EventRouter>,
    shared: Arc<Shared>,
    idle_timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher in front of `router`.
    #[must_use]
    pub fn new(router: Arc<EventRouter>) -> Self {
        Self {
            router,
            shared: Arc::new(Shared {
                queues: Mutex::new(HashMap::new()),
                pending: AtomicUsize::new(0),
            }),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Retires workers that have been idle for `idle_timeout`.
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Returns the router events are dispatched to.
    #[must_use]
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    /// Queues an event without waiting for it to be handled.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, event: InboundEvent) {
        self.enqueue((event, None));
    }

    /// Queues an event and waits until it has been handled.
    ///
    /// Returns `None` if the worker went away before handling it.
    pub async fn dispatch_and_wait(&self, event: InboundEvent) -> Option<Route> {
        let (tx, rx) = oneshot::channel();
        self.enqueue((event, Some(tx)));
        rx.await.ok()
    }

    /// Returns the number of users with a worker.
    #[must_use]
    pub fn active_users(&self) -> usize {
        self.shared
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns the number of events queued or being handled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Waits for queued and in-flight events to finish, up to `grace`.
    ///
    /// Returns the number of events still pending when it gave up, zero when
    /// everything finished.
    pub async fn drain(&self, grace: Duration) -> usize {
        let deadline = Instant::now() + grace;
        loop {
            let pending = self.pending();
            if pending == 0 || Instant::now() >= deadline {
                return pending;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }

    fn enqueue(&self, job: Job) {
        let user = job.0.user;
        let mut queues = self
            .shared
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.shared.pending.fetch_add(1, Ordering::AcqRel);

        let job = match queues.get(&user) {
            Some(queue) => match queue.send(job) {
                Ok(()) => return,
                // The worker died (a panic while handling an earlier event);
                // start a fresh one below.
                Err(mpsc::error::SendError(job)) => {
                    warn!(%user, "event worker gone, restarting");
                    job
                }
            },
            None => job,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive until the spawn below, so this cannot fail.
        let _ = tx.send(job);
        queues.insert(user, tx);
        debug!(%user, "starting event worker");
        tokio::spawn(run_worker(
            Arc::clone(&self.router),
            Arc::clone(&self.shared),
            user,
            rx,
            self.idle_timeout,
        ));
    }
}

async fn run_worker(
    router: Arc<EventRouter>,
    shared: Arc<Shared>,
    user: UserId,
    mut rx: mpsc::UnboundedReceiver<Job>,
    idle_timeout: Duration,
) {
    loop {
        let job = match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(_elapsed) => match take_or_retire(&shared.queues, user, &mut rx) {
                Some(job) => job,
                None => {
                    debug!(%user, "event worker idle, retiring");
                    return;
                }
            },
        };

        let (event, done) = job;
        let route = router.handle(event).await;
        shared.pending.fetch_sub(1, Ordering::AcqRel);
        if let Some(done) = done {
            let _ = done.send(route);
        }
    }
}

/// Takes a job that raced the idle timeout, or removes the user's queue.
///
/// Runs under the queue lock, which `enqueue` also holds while sending, so no
/// event can land in a queue after it is removed.
fn take_or_retire(
    queues: &Queues,
    user: UserId,
    rx: &mut mpsc::UnboundedReceiver<Job>,
) -> Option<Job> {
    let mut queues = queues.lock().unwrap_or_else(PoisonError::into_inner);
    match rx.try_recv() {
        Ok(job) => Some(job),
        Err(_) => {
            queues.remove(&user);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::persona::PersonaCatalog;
    use crate::router::RelayTexts;
    use crate::session::SessionStore;
    use crate::transport::RecordingTransport;
    use relaybot_ai::ScriptedCompletionClient;
    use relaybot_core::ChatId;
    use std::time::Duration;

    fn dispatcher(
        completion: Arc<ScriptedCompletionClient>,
        transport: Arc<RecordingTransport>,
    ) -> Dispatcher {
        let router = EventRouter::new(
            Arc::new(SessionStore::new("default")),
            Arc::new(PersonaCatalog::curated()),
            completion,
            transport,
            RelayTexts::default(),
        );
        Dispatcher::new(Arc::new(router))
    }

    fn text(user: i64, body: &str) -> InboundEvent {
        InboundEvent::new(
            UserId::new(user),
            ChatId::new(user),
            EventKind::Text(body.to_string()),
        )
    }

    #[tokio::test]
    async fn same_user_events_are_handled_in_order() {
        let completion = Arc::new(
            ScriptedCompletionClient::new().with_delay(Duration::from_millis(20)),
        );
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = dispatcher(completion.clone(), transport.clone());

        dispatcher.dispatch(text(1, "one"));
        dispatcher.dispatch(text(1, "two"));
        let last = dispatcher.dispatch_and_wait(text(1, "three")).await;

        assert_eq!(last, Some(Route::Ask("three".to_string())));
        let prompts: Vec<_> = completion.requests().into_iter().map(|r| r.prompt).collect();
        assert_eq!(prompts, vec!["one", "two", "three"]);
        let replies: Vec<_> = transport
            .delivered_to(ChatId::new(1))
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(
            replies,
            vec!["answer to: one", "answer to: two", "answer to: three"]
        );
        assert_eq!(dispatcher.active_users(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn users_do_not_wait_for_each_other() {
        let completion = Arc::new(
            ScriptedCompletionClient::new().with_delay(Duration::from_millis(200)),
        );
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = Arc::new(dispatcher(completion, transport));

        let started = tokio::time::Instant::now();
        let a = {
            let d = Arc::clone(&dispatcher);
            tokio::spawn(async move { d.dispatch_and_wait(text(1, "slow a")).await })
        };
        let b = {
            let d = Arc::clone(&dispatcher);
            tokio::spawn(async move { d.dispatch_and_wait(text(2, "slow b")).await })
        };
        a.await.expect("join a");
        b.await.expect("join b");

        // Serial handling would take at least 400ms.
        assert!(started.elapsed() < Duration::from_millis(390));
        assert_eq!(dispatcher.active_users(), 2);
    }

    #[tokio::test]
    async fn idle_workers_retire_and_restart_on_demand() {
        let completion = Arc::new(ScriptedCompletionClient::new());
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = dispatcher(completion.clone(), transport.clone())
            .with_idle_timeout(Duration::from_millis(50));

        dispatcher.dispatch_and_wait(text(1, "first")).await;
        assert_eq!(dispatcher.active_users(), 1);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(dispatcher.active_users(), 0);

        let route = dispatcher.dispatch_and_wait(text(1, "second")).await;
        assert_eq!(route, Some(Route::Ask("second".to_string())));
        assert_eq!(dispatcher.active_users(), 1);
        assert_eq!(transport.delivered_to(ChatId::new(1)).len(), 2);
    }

    #[tokio::test]
    async fn drain_waits_for_in_flight_events() {
        let completion = Arc::new(
            ScriptedCompletionClient::new().with_delay(Duration::from_millis(100)),
        );
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = dispatcher(completion, transport.clone());

        dispatcher.dispatch(text(1, "one"));
        dispatcher.dispatch(text(2, "two"));
        assert_eq!(dispatcher.pending(), 2);

        assert_eq!(dispatcher.drain(Duration::from_secs(5)).await, 0);
        assert_eq!(transport.delivered_to(ChatId::new(1)).len(), 1);
        assert_eq!(transport.delivered_to(ChatId::new(2)).len(), 1);
    }

    #[tokio::test]
    async fn drain_reports_events_left_after_grace() {
        let completion = Arc::new(
            ScriptedCompletionClient::new().with_delay(Duration::from_secs(5)),
        );
        let dispatcher = dispatcher(completion, Arc::new(RecordingTransport::new()));

        dispatcher.dispatch(text(1, "slow"));
        dispatcher.dispatch(text(1, "queued behind it"));

        assert_eq!(dispatcher.drain(Duration::from_millis(50)).await, 2);
    }
}
