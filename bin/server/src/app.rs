//! Component wiring and the top-level run loop.

use crate::config::{DeliveryMode, ServerConfig};
use crate::error::ServerError;
use relaybot_ai::{CompletionClient, OpenAiClient};
use relaybot_conversation::{ChatTransport, Dispatcher, EventRouter, SessionStore};
use relaybot_core::Result;
use relaybot_telegram::{
    BotClient, TelegramTransport, UpdateIntake, WebhookState, run_polling, webhook_router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// How long shutdown waits for queued and in-flight events.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Builds the dispatcher for `config` on top of the given seams.
#[must_use]
pub fn build_dispatcher(
    config: &ServerConfig,
    completion: Arc<dyn CompletionClient>,
    transport: Arc<dyn ChatTransport>,
) -> Dispatcher {
    let router = EventRouter::new(
        Arc::new(SessionStore::new(config.relay.default_persona.clone())),
        Arc::new(config.catalog()),
        completion,
        transport,
        config.relay.texts.clone(),
    );
    Dispatcher::new(Arc::new(router))
}

/// Runs the relay until `shutdown` resolves.
///
/// Once intake stops, events already queued get [`SHUTDOWN_GRACE`] to finish.
///
/// # Errors
///
/// Returns an error if a component cannot be built, the webhook cannot be
/// registered, or the webhook server fails.
pub async fn run(
    config: ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let telegram = &config.telegram;
    let client = Arc::new(
        BotClient::new(
            &telegram.token,
            &telegram.api_base_url,
            Duration::from_secs(telegram.poll_timeout_seconds),
        )
        .map_err(|e| ServerError::Setup {
            component: "telegram client",
            reason: e.to_string(),
        })?,
    );

    let completion =
        OpenAiClient::new(config.completion.clone()).map_err(|e| ServerError::Setup {
            component: "completion client",
            reason: e.to_string(),
        })?;
    info!(model = %completion.model(), "completion client ready");

    let transport =
        TelegramTransport::new(Arc::clone(&client)).with_destination(telegram.destination());
    let dispatcher = Arc::new(build_dispatcher(
        &config,
        Arc::new(completion),
        Arc::new(transport),
    ));
    info!(
        personas = dispatcher.router().catalog().len(),
        mode = ?telegram.mode,
        "relay ready"
    );

    let intake = Arc::new(UpdateIntake::new(Arc::clone(&client), Arc::clone(&dispatcher)));

    let served: Result<(), ServerError> = match telegram.mode {
        DeliveryMode::Polling => run_polling(
            client,
            intake,
            telegram.poll_timeout_seconds,
            shutdown,
        )
        .await
        .map_err(|e| {
            ServerError::Telegram {
                reason: e.to_string(),
            }
            .into()
        }),
        DeliveryMode::Webhook => serve_webhook(&config, &client, intake, shutdown).await,
    };

    drain(&dispatcher, SHUTDOWN_GRACE).await;
    served
}

/// Gives queued events up to `grace` to finish, logging what is abandoned.
async fn drain(dispatcher: &Dispatcher, grace: Duration) -> usize {
    let pending = dispatcher.pending();
    if pending == 0 {
        return 0;
    }

    info!(pending, "waiting for queued events");
    let abandoned = dispatcher.drain(grace).await;
    if abandoned > 0 {
        warn!(abandoned, "shutting down with unanswered events");
    }
    abandoned
}

async fn serve_webhook(
    config: &ServerConfig,
    client: &BotClient,
    intake: Arc<UpdateIntake>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let telegram = &config.telegram;
    let url = telegram.webhook_url.as_deref().ok_or_else(|| ServerError::Config {
        reason: "telegram.webhook_url required in webhook mode".to_string(),
    })?;

    let listener = tokio::net::TcpListener::bind(&telegram.webhook_addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: telegram.webhook_addr.clone(),
            reason: e.to_string(),
        })?;

    client
        .set_webhook(url, telegram.webhook_secret.as_deref())
        .await
        .map_err(|e| ServerError::Telegram {
            reason: e.to_string(),
        })?;

    let app = webhook_router(
        &telegram.webhook_path,
        WebhookState {
            intake,
            secret_token: telegram.webhook_secret.clone(),
        },
    )
    .layer(TraceLayer::new_for_http());

    info!(
        addr = %telegram.webhook_addr,
        path = %telegram.webhook_path,
        "listening for webhook updates"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve {
            reason: e.to_string(),
        })?;

    info!("webhook server stopped");
    Ok(())
}
