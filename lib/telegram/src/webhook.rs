//! Webhook endpoint.

use crate::intake::UpdateIntake;
use crate::types::Update;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use std::sync::Arc;
use tracing::warn;

/// Header Telegram uses to echo the secret registered with `setWebhook`.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared state of the webhook endpoint.
#[derive(Clone)]
pub struct WebhookState {
    pub intake: Arc<UpdateIntake>,
    /// When set, requests must carry it in [`SECRET_HEADER`].
    pub secret_token: Option<String>,
}

/// Builds a router that accepts updates POSTed to `path`.
pub fn webhook_router(path: &str, state: WebhookState) -> Router {
    Router::new()
        .route(path, post(receive_update))
        .with_state(state)
}

async fn receive_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    if let Some(expected) = state.secret_token.as_deref() {
        let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if presented != Some(expected) {
            warn!(update_id = update.update_id, "webhook call with wrong secret");
            return StatusCode::UNAUTHORIZED;
        }
    }

    state.intake.accept(update);
    StatusCode::OK
}
