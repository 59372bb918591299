//! Long-polling update loop.

use crate::client::BotClient;
use crate::error::TelegramError;
use crate::intake::UpdateIntake;
use rootcause::prelude::Report;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Polls for updates until `shutdown` resolves.
///
/// Any webhook is removed first, together with the updates that queued up
/// while the relay was down, so a restart never replays old messages. Failed
/// polls are retried with exponential backoff, or after the delay the API
/// asks for when it rate limits.
///
/// # Errors
///
/// Returns an error only if the webhook cannot be removed at startup.
#[instrument(skip_all, fields(timeout_seconds))]
pub async fn run_polling(
    client: Arc<BotClient>,
    intake: Arc<UpdateIntake>,
    timeout_seconds: u64,
    shutdown: impl Future<Output = ()>,
) -> Result<(), Report<TelegramError>> {
    client.delete_webhook(true).await?;
    info!("polling for updates");

    tokio::pin!(shutdown);
    let mut offset = None;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        let polled = tokio::select! {
            () = &mut shutdown => break,
            polled = client.get_updates(offset, timeout_seconds) => polled,
        };

        match polled {
            Ok(updates) => {
                backoff = INITIAL_BACKOFF;
                for update in updates {
                    offset = Some(update.update_id + 1);
                    intake.accept(update);
                }
            }
            Err(error) => {
                let delay = error
                    .current_context()
                    .retry_after_secs()
                    .map_or(backoff, Duration::from_secs);
                warn!(%error, delay_ms = delay.as_millis(), "polling failed, retrying");
                backoff = next_backoff(backoff);

                tokio::select! {
                    () = &mut shutdown => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    info!("polling stopped");
    Ok(())
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}
