//! Long-polling adapter.

use crate::dispatcher::Dispatcher;
use async_trait::async_trait;
use relaybot_telegram::{TelegramClient, TelegramError, Update};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where polled updates come from.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetches updates with `update_id >= offset`, waiting up to
    /// `timeout_secs` for one to arrive.
    async fn fetch(&self, offset: i64, timeout_secs: u64) -> relaybot_core::Result<Vec<Update>, TelegramError>;
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn fetch(&self, offset: i64, timeout_secs: u64) -> relaybot_core::Result<Vec<Update>, TelegramError> {
        self.get_updates(offset, timeout_secs).await
    }
}

/// Polling parameters.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub timeout_secs: u64,
    pub error_pause: Duration,
}

/// Polls `source` and dispatches updates one at a time until `shutdown`
/// resolves. Returns the next offset.
pub async fn run<F>(
    source: &dyn UpdateSource,
    dispatcher: &Dispatcher,
    settings: PollSettings,
    shutdown: F,
) -> i64
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut offset = 0_i64;

    info!(timeout_secs = settings.timeout_secs, "polling for updates");

    loop {
        let batch = tokio::select! {
            () = &mut shutdown => break,
            batch = source.fetch(offset, settings.timeout_secs) => batch,
        };

        match batch {
            Ok(updates) => {
                for update in &updates {
                    offset = offset.max(update.update_id + 1);
                    let outcome = dispatcher.handle_update(update).await;
                    debug!(update_id = update.update_id, outcome = ?outcome, "update handled");
                }
            }
            Err(e) => {
                warn!(error = %e, pause_secs = settings.error_pause.as_secs(), "polling failed");
                tokio::select! {
                    () = &mut shutdown => break,
                    () = tokio::time::sleep(settings.error_pause) => {}
                }
            }
        }
    }

    info!(offset, "polling stopped");
    offset
}
