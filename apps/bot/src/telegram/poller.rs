//! Long-polling update source feeding the worker pool's inbound queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatcher::{InboundEvent, PhotoRef};
use crate::telegram::types::{Message, Update};
use crate::telegram::{TelegramClient, TransportError};

const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Where `poll_updates` gets its batches from.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Returns updates with id ≥ `offset`, waiting up to `timeout` seconds for one.
    async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>, TransportError>;
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>, TransportError> {
        TelegramClient::get_updates(self, offset, timeout).await
    }
}

impl From<Message> for InboundEvent {
    fn from(message: Message) -> Self {
        InboundEvent {
            message_id: message.message_id,
            chat_id: message.chat.id,
            is_group: message.chat.kind.is_group(),
            photos: message
                .photo
                .unwrap_or_default()
                .into_iter()
                .map(|p| PhotoRef {
                    file_id: p.file_id,
                    width: p.width,
                    height: p.height,
                })
                .collect(),
            caption: message.caption,
        }
    }
}

/// Converts an update into an event; updates without a message carry nothing to caption.
pub fn event_from_update(update: Update) -> Option<InboundEvent> {
    update.message.map(InboundEvent::from)
}

/// Polls `getUpdates` until `cancel` fires or the queue's receiver is dropped.
///
/// The offset always advances past every received update, so an update is handed
/// out at most once. Polling errors are logged and retried after a fixed delay.
pub async fn poll_updates(
    source: Arc<dyn UpdateSource>,
    poll_timeout_secs: u64,
    events: mpsc::Sender<InboundEvent>,
    cancel: CancellationToken,
) {
    let mut offset = 0_i64;
    info!(timeout_secs = poll_timeout_secs, "Update poller started");

    'poll: loop {
        let batch = tokio::select! {
            biased;
            _ = cancel.cancelled() => break 'poll,
            batch = source.get_updates(offset, poll_timeout_secs) => batch,
        };

        let updates = match batch {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "Failed to get updates, retrying in {}s", RETRY_DELAY.as_secs());
                tokio::select! {
                    _ = cancel.cancelled() => break 'poll,
                    _ = tokio::time::sleep(RETRY_DELAY) => continue 'poll,
                }
            }
        };

        for update in updates {
            let update_id = update.update_id;
            offset = offset.max(update_id + 1);

            let Some(event) = event_from_update(update) else {
                debug!(update_id, "Update carries no message");
                continue;
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'poll,
                sent = events.send(event) => {
                    if sent.is_err() {
                        debug!("Inbound queue closed");
                        break 'poll;
                    }
                }
            }
        }
    }

    info!("Update poller stopped");
}
