//! Long-polling update source.
//!
//! `UpdatePoller` owns the `getUpdates` offset. Updates are handed to a
//! single consumer through a bounded channel, so a slow handler throttles
//! polling instead of piling updates up in memory.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::TelegramClient;
use crate::error::TelegramError;
use crate::types::Update;

const DEFAULT_ERROR_DELAY: Duration = Duration::from_secs(3);
const DEFAULT_BUFFER: usize = 100;

pub struct UpdatePoller {
    client: TelegramClient,
    timeout_secs: u64,
    offset: i64,
    error_delay: Duration,
}

impl UpdatePoller {
    pub fn new(client: TelegramClient, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout_secs,
            offset: 0,
            error_delay: DEFAULT_ERROR_DELAY,
        }
    }

    /// Pause after a failed poll when the server gives no `retry_after`
    pub fn with_error_delay(mut self, delay: Duration) -> Self {
        self.error_delay = delay;
        self
    }

    /// Next `update_id` that will be requested
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Fetch one batch and acknowledge it by moving the offset past it.
    pub async fn poll_once(&mut self) -> Result<Vec<Update>, TelegramError> {
        let updates = self
            .client
            .get_updates(self.offset, self.timeout_secs)
            .await?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset = self.offset.max(last + 1);
        }

        Ok(updates)
    }

    /// Run the poll loop on a background task.
    ///
    /// The receiver yields updates in arrival order and closes when the poller
    /// stops: on cancellation, when the receiver is dropped, or on a fatal error
    /// (returned through the join handle).
    pub fn spawn(
        self,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<Update>, JoinHandle<Result<(), TelegramError>>) {
        let (tx, rx) = mpsc::channel(DEFAULT_BUFFER);
        let handle = tokio::spawn(self.run(tx, cancel));
        (rx, handle)
    }

    async fn run(
        mut self,
        tx: mpsc::Sender<Update>,
        cancel: CancellationToken,
    ) -> Result<(), TelegramError> {
        tracing::info!("Polling for updates (timeout {}s)", self.timeout_secs);

        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tx.closed() => {
                    tracing::debug!("Update receiver dropped, stopping poller");
                    break;
                }
                batch = self.poll_once() => batch,
            };

            match batch {
                Ok(updates) => {
                    for update in updates {
                        if tx.send(update).await.is_err() {
                            tracing::debug!("Update receiver dropped, stopping poller");
                            return Ok(());
                        }
                    }
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!("Stopping poller: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    let delay = e.retry_after().unwrap_or(self.error_delay);
                    tracing::warn!("Failed to get updates: {}, retrying in {:?}", e, delay);

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tx.closed() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        tracing::info!("Poller stopped at offset {}", self.offset);
        Ok(())
    }
}
