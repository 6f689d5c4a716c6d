use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;

use crate::client::Client;
use crate::types::Update;
use crate::Result;

/// Pause after a failed poll before trying again.
const RETRY_DELAY: Duration = Duration::from_secs(1);

// ─── UpdateStream ─────────────────────────────────────────────────────────

/// An endless async stream of [`Update`]s from `getUpdates` long polling.
///
/// Backed by a Tokio mpsc channel. A background task owns the poll offset
/// and forwards updates in order. Poll failures are yielded as `Err` items
/// and polling resumes after a short delay. Dropping `UpdateStream` closes
/// the receiver, which ends the background task even mid-poll.
pub struct UpdateStream {
    rx: mpsc::Receiver<Result<Update>>,
}

impl UpdateStream {
    pub(crate) fn new(client: Client, timeout_secs: u64) -> Self {
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut offset = 0_i64;
            loop {
                let polled = tokio::select! {
                    _ = tx.closed() => break,
                    r = client.get_updates(offset, timeout_secs) => r,
                };
                match polled {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            if tx.send(Ok(update)).await.is_err() {
                                return; // Receiver dropped
                            }
                        }
                    }
                    Err(e) => {
                        if tx.send(Err(e)).await.is_err() {
                            return;
                        }
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
            tracing::debug!(offset, "update stream closed");
        });

        UpdateStream { rx }
    }
}

impl Stream for UpdateStream {
    type Item = Result<Update>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
