//! Cursor-backed change detection, the fallback for missed notifications.
//!
//! On every tick the poller asks the provider for documents modified after
//! its stored cursor. When changes exist it publishes a single poll event
//! and advances the cursor to the publish time. The cursor only moves after
//! a successful publish, so a publish failure replays the same window next
//! tick instead of losing it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cursor::CursorStore;
use crate::provider::DocumentProvider;
use crate::queue::WorkQueue;
use crate::types::{ChangeEvent, DocumentPreview, FolderId};

/// Tuning for the poll loop.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub folder: FolderId,
    pub interval: Duration,
    pub page_size: usize,
    pub preview_limit: usize,
}

impl PollerConfig {
    pub fn new(folder: FolderId, interval: Duration) -> Self {
        PollerConfig {
            folder,
            interval,
            page_size: 100,
            preview_limit: 5,
        }
    }
}

/// What a single poll cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No documents modified since the cursor.
    NoChanges,
    /// Changes were found and a poll event was published.
    FoundChanges { files_found: usize },
    /// A dependency failed; the cycle was a no-op and the cursor is unchanged.
    Skipped,
}

pub struct ChangePoller {
    provider: Arc<dyn DocumentProvider>,
    queue: WorkQueue,
    cursor: Arc<CursorStore>,
    config: PollerConfig,
}

impl ChangePoller {
    pub fn new(
        provider: Arc<dyn DocumentProvider>,
        queue: WorkQueue,
        cursor: Arc<CursorStore>,
        config: PollerConfig,
    ) -> Self {
        ChangePoller {
            provider,
            queue,
            cursor,
            config,
        }
    }

    /// Runs poll cycles until cancelled. A cycle failure never stops the
    /// loop.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            folder = %self.config.folder,
            interval_secs = self.config.interval.as_secs(),
            "change poller started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("change poller stopping");
                    return;
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }
            match self.run_once().await {
                PollOutcome::NoChanges => debug!("poll cycle found no changes"),
                PollOutcome::FoundChanges { files_found } => {
                    info!(files_found, "poll cycle published change event");
                }
                PollOutcome::Skipped => {}
            }
        }
    }

    /// One poll cycle. Dependency failures are logged and turn the cycle
    /// into a no-op.
    pub async fn run_once(&self) -> PollOutcome {
        let checked_at = Utc::now();
        let since = self.cursor.last_sync_time().await;

        let documents = match self
            .provider
            .list_modified_after(&self.config.folder, since, self.config.page_size)
            .await
        {
            Ok(documents) => documents,
            Err(err) => {
                warn!(%since, error = %err, "change listing failed, skipping cycle");
                return PollOutcome::Skipped;
            }
        };

        if documents.is_empty() {
            return PollOutcome::NoChanges;
        }

        let preview = documents
            .iter()
            .take(self.config.preview_limit)
            .map(|doc| DocumentPreview {
                id: doc.id.clone(),
                name: doc.name.clone(),
                modified_time: doc.modified_time,
            })
            .collect();
        let event = ChangeEvent::poll(documents.len(), preview, checked_at);

        if let Err(err) = self.queue.publish(&event) {
            warn!(error = %err, "failed to publish poll event, cursor not advanced");
            return PollOutcome::Skipped;
        }

        // Advance to now, not the newest modifiedTime seen: provider clocks
        // and ours may disagree, and a small overlap only costs a duplicate
        // event.
        if let Err(err) = self.cursor.set_last_sync_time(Utc::now()).await {
            warn!(error = %err, "event published but cursor not advanced, next cycle may duplicate");
        }

        PollOutcome::FoundChanges {
            files_found: documents.len(),
        }
    }
}
