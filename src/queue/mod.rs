//! Durable work queue between event producers and the sync worker.
//!
//! Change events are spooled to a directory using the write-to-temp,
//! fsync, rename, fsync-directory pattern, so a published event survives
//! producer and consumer restarts. Filenames carry a zero-padded publish
//! timestamp and an in-process sequence number, giving FIFO delivery per
//! producer; marker files record the acknowledgment state:
//!
//! - `<message>.json`: the pending event payload
//! - `<message>.json.done`: acknowledged (processing attempted in full)
//! - `<message>.json.failed`: negatively acknowledged, never redelivered
//!
//! The consumer takes one message at a time (delivery prefetch of 1). A
//! message with neither marker is pending and will be re-delivered after a
//! consumer crash, which is where the at-least-once guarantee comes from.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::storage::keys::sanitize_filename;
use crate::types::ChangeEvent;

/// Errors that can occur during queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// IO error during spool file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Event payload serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// A message sitting in the queue directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// The message id (the payload file stem).
    pub id: String,

    /// Path to the payload file.
    pub payload_path: PathBuf,
}

impl QueuedMessage {
    fn new(queue_dir: &Path, id: String) -> Self {
        let payload_path = queue_dir.join(format!("{id}.json"));
        QueuedMessage { id, payload_path }
    }

    fn done_marker_path(&self) -> PathBuf {
        self.payload_path.with_extension("json.done")
    }

    fn failed_marker_path(&self) -> PathBuf {
        self.payload_path.with_extension("json.failed")
    }

    fn temp_path(&self) -> PathBuf {
        self.payload_path.with_extension("json.tmp")
    }

    /// A message is pending if its payload exists and no marker has been
    /// written for it.
    pub fn is_pending(&self) -> bool {
        self.payload_path.exists()
            && !self.done_marker_path().exists()
            && !self.failed_marker_path().exists()
    }

    /// Reads and deserializes the event payload.
    pub fn read_event(&self) -> Result<ChangeEvent> {
        let bytes = std::fs::read(&self.payload_path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Handle to the durable queue. Cheap to clone; producers and the consumer
/// share the same handle.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    dir: PathBuf,
    notify: Notify,
    sequence: AtomicU64,
}

impl WorkQueue {
    /// Opens (and creates if necessary) the queue directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "work queue opened");
        Ok(WorkQueue {
            inner: Arc::new(QueueInner {
                dir,
                notify: Notify::new(),
                sequence: AtomicU64::new(0),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Publishes a change event durably.
    ///
    /// The event is on disk (payload and directory entry fsynced) before
    /// this returns, so a success response to the notifier is a real
    /// delivery guarantee.
    pub fn publish(&self, event: &ChangeEvent) -> Result<QueuedMessage> {
        let sequence = self.inner.sequence.fetch_add(1, Ordering::Relaxed);
        let id = format!(
            "{:016}-{:06}-{}",
            Utc::now().timestamp_millis(),
            sequence,
            sanitize_filename(event.event_id.as_str()),
        );
        let message = QueuedMessage::new(&self.inner.dir, id);

        let payload = serde_json::to_vec(event)?;
        let temp_path = message.temp_path();
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        std::fs::rename(&temp_path, &message.payload_path)?;
        fsync_dir(&self.inner.dir)?;

        debug!(message_id = %message.id, event_id = %event.event_id, "event published");
        self.inner.notify.notify_one();
        Ok(message)
    }

    /// Returns the oldest pending message, if any.
    ///
    /// The consumer processes one message at a time, so this is the whole
    /// prefetch window.
    pub fn next_pending(&self) -> Result<Option<QueuedMessage>> {
        Ok(self.pending()?.into_iter().next())
    }

    /// Returns all pending messages in delivery order.
    pub fn pending(&self) -> Result<Vec<QueuedMessage>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.inner.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        // Filename order is delivery order.
        ids.sort();

        Ok(ids
            .into_iter()
            .map(|id| QueuedMessage::new(&self.inner.dir, id))
            .filter(QueuedMessage::is_pending)
            .collect())
    }

    /// Number of messages awaiting delivery.
    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.pending()?.len())
    }

    /// Acknowledges a message after its event has been attempted in full.
    pub fn ack(&self, message: &QueuedMessage) -> Result<()> {
        create_marker(&message.done_marker_path(), &self.inner.dir)
    }

    /// Negatively acknowledges a message without requeueing it.
    ///
    /// The event is dropped after this one attempt; the poller or the push
    /// channel re-surfaces the underlying change later.
    pub fn nack(&self, message: &QueuedMessage) -> Result<()> {
        create_marker(&message.failed_marker_path(), &self.inner.dir)
    }

    /// Waits until a producer signals that a message may be available.
    ///
    /// In-process only; the consumer pairs this with a periodic re-scan to
    /// pick up messages spooled by a previous run.
    pub async fn wait(&self) {
        self.inner.notify.notified().await;
    }

    /// Readiness probe: the queue directory must be listable.
    pub fn check(&self) -> Result<()> {
        std::fs::read_dir(&self.inner.dir)?;
        Ok(())
    }
}

/// Creates an empty marker file and makes the directory entry durable.
/// Idempotent: an existing marker is left in place.
fn create_marker(path: &Path, dir: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    drop(file);
    fsync_dir(dir)?;
    Ok(())
}

/// Syncs a directory so that renames and marker creations survive power loss.
fn fsync_dir(dir: &Path) -> io::Result<()> {
    let handle = OpenOptions::new().read(true).open(dir)?;
    handle.sync_all()
}
