//! The queue consumer that materializes change events into object storage.
//!
//! For every event the worker re-lists the watched folder and uploads what
//! it finds; events carry no file identity, so duplicates and reordering
//! cost at most redundant uploads under fresh keys. An event fails as a
//! whole only when the folder cannot be listed or the empty-folder marker
//! cannot be written; individual document failures are counted and the
//! event still acks.

use thiserror::Error;

mod audit;
#[allow(clippy::module_inception)]
mod worker;

#[cfg(test)]
mod tests;

pub use audit::{FileInfo, StorageInfo, SyncInfo, SyncMetadataRecord, TriggerInfo};
pub use worker::{SyncWorker, WorkerConfig};

/// Event-level failures. Any of these nacks the message.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Provider(#[from] crate::provider::ProviderError),

    #[error(transparent)]
    Storage(#[from] crate::storage::StorageError),

    #[error(transparent)]
    Queue(#[from] crate::queue::QueueError),

    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Outcome of processing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl SyncReport {
    /// The report for an event that found an empty folder.
    pub fn empty() -> Self {
        SyncReport {
            total: 0,
            succeeded: 0,
            failed: 0,
        }
    }

    /// True when some documents synced and some failed.
    pub fn is_partial(&self) -> bool {
        self.failed > 0 && self.succeeded > 0
    }
}
