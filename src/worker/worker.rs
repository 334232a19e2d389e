//! The sync worker loop and per-event processing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::provider::{DocumentDescriptor, DocumentProvider, mime};
use crate::queue::{QueuedMessage, WorkQueue};
use crate::storage::{ObjectStorage, marker_key, metadata_key, object_key, sanitize_filename};
use crate::types::{ChangeEvent, FolderId};

use super::audit::{SYNCED_BY, SyncMetadataRecord};
use super::{Result, SyncReport, WorkerError};

/// How often an idle worker re-scans the queue directory. Catches messages
/// spooled by a previous run, which never trigger the in-process notifier.
const IDLE_RESCAN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub folder: FolderId,
    pub storage_prefix: String,
}

pub struct SyncWorker {
    provider: Arc<dyn DocumentProvider>,
    queue: WorkQueue,
    storage: ObjectStorage,
    config: WorkerConfig,
}

impl SyncWorker {
    pub fn new(
        provider: Arc<dyn DocumentProvider>,
        queue: WorkQueue,
        storage: ObjectStorage,
        config: WorkerConfig,
    ) -> Self {
        SyncWorker {
            provider,
            queue,
            storage,
            config,
        }
    }

    /// Consumes queue messages one at a time until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(folder = %self.config.folder, "sync worker started");
        loop {
            if cancel.is_cancelled() {
                info!("sync worker stopping");
                return;
            }
            match self.step().await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    error!(error = %err, "queue scan failed");
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("sync worker stopping");
                    return;
                }
                _ = self.queue.wait() => {}
                _ = tokio::time::sleep(IDLE_RESCAN) => {}
            }
        }
    }

    /// Takes and processes at most one pending message. Returns whether a
    /// message was handled.
    pub async fn step(&self) -> Result<bool> {
        let Some(message) = self.queue.next_pending()? else {
            return Ok(false);
        };
        self.handle_message(&message).await?;
        Ok(true)
    }

    /// Processes one message through to an ack or a nack.
    ///
    /// Per-document failures do not fail the event; only event-level
    /// failures (unreadable payload, folder listing, marker write) nack.
    /// Nacked messages are never redelivered; the change is picked up again
    /// by a later notification or poll cycle.
    async fn handle_message(&self, message: &QueuedMessage) -> Result<()> {
        let event = match message.read_event() {
            Ok(event) => event,
            Err(err) => {
                error!(message_id = %message.id, error = %err, "unreadable event payload, dropping");
                return self.queue.nack(message).map_err(WorkerError::from);
            }
        };

        match self.process_event(&event).await {
            Ok(report) => {
                info!(
                    event_id = %event.event_id,
                    total = report.total,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    "event processed"
                );
                self.queue.ack(message)?;
            }
            Err(err) => {
                error!(event_id = %event.event_id, error = %err, "event processing failed, dropping");
                self.queue.nack(message)?;
            }
        }
        Ok(())
    }

    pub async fn process_event(&self, event: &ChangeEvent) -> Result<SyncReport> {
        self.process_event_at(event, Utc::now()).await
    }

    /// Processes an event with an explicit processing timestamp.
    ///
    /// The timestamp determines every derived object key, so reprocessing
    /// the same event later writes new objects instead of overwriting.
    pub async fn process_event_at(
        &self,
        event: &ChangeEvent,
        processed_at: DateTime<Utc>,
    ) -> Result<SyncReport> {
        let documents = self.provider.list_folder(&self.config.folder).await?;

        if documents.is_empty() {
            self.write_no_files_marker(event, processed_at).await?;
            return Ok(SyncReport::empty());
        }

        let mut report = SyncReport {
            total: documents.len(),
            succeeded: 0,
            failed: 0,
        };
        for doc in &documents {
            match self.sync_document(doc, event, processed_at).await {
                Ok(location) => {
                    debug!(document_id = %doc.id, location = %location, "document synced");
                    report.succeeded += 1;
                }
                Err(err) => {
                    warn!(document_id = %doc.id, name = %doc.name, error = %err, "document sync failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Fetches one document and uploads it with its audit record.
    async fn sync_document(
        &self,
        doc: &DocumentDescriptor,
        event: &ChangeEvent,
        processed_at: DateTime<Utc>,
    ) -> Result<String> {
        let final_name = mime::add_extension(&doc.name, &doc.mime_type);
        let fetched = self.provider.fetch(doc).await?;
        let key = object_key(&self.config.storage_prefix, processed_at, &final_name);

        let metadata = vec![
            ("original_name".to_string(), doc.name.clone()),
            ("final_filename".to_string(), sanitize_filename(&final_name)),
            ("provider_document_id".to_string(), doc.id.to_string()),
            (
                "sync_timestamp".to_string(),
                ChangeEvent::format_timestamp(processed_at),
            ),
            ("file_size".to_string(), fetched.bytes.len().to_string()),
            ("original_mime_type".to_string(), doc.mime_type.clone()),
            ("export_mime_type".to_string(), fetched.content_type.clone()),
            (
                "modified_time".to_string(),
                doc.modified_time
                    .map(ChangeEvent::format_timestamp)
                    .unwrap_or_default(),
            ),
            ("synced_by".to_string(), SYNCED_BY.to_string()),
            (
                "sync_version".to_string(),
                env!("CARGO_PKG_VERSION").to_string(),
            ),
        ];

        let size = fetched.bytes.len();
        let location = self
            .storage
            .put_object(&key, fetched.bytes, &fetched.content_type, metadata)
            .await?;

        let record = SyncMetadataRecord::new(
            doc,
            &final_name,
            &fetched.content_type,
            size,
            event,
            processed_at,
            self.storage.bucket(),
            &key,
            &location,
        );
        self.write_audit_record(&key, &record).await;

        Ok(location)
    }

    /// Audit-record write failures are logged and swallowed: the content
    /// upload already succeeded and must not be reported as failed.
    async fn write_audit_record(&self, content_key: &str, record: &SyncMetadataRecord) {
        let key = metadata_key(content_key);
        let bytes = match serde_json::to_vec_pretty(record) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key = %key, error = %err, "audit record serialization failed");
                return;
            }
        };
        if let Err(err) = self
            .storage
            .put_object(&key, bytes, "application/json", Vec::new())
            .await
        {
            warn!(key = %key, error = %err, "audit record write failed");
        }
    }

    /// Records that an event fired against an empty folder. The marker makes
    /// "nothing to sync" distinguishable from "event lost" when auditing.
    async fn write_no_files_marker(
        &self,
        event: &ChangeEvent,
        processed_at: DateTime<Utc>,
    ) -> Result<()> {
        let key = marker_key(&self.config.storage_prefix, processed_at);
        let serialized = serde_json::to_string_pretty(event)?;
        let body = format!(
            "No files found in folder {} at {}\n\
             Event ID: {}\n\
             Event type: {}\n\
             Resource state: {}\n\
             Event:\n{}\n",
            self.config.folder,
            ChangeEvent::format_timestamp(processed_at),
            event.event_id,
            event.event_type,
            event.resource_state,
            serialized,
        );
        self.storage
            .put_object(&key, body.into_bytes(), "text/plain", Vec::new())
            .await?;
        info!(event_id = %event.event_id, key = %key, "no files to sync, marker written");
        Ok(())
    }
}
