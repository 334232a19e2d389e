//! The per-upload audit record.
//!
//! Every successful content upload gets a sibling JSON record under the
//! `metadata/` prefix describing what was synced, why, and where it landed.
//! The record is for humans and downstream jobs; the pipeline itself never
//! reads it back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::DocumentDescriptor;
use crate::types::{ChangeEvent, EventSource};

/// Identifier written into metadata and audit records.
pub const SYNCED_BY: &str = "drive-sync-worker";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMetadataRecord {
    pub sync_info: SyncInfo,
    pub file_info: FileInfo,
    pub trigger: TriggerInfo,
    pub storage: StorageInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncInfo {
    pub timestamp: String,
    pub worker: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    pub original_name: String,
    pub final_name: String,
    pub mime_type: String,
    pub export_mime_type: String,
    pub size_bytes: usize,
    pub modified_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerInfo {
    pub event_id: String,
    pub event_type: String,
    pub source: EventSource,
    pub resource_state: String,
    pub event_timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageInfo {
    pub bucket: String,
    pub key: String,
    pub location: String,
    pub content_type: String,
}

impl SyncMetadataRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        doc: &DocumentDescriptor,
        final_name: &str,
        content_type: &str,
        size_bytes: usize,
        event: &ChangeEvent,
        processed_at: DateTime<Utc>,
        bucket: &str,
        key: &str,
        location: &str,
    ) -> Self {
        SyncMetadataRecord {
            sync_info: SyncInfo {
                timestamp: ChangeEvent::format_timestamp(processed_at),
                worker: SYNCED_BY.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            file_info: FileInfo {
                id: doc.id.to_string(),
                original_name: doc.name.clone(),
                final_name: final_name.to_string(),
                mime_type: doc.mime_type.clone(),
                export_mime_type: content_type.to_string(),
                size_bytes,
                modified_time: doc.modified_time.map(ChangeEvent::format_timestamp),
            },
            trigger: TriggerInfo {
                event_id: event.event_id.to_string(),
                event_type: event.event_type.clone(),
                source: event.source,
                resource_state: event.resource_state.to_string(),
                event_timestamp: event.timestamp_rfc3339(),
            },
            storage: StorageInfo {
                bucket: bucket.to_string(),
                key: key.to_string(),
                location: location.to_string(),
                content_type: content_type.to_string(),
            },
        }
    }
}
