use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use crate::queue::WorkQueue;
use crate::storage::ObjectStorage;
use crate::test_utils::MockProvider;
use crate::types::{ChangeEvent, ChannelId, FolderId, ResourceState};

use super::worker::{SyncWorker, WorkerConfig};
use super::SyncReport;

struct Fixture {
    worker: SyncWorker,
    provider: MockProvider,
    queue: WorkQueue,
    storage: ObjectStorage,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let queue = WorkQueue::open(dir.path().join("queue")).unwrap();
    let storage = ObjectStorage::in_memory();
    let provider = MockProvider::new();
    let worker = SyncWorker::new(
        Arc::new(provider.clone()),
        queue.clone(),
        storage.clone(),
        WorkerConfig {
            folder: FolderId::new("folder-1"),
            storage_prefix: "drive-sync".to_string(),
        },
    );
    Fixture {
        worker,
        provider,
        queue,
        storage,
        _dir: dir,
    }
}

fn push_event(channel: &str) -> ChangeEvent {
    ChangeEvent::push(
        ChannelId::new(channel),
        ResourceState::Update,
        None,
        None,
        Utc::now(),
    )
}

fn fixed_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 14, 30, 5).unwrap()
}

fn failed_marker_count(queue: &WorkQueue) -> usize {
    std::fs::read_dir(queue.dir())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .path()
                .extension()
                .is_some_and(|ext| ext == "failed")
        })
        .count()
}

#[tokio::test]
async fn every_document_is_uploaded_with_its_audit_record() {
    let f = fixture();
    f.provider
        .add_document("doc-1", "report.pdf", "application/pdf", b"pdf-bytes", Utc::now());
    f.provider
        .add_document("doc-2", "notes.txt", "text/plain", b"text-bytes", Utc::now());

    let report = f
        .worker
        .process_event_at(&push_event("chan-1"), fixed_time())
        .await
        .unwrap();

    assert_eq!(
        report,
        SyncReport {
            total: 2,
            succeeded: 2,
            failed: 0,
        }
    );
    assert_eq!(f.storage.list_keys("drive-sync/files").await.unwrap().len(), 2);
    assert_eq!(
        f.storage.list_keys("drive-sync/metadata").await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn audit_record_describes_the_upload() {
    let f = fixture();
    f.provider
        .add_document("doc-1", "report.pdf", "application/pdf", b"pdf-bytes", Utc::now());

    f.worker
        .process_event_at(&push_event("chan-1"), fixed_time())
        .await
        .unwrap();

    let key = "drive-sync/metadata/2025/06/01/143005_report.pdf.json";
    let (bytes, _) = f.storage.get_object(key).await.unwrap();
    let record: super::SyncMetadataRecord = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(record.file_info.id, "doc-1");
    assert_eq!(record.file_info.final_name, "report.pdf");
    assert_eq!(record.file_info.size_bytes, 9);
    assert_eq!(record.trigger.event_id, "chan-1");
    assert_eq!(record.trigger.event_type, "webhook_received");
    assert_eq!(record.storage.bucket, "in-memory");
    assert_eq!(
        record.storage.key,
        "drive-sync/files/2025/06/01/143005_report.pdf"
    );
}

#[tokio::test]
async fn uploaded_object_carries_sanitized_metadata() {
    use object_store::Attribute;

    let f = fixture();
    f.provider
        .add_document("doc-1", "çalışma raporu.pdf", "application/pdf", b"x", Utc::now());

    f.worker
        .process_event_at(&push_event("chan-1"), fixed_time())
        .await
        .unwrap();

    let key = "drive-sync/files/2025/06/01/143005_al_ma_raporu.pdf";
    let (_, attributes) = f.storage.get_object(key).await.unwrap();
    assert_eq!(
        attributes
            .get(&Attribute::Metadata("original_name".into()))
            .map(|v| &**v),
        Some("alma raporu.pdf")
    );
    assert_eq!(
        attributes
            .get(&Attribute::Metadata("synced_by".into()))
            .map(|v| &**v),
        Some("drive-sync-worker")
    );
}

#[tokio::test]
async fn native_document_is_exported_before_upload() {
    let f = fixture();
    f.provider.add_document(
        "doc-1",
        "Quarterly Notes",
        "application/vnd.google-apps.document",
        b"exported",
        Utc::now(),
    );

    f.worker
        .process_event_at(&push_event("chan-1"), fixed_time())
        .await
        .unwrap();

    use object_store::Attribute;
    let key = "drive-sync/files/2025/06/01/143005_Quarterly_Notes.docx";
    let (bytes, attributes) = f.storage.get_object(key).await.unwrap();
    assert_eq!(bytes, b"exported");
    assert_eq!(
        attributes.get(&Attribute::ContentType).map(|v| &**v),
        Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
    );
}

#[tokio::test]
async fn partial_failure_counts_and_still_acks() {
    let f = fixture();
    f.provider
        .add_document("doc-1", "a.txt", "text/plain", b"a", Utc::now());
    f.provider
        .add_document("doc-2", "b.txt", "text/plain", b"b", Utc::now());
    f.provider
        .add_document("doc-3", "c.txt", "text/plain", b"c", Utc::now());
    f.provider.fail_fetch("doc-2");

    f.queue.publish(&push_event("chan-1")).unwrap();
    assert!(f.worker.step().await.unwrap());

    // Event acked despite the per-document failure.
    assert_eq!(f.queue.pending_count().unwrap(), 0);
    assert_eq!(failed_marker_count(&f.queue), 0);
    assert_eq!(f.storage.list_keys("drive-sync/files").await.unwrap().len(), 2);
}

#[tokio::test]
async fn partial_failure_report_is_marked_partial() {
    let f = fixture();
    f.provider
        .add_document("doc-1", "a.txt", "text/plain", b"a", Utc::now());
    f.provider
        .add_document("doc-2", "b.txt", "text/plain", b"b", Utc::now());
    f.provider.fail_fetch("doc-2");

    let report = f
        .worker
        .process_event_at(&push_event("chan-1"), fixed_time())
        .await
        .unwrap();

    assert_eq!(
        report,
        SyncReport {
            total: 2,
            succeeded: 1,
            failed: 1,
        }
    );
    assert!(report.is_partial());
}

#[tokio::test]
async fn empty_folder_writes_a_marker() {
    let f = fixture();

    let report = f
        .worker
        .process_event_at(&push_event("chan-empty"), fixed_time())
        .await
        .unwrap();

    assert_eq!(report, SyncReport::empty());
    let key = "drive-sync/webhook-events/2025/06/01/143005_no_files.txt";
    let (bytes, _) = f.storage.get_object(key).await.unwrap();
    let body = String::from_utf8(bytes).unwrap();
    assert!(body.contains("No files found"));
    assert!(body.contains("chan-empty"));
}

#[tokio::test]
async fn listing_failure_nacks_the_message() {
    let f = fixture();
    f.provider.fail_listing(true);

    f.queue.publish(&push_event("chan-1")).unwrap();
    assert!(f.worker.step().await.unwrap());

    // Dropped without requeue.
    assert_eq!(f.queue.pending_count().unwrap(), 0);
    assert_eq!(failed_marker_count(&f.queue), 1);
    assert!(f.storage.list_keys("drive-sync").await.unwrap().is_empty());
}

#[tokio::test]
async fn corrupt_payload_is_dropped() {
    let f = fixture();
    let message = f.queue.publish(&push_event("chan-1")).unwrap();
    std::fs::write(&message.payload_path, b"not json").unwrap();

    assert!(f.worker.step().await.unwrap());
    assert_eq!(f.queue.pending_count().unwrap(), 0);
    assert_eq!(failed_marker_count(&f.queue), 1);
}

#[tokio::test]
async fn reprocessing_writes_fresh_keys() {
    let f = fixture();
    f.provider
        .add_document("doc-1", "a.txt", "text/plain", b"a", Utc::now());
    let event = push_event("chan-1");

    f.worker
        .process_event_at(&event, fixed_time())
        .await
        .unwrap();
    f.worker
        .process_event_at(&event, fixed_time() + chrono::Duration::seconds(1))
        .await
        .unwrap();

    let keys = f.storage.list_keys("drive-sync/files").await.unwrap();
    assert_eq!(keys.len(), 2);
}

#[tokio::test]
async fn step_is_idle_on_empty_queue() {
    let f = fixture();
    assert!(!f.worker.step().await.unwrap());
}
