//! Test doubles shared across module tests.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cursor::{CursorBackend, CursorError};
use crate::provider::{
    DocumentDescriptor, DocumentProvider, FetchedDocument, ProviderError, mime,
};
use crate::types::{DocumentId, FolderId};

/// In-memory document provider with failure injection.
#[derive(Clone, Default)]
pub struct MockProvider {
    inner: Arc<Mutex<MockProviderState>>,
}

#[derive(Default)]
struct MockProviderState {
    documents: Vec<(DocumentDescriptor, Vec<u8>)>,
    failing_fetches: Vec<String>,
    fail_listing: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        MockProvider::default()
    }

    pub fn add_document(
        &self,
        id: &str,
        name: &str,
        mime_type: &str,
        bytes: &[u8],
        modified_time: DateTime<Utc>,
    ) {
        let descriptor = DocumentDescriptor {
            id: DocumentId::new(id),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            modified_time: Some(modified_time),
            size: Some(bytes.len() as u64),
        };
        self.inner
            .lock()
            .unwrap()
            .documents
            .push((descriptor, bytes.to_vec()));
    }

    /// Makes subsequent listings fail with a transient error.
    pub fn fail_listing(&self, fail: bool) {
        self.inner.lock().unwrap().fail_listing = fail;
    }

    /// Makes fetches of one document fail with a transient error.
    pub fn fail_fetch(&self, id: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_fetches
            .push(id.to_string());
    }

    fn documents(&self) -> crate::provider::Result<Vec<DocumentDescriptor>> {
        let state = self.inner.lock().unwrap();
        if state.fail_listing {
            return Err(ProviderError::Transient(
                "injected listing failure".to_string(),
            ));
        }
        let mut documents: Vec<_> = state.documents.iter().map(|(d, _)| d.clone()).collect();
        documents.sort_by(|a, b| b.modified_time.cmp(&a.modified_time));
        Ok(documents)
    }
}

#[async_trait]
impl DocumentProvider for MockProvider {
    async fn list_folder(&self, _folder: &FolderId) -> crate::provider::Result<Vec<DocumentDescriptor>> {
        self.documents()
    }

    async fn list_modified_after(
        &self,
        _folder: &FolderId,
        after: DateTime<Utc>,
        page_size: usize,
    ) -> crate::provider::Result<Vec<DocumentDescriptor>> {
        let mut documents = self.documents()?;
        documents.retain(|d| d.modified_time.is_some_and(|m| m > after));
        documents.truncate(page_size);
        Ok(documents)
    }

    async fn fetch(&self, doc: &DocumentDescriptor) -> crate::provider::Result<FetchedDocument> {
        let state = self.inner.lock().unwrap();
        if state.failing_fetches.contains(&doc.id.to_string()) {
            return Err(ProviderError::Transient(
                "injected fetch failure".to_string(),
            ));
        }
        let (_, bytes) = state
            .documents
            .iter()
            .find(|(d, _)| d.id == doc.id)
            .ok_or_else(|| ProviderError::Rejected(format!("unknown document {}", doc.id)))?;
        Ok(FetchedDocument {
            bytes: bytes.clone(),
            content_type: mime::upload_content_type(&doc.mime_type).to_string(),
        })
    }
}

/// In-memory cursor backend with failure injection.
#[derive(Clone, Default)]
pub struct MemoryCursorBackend {
    inner: Arc<Mutex<MemoryCursorState>>,
}

#[derive(Default)]
struct MemoryCursorState {
    map: BTreeMap<String, String>,
    fail: bool,
}

impl MemoryCursorBackend {
    pub fn new() -> Self {
        MemoryCursorBackend::default()
    }

    pub fn fail_requests(&self, fail: bool) {
        self.inner.lock().unwrap().fail = fail;
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.inner.lock().unwrap().map.get(key).cloned()
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.inner
            .lock()
            .unwrap()
            .map
            .insert(key.to_string(), value.to_string());
    }

    fn injected_failure() -> CursorError {
        CursorError::Io(io::Error::other("injected backend failure"))
    }
}

#[async_trait]
impl CursorBackend for MemoryCursorBackend {
    async fn get(&self, key: &str) -> crate::cursor::Result<Option<String>> {
        let state = self.inner.lock().unwrap();
        if state.fail {
            return Err(Self::injected_failure());
        }
        Ok(state.map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> crate::cursor::Result<()> {
        let mut state = self.inner.lock().unwrap();
        if state.fail {
            return Err(Self::injected_failure());
        }
        state.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn healthy(&self) -> bool {
        !self.inner.lock().unwrap().fail
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
