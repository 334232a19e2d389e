//! Document provider client interface.
//!
//! The provider is an external collaborator: the pipeline only needs to list
//! the watched folder and fetch document content. Authentication and token
//! refresh live outside this crate; the HTTP implementation in [`drive`]
//! consumes a pre-issued bearer token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DocumentId, FolderId};

pub mod drive;
pub mod mime;

pub use drive::DriveApiClient;

/// Errors returned by document provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider was unreachable or returned a server-side error.
    /// Retried by the calling layer's own policy or the next poll cycle.
    #[error("provider request failed: {0}")]
    Transient(String),

    /// The provider rejected the request (bad token, revoked access).
    #[error("provider rejected request: {0}")]
    Rejected(String),

    /// A native editable document has no supported export format.
    #[error("no supported export format for MIME type: {0}")]
    UnsupportedExport(String),

    /// The response body could not be decoded.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// A read-only snapshot of a document, obtained at processing time.
///
/// Never cached across events: the provider is the source of truth for
/// "what currently exists".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub id: DocumentId,
    pub name: String,
    pub mime_type: String,
    pub modified_time: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

/// Fetched document content together with the MIME type of the bytes
/// actually returned (the export format for native editable documents).
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Client interface to the document-hosting provider.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// Lists the current (non-trashed) contents of a folder, newest first.
    async fn list_folder(&self, folder: &FolderId) -> Result<Vec<DocumentDescriptor>>;

    /// Lists documents modified strictly after `after`, newest first,
    /// capped at `page_size` to bound worst-case event size.
    async fn list_modified_after(
        &self,
        folder: &FolderId,
        after: DateTime<Utc>,
        page_size: usize,
    ) -> Result<Vec<DocumentDescriptor>>;

    /// Downloads document content. Native editable documents are exported
    /// to an office-interchange format; all others are fetched as opaque
    /// bytes.
    async fn fetch(&self, doc: &DocumentDescriptor) -> Result<FetchedDocument>;
}
