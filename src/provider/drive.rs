//! HTTP implementation of [`DocumentProvider`] against the Drive v3 REST API.
//!
//! Authentication is out of scope for the pipeline: the client consumes a
//! pre-issued bearer token and does not refresh it.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::types::{DocumentId, FolderId};

use super::mime;
use super::{DocumentDescriptor, DocumentProvider, FetchedDocument, ProviderError, Result};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Fields requested for every file listing.
const LIST_FIELDS: &str = "files(id, name, mimeType, modifiedTime, size)";

/// A thin read-only client over the provider's REST surface.
pub struct DriveApiClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RawFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
    modified_time: Option<DateTime<Utc>>,
    // The API returns sizes as decimal strings.
    size: Option<String>,
}

impl From<RawFile> for DocumentDescriptor {
    fn from(raw: RawFile) -> Self {
        DocumentDescriptor {
            id: DocumentId::new(raw.id),
            name: raw.name,
            mime_type: raw.mime_type,
            modified_time: raw.modified_time,
            size: raw.size.and_then(|s| s.parse().ok()),
        }
    }
}

impl DriveApiClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        DriveApiClient {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
        }
    }

    /// Overrides the API base URL (used by tests against a local server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn list(&self, query: String, page_size: usize) -> Result<Vec<DocumentDescriptor>> {
        let page_size = page_size.to_string();
        let response = self
            .http
            .get(format!("{}/files", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", query.as_str()),
                ("orderBy", "modifiedTime desc"),
                ("pageSize", page_size.as_str()),
                ("fields", LIST_FIELDS),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let response = check_status(response)?;
        let list: FileList = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        debug!(count = list.files.len(), "listed provider files");
        Ok(list.files.into_iter().map(Into::into).collect())
    }

    async fn download(&self, url: String) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let response = check_status(response)?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Maps HTTP status classes onto the provider error taxonomy.
fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else if status.is_client_error() {
        Err(ProviderError::Rejected(format!(
            "provider returned {status}"
        )))
    } else {
        Err(ProviderError::Transient(format!(
            "provider returned {status}"
        )))
    }
}

#[async_trait]
impl DocumentProvider for DriveApiClient {
    async fn list_folder(&self, folder: &FolderId) -> Result<Vec<DocumentDescriptor>> {
        let query = format!("'{}' in parents and trashed=false", folder.as_str());
        self.list(query, 1000).await
    }

    async fn list_modified_after(
        &self,
        folder: &FolderId,
        after: DateTime<Utc>,
        page_size: usize,
    ) -> Result<Vec<DocumentDescriptor>> {
        let query = format!(
            "'{}' in parents and trashed=false and modifiedTime > '{}'",
            folder.as_str(),
            after.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        self.list(query, page_size).await
    }

    async fn fetch(&self, doc: &DocumentDescriptor) -> Result<FetchedDocument> {
        if mime::is_native_editable(&doc.mime_type) {
            let export_mime = mime::export_format(&doc.mime_type)
                .ok_or_else(|| ProviderError::UnsupportedExport(doc.mime_type.clone()))?;
            let url = format!(
                "{}/files/{}/export?mimeType={}",
                self.base_url,
                doc.id.as_str(),
                export_mime,
            );
            let bytes = self.download(url).await?;
            Ok(FetchedDocument {
                bytes,
                content_type: export_mime.to_string(),
            })
        } else {
            let url = format!("{}/files/{}?alt=media", self.base_url, doc.id.as_str());
            let bytes = self.download(url).await?;
            Ok(FetchedDocument {
                bytes,
                content_type: mime::upload_content_type(&doc.mime_type).to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_file_deserializes_string_size() {
        let raw: RawFile = serde_json::from_str(
            r#"{"id": "f1", "name": "a.pdf", "mimeType": "application/pdf",
                "modifiedTime": "2025-06-01T12:00:00Z", "size": "2048"}"#,
        )
        .unwrap();
        let doc = DocumentDescriptor::from(raw);
        assert_eq!(doc.size, Some(2048));
        assert_eq!(doc.mime_type, "application/pdf");
    }

    #[test]
    fn raw_file_tolerates_missing_optional_fields() {
        let raw: RawFile =
            serde_json::from_str(r#"{"id": "f2", "name": "folderless"}"#).unwrap();
        let doc = DocumentDescriptor::from(raw);
        assert_eq!(doc.size, None);
        assert_eq!(doc.modified_time, None);
        assert_eq!(doc.mime_type, "");
    }
}
