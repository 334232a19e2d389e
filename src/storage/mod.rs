//! Object storage access for the sync worker.
//!
//! A thin wrapper over the `object_store` crate that attaches content types
//! and ASCII-sanitized metadata to every upload. Production uses the S3
//! backend; tests use the in-memory backend.

use std::borrow::Cow;
use std::sync::Arc;

use object_store::path::Path as StorePath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use thiserror::Error;
use tracing::debug;

pub mod keys;

pub use keys::{marker_key, metadata_key, object_key, sanitize_ascii, sanitize_filename};

/// Errors from object storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend rejected or failed the request.
    #[error("object store error: {0}")]
    Backend(#[from] object_store::Error),

    /// The storage backend could not be configured at startup.
    #[error("storage configuration error: {0}")]
    Configuration(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Handle to the destination bucket.
///
/// Cheap to clone; the underlying client is shared.
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStorage {
    /// Connects to an S3 bucket. Credentials come from the environment;
    /// missing credentials fail here, at startup.
    pub fn s3(bucket: &str, region: &str) -> Result<Self> {
        let store = object_store::aws::AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region)
            .build()
            .map_err(|e| StorageError::Configuration(e.to_string()))?;
        Ok(ObjectStorage {
            store: Arc::new(store),
            bucket: bucket.to_string(),
        })
    }

    /// An in-memory bucket for tests and local runs.
    pub fn in_memory() -> Self {
        ObjectStorage {
            store: Arc::new(object_store::memory::InMemory::new()),
            bucket: "in-memory".to_string(),
        }
    }

    /// The `s3://bucket/key` style location string recorded in audit records.
    pub fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Uploads an object with a content type and custom metadata.
    ///
    /// Metadata values are ASCII-sanitized here because storage metadata
    /// headers commonly reject non-ASCII.
    pub async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: Vec<(String, String)>,
    ) -> Result<String> {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        for (name, value) in metadata {
            attributes.insert(
                Attribute::Metadata(Cow::Owned(name)),
                keys::sanitize_ascii(&value).into(),
            );
        }

        let size = bytes.len();
        let options = PutOptions {
            attributes,
            ..Default::default()
        };
        self.store
            .put_opts(&StorePath::from(key), PutPayload::from(bytes), options)
            .await?;

        debug!(key, size, content_type, "uploaded object");
        Ok(self.location(key))
    }

    /// Reads an object back. Used by tests and the state-backfill path.
    pub async fn get_object(&self, key: &str) -> Result<(Vec<u8>, Attributes)> {
        let result = self.store.get(&StorePath::from(key)).await?;
        let attributes = result.attributes.clone();
        let bytes = result.bytes().await?;
        Ok((bytes.to_vec(), attributes))
    }

    /// Lists object keys under a prefix. Used by tests and the
    /// state-backfill path.
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        use futures::TryStreamExt;

        let metas: Vec<_> = self
            .store
            .list(Some(&StorePath::from(prefix)))
            .try_collect()
            .await?;
        Ok(metas.into_iter().map(|m| m.location.to_string()).collect())
    }
}
