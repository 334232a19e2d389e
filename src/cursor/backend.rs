//! Storage backends for sync-cursor state.
//!
//! Two implementations: Redis for production and a local JSON file used both
//! as the durable fallback and as the whole store when Redis is not
//! configured.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

/// Errors from cursor backends.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("state file error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for cursor operations.
pub type Result<T> = std::result::Result<T, CursorError>;

/// A key-value store holding cursor state.
#[async_trait]
pub trait CursorBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Whether the backend is currently reachable.
    async fn healthy(&self) -> bool;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Redis-backed cursor storage.
///
/// The multiplexed connection is cached and dropped on the first command
/// failure, so the next call reconnects.
pub struct RedisBackend {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisBackend {
    pub fn new(url: &str) -> Result<Self> {
        Ok(RedisBackend {
            client: redis::Client::open(url)?,
            connection: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.as_ref() {
            return Ok(connection.clone());
        }
        let connection = self.client.get_multiplexed_async_connection().await?;
        *guard = Some(connection.clone());
        Ok(connection)
    }

    async fn forget_connection(&self) {
        *self.connection.lock().await = None;
    }
}

#[async_trait]
impl CursorBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection().await?;
        match connection.get(key).await {
            Ok(value) => Ok(value),
            Err(err) => {
                self.forget_connection().await;
                Err(err.into())
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut connection = self.connection().await?;
        let result: redis::RedisResult<()> = connection.set(key, value).await;
        if result.is_err() {
            self.forget_connection().await;
        }
        Ok(result?)
    }

    async fn healthy(&self) -> bool {
        let mut connection = match self.connection().await {
            Ok(connection) => connection,
            Err(err) => {
                warn!(error = %err, "redis unreachable");
                return false;
            }
        };
        let pong: redis::RedisResult<String> =
            redis::cmd("PING").query_async(&mut connection).await;
        match pong {
            Ok(_) => true,
            Err(err) => {
                self.forget_connection().await;
                warn!(error = %err, "redis ping failed");
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Local JSON-file cursor storage.
///
/// The whole store is a flat string map rewritten atomically on every set,
/// so a crash mid-write never corrupts existing state.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileBackend { path: path.into() }
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let temp = self.path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&temp)?;
            file.write_all(&serde_json::to_vec_pretty(map)?)?;
            file.sync_all()?;
        }
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl CursorBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    async fn healthy(&self) -> bool {
        // Writable parent directory is all the file backend needs.
        self.path
            .parent()
            .map(|p| p.as_os_str().is_empty() || p.exists())
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
