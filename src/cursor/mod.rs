//! Sync-cursor persistence with a primary backend and a durable fallback.
//!
//! The poller's cursor lives in Redis when it is reachable and in a local
//! JSON state file otherwise. Reads consult the primary first and fall back
//! to the file; a value found only in the file is migrated back to the
//! primary on the next successful read, while the file copy is kept so a
//! later Redis outage never loses the cursor.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tracing::{info, warn};

mod backend;

pub use backend::{CursorBackend, CursorError, FileBackend, RedisBackend, Result};

/// Key under which the poller cursor is stored.
const LAST_SYNC_TIME_KEY: &str = "last_sync_time";

/// Key recording when the cursor was last written, for operators.
const LAST_UPDATE_KEY: &str = "last_update";

pub struct CursorStore {
    primary: Option<Box<dyn CursorBackend>>,
    fallback: FileBackend,
    warmup: Duration,
}

impl CursorStore {
    pub fn new(
        primary: Option<Box<dyn CursorBackend>>,
        fallback: FileBackend,
        warmup: Duration,
    ) -> Self {
        CursorStore {
            primary,
            fallback,
            warmup,
        }
    }

    /// Reads a value, preferring the primary backend.
    ///
    /// A value found only in the fallback file is written back to the
    /// primary so subsequent reads hit it directly.
    pub async fn get_value(&self, key: &str) -> Option<String> {
        let mut primary_reachable = false;
        if let Some(primary) = &self.primary {
            match primary.get(key).await {
                Ok(Some(value)) => return Some(value),
                Ok(None) => primary_reachable = true,
                Err(err) => {
                    warn!(backend = primary.name(), key, error = %err, "primary cursor read failed");
                }
            }
        }

        let value = match self.fallback.get(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "fallback cursor read failed");
                return None;
            }
        };

        if let (Some(value), Some(primary), true) = (&value, &self.primary, primary_reachable) {
            match primary.set(key, value).await {
                Ok(()) => info!(backend = primary.name(), key, "migrated cursor value to primary"),
                Err(err) => {
                    warn!(backend = primary.name(), key, error = %err, "cursor migration failed")
                }
            }
        }

        value
    }

    /// Writes a value to the primary and the fallback file.
    ///
    /// Succeeds if at least one backend accepted the write; a degraded write
    /// is logged, not fatal.
    pub async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let mut primary_ok = false;
        if let Some(primary) = &self.primary {
            match primary.set(key, value).await {
                Ok(()) => primary_ok = true,
                Err(err) => {
                    warn!(backend = primary.name(), key, error = %err, "primary cursor write failed");
                }
            }
        }

        match self.fallback.set(key, value).await {
            Ok(()) => Ok(()),
            Err(err) if primary_ok => {
                warn!(key, error = %err, "fallback cursor write failed");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// The poller cursor. When no cursor has ever been stored (or the stored
    /// value does not parse), syncing starts from a warm-up window before
    /// now rather than from the beginning of time.
    pub async fn last_sync_time(&self) -> DateTime<Utc> {
        if let Some(raw) = self.get_value(LAST_SYNC_TIME_KEY).await {
            match DateTime::parse_from_rfc3339(&raw) {
                Ok(at) => return at.with_timezone(&Utc),
                Err(err) => {
                    warn!(value = %raw, error = %err, "stored cursor is not a timestamp, using warm-up default");
                }
            }
        }
        let default = Utc::now() - self.warmup;
        info!(cursor = %default, "no stored cursor, starting from warm-up window");
        default
    }

    /// Advances the poller cursor and stamps the write time.
    pub async fn set_last_sync_time(&self, at: DateTime<Utc>) -> Result<()> {
        self.set_value(
            LAST_SYNC_TIME_KEY,
            &at.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
        .await?;
        self.set_value(
            LAST_UPDATE_KEY,
            &Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        )
        .await
    }

    /// Reads a keyed JSON blob. An unparseable stored value is treated as
    /// absent and logged.
    pub async fn get_state(&self, key: &str) -> Option<serde_json::Value> {
        let raw = self.get_value(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "stored state is not valid JSON");
                None
            }
        }
    }

    /// Writes a keyed JSON blob.
    pub async fn set_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.set_value(key, &value.to_string()).await
    }

    /// Readiness probe: at least one backend must be usable.
    pub async fn healthy(&self) -> bool {
        if let Some(primary) = &self.primary {
            if primary.healthy().await {
                return true;
            }
        }
        self.fallback.healthy().await
    }
}
