//! Process configuration, read once at startup from the environment.
//!
//! Required settings fail startup with a named variable rather than
//! defaulting to something that silently accepts or drops traffic.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::types::FolderId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Result type for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone)]
pub struct Config {
    pub folder: FolderId,
    pub provider_access_token: String,

    pub bucket: String,
    pub region: String,
    pub storage_prefix: String,

    pub queue_dir: PathBuf,
    pub redis_url: Option<String>,
    pub state_file: PathBuf,

    pub host: IpAddr,
    pub port: u16,
    pub verification_token: String,
    pub allowed_addrs: Vec<IpAddr>,

    pub poll_interval: Duration,
    pub warmup: chrono::Duration,
    pub shutdown_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let poll_minutes: u64 = parsed(&lookup, "SYNC_CHECK_INTERVAL_MINUTES", 2)?;
        let warmup_minutes: i64 = parsed(&lookup, "SYNC_WARMUP_MINUTES", 10)?;
        let shutdown_secs: u64 = parsed(&lookup, "SHUTDOWN_TIMEOUT_SECS", 30)?;

        Ok(Config {
            folder: FolderId::new(required(&lookup, "SYNC_FOLDER_ID")?),
            provider_access_token: required(&lookup, "PROVIDER_ACCESS_TOKEN")?,
            bucket: required(&lookup, "AWS_S3_BUCKET")?,
            region: defaulted(&lookup, "AWS_REGION", "us-east-1"),
            storage_prefix: defaulted(&lookup, "STORAGE_PREFIX", "drive-sync"),
            queue_dir: PathBuf::from(defaulted(&lookup, "QUEUE_DIR", "./queue")),
            redis_url: lookup("REDIS_URL").filter(|v| !v.is_empty()),
            state_file: PathBuf::from(defaulted(&lookup, "SYNC_STATE_FILE", "./sync_state.json")),
            host: parsed(&lookup, "WEBHOOK_HOST", IpAddr::from([0, 0, 0, 0]))?,
            port: parsed(&lookup, "WEBHOOK_PORT", 5000)?,
            verification_token: required(&lookup, "WEBHOOK_VERIFICATION_TOKEN")?,
            allowed_addrs: parse_allowed_addrs(
                &defaulted(&lookup, "ALLOWED_IPS", "127.0.0.1,::1"),
            )?,
            poll_interval: Duration::from_secs(poll_minutes * 60),
            warmup: chrono::Duration::minutes(warmup_minutes),
            shutdown_timeout: Duration::from_secs(shutdown_secs),
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<String> {
    lookup(name)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

fn defaulted(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    lookup(name)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(name).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|err: T::Err| ConfigError::InvalidVar {
            name,
            value,
            reason: err.to_string(),
        }),
    }
}

/// The allowlist never ends up open: an empty value degrades to loopback
/// and a malformed entry is a startup error rather than a silently open
/// endpoint.
fn parse_allowed_addrs(raw: &str) -> Result<Vec<IpAddr>> {
    let addrs: Vec<IpAddr> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse().map_err(|_| ConfigError::InvalidVar {
                name: "ALLOWED_IPS",
                value: part.to_string(),
                reason: "not an IP address".to_string(),
            })
        })
        .collect::<Result<_>>()?;
    if addrs.is_empty() {
        return Ok(vec![
            IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
        ]);
    }
    Ok(addrs)
}
