//! Event-driven pipeline syncing a watched document folder into object
//! storage.
//!
//! Two event sources feed one durable work queue: an HTTP webhook receiving
//! push notifications and a cursor-backed poller that catches anything the
//! push channel missed. A single worker consumes the queue, re-lists the
//! watched folder, and uploads every document it finds under fresh
//! time-partitioned keys, each with a companion audit record.
//!
//! Events are treated as hints, never as file manifests: correctness comes
//! from re-deriving the folder contents at processing time, which makes
//! duplicate, reordered, and redelivered events harmless.

pub mod config;
pub mod cursor;
pub mod poller;
pub mod provider;
pub mod queue;
pub mod server;
pub mod shutdown;
pub mod storage;
pub mod types;
pub mod worker;

#[cfg(test)]
pub mod test_utils;
