//! Change events transported over the work queue.
//!
//! A [`ChangeEvent`] signals that the watched folder *may* have changed. It
//! deliberately carries no file identity: the worker re-derives the set of
//! documents to sync by listing the folder's live contents, which makes
//! duplicate and out-of-order events harmless.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ChannelId, DocumentId, EventId};

/// Event type label for push-sourced events.
const EVENT_TYPE_PUSH: &str = "webhook_received";
/// Event type label for poll-sourced events.
const EVENT_TYPE_POLL: &str = "scheduled_sync";

/// Resource states accepted from the push notification channel.
///
/// Any value outside this enumeration is rejected at ingestion with a
/// 400-class response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Sync,
    Update,
    Exists,
    NotExists,
    Trash,
    Untrash,
}

impl ResourceState {
    /// Parses a resource-state header value. Returns `None` for anything
    /// outside the fixed enumeration.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sync" => Some(ResourceState::Sync),
            "update" => Some(ResourceState::Update),
            "exists" => Some(ResourceState::Exists),
            "not_exists" => Some(ResourceState::NotExists),
            "trash" => Some(ResourceState::Trash),
            "untrash" => Some(ResourceState::Untrash),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Sync => "sync",
            ResourceState::Update => "update",
            ResourceState::Exists => "exists",
            ResourceState::NotExists => "not_exists",
            ResourceState::Trash => "trash",
            ResourceState::Untrash => "untrash",
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an event originated from an inbound notification or the periodic scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Push,
    Poll,
}

/// A bounded preview of one changed document, attached to poll events for
/// observability. Never used to drive processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPreview {
    pub id: DocumentId,
    pub name: String,
    pub modified_time: Option<DateTime<Utc>>,
}

/// Source-specific metadata recorded on the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerMetadata {
    /// An inbound push notification.
    Push {
        channel_id: ChannelId,
        resource_id: Option<String>,
        client_addr: Option<IpAddr>,
    },
    /// A periodic poll that found changes.
    Poll {
        files_found: usize,
        preview: Vec<DocumentPreview>,
    },
}

/// An internal, queue-transported record signaling that the watched folder
/// may have changed. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_id: EventId,
    pub event_type: String,
    pub resource_state: ResourceState,
    /// Receipt time (push) or poll time, never the provider's timestamp.
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    pub trigger: TriggerMetadata,
}

impl ChangeEvent {
    /// Builds a push-sourced event from a validated notification.
    ///
    /// The event id is the notification channel id; the timestamp is the
    /// receipt time supplied by the caller.
    pub fn push(
        channel_id: ChannelId,
        resource_state: ResourceState,
        resource_id: Option<String>,
        client_addr: Option<IpAddr>,
        received_at: DateTime<Utc>,
    ) -> Self {
        ChangeEvent {
            event_id: EventId::new(channel_id.as_str()),
            event_type: EVENT_TYPE_PUSH.to_string(),
            resource_state,
            timestamp: received_at,
            source: EventSource::Push,
            trigger: TriggerMetadata::Push {
                channel_id,
                resource_id,
                client_addr,
            },
        }
    }

    /// Builds a poll-sourced event for a set of changed documents.
    ///
    /// `preview` should already be bounded by the caller.
    pub fn poll(
        files_found: usize,
        preview: Vec<DocumentPreview>,
        polled_at: DateTime<Utc>,
    ) -> Self {
        ChangeEvent {
            event_id: EventId::new(format!("poll-{}", polled_at.timestamp())),
            event_type: EVENT_TYPE_POLL.to_string(),
            resource_state: ResourceState::Update,
            timestamp: polled_at,
            source: EventSource::Poll,
            trigger: TriggerMetadata::Poll {
                files_found,
                preview,
            },
        }
    }

    /// The event timestamp as an ISO-8601 UTC string with `Z` suffix.
    pub fn timestamp_rfc3339(&self) -> String {
        Self::format_timestamp(self.timestamp)
    }

    /// The timestamp format used everywhere an event time is rendered.
    pub fn format_timestamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn resource_state_parses_all_valid_values() {
        for (s, expected) in [
            ("sync", ResourceState::Sync),
            ("update", ResourceState::Update),
            ("exists", ResourceState::Exists),
            ("not_exists", ResourceState::NotExists),
            ("trash", ResourceState::Trash),
            ("untrash", ResourceState::Untrash),
        ] {
            assert_eq!(ResourceState::parse(s), Some(expected));
        }
    }

    #[test]
    fn resource_state_rejects_unknown_values() {
        for s in ["", "Update", "deleted", "sync ", "file.update"] {
            assert_eq!(ResourceState::parse(s), None);
        }
    }

    #[test]
    fn push_event_uses_channel_id_as_event_id() {
        let event = ChangeEvent::push(
            ChannelId::new("chan-42"),
            ResourceState::Update,
            Some("res-1".to_string()),
            None,
            Utc::now(),
        );
        assert_eq!(event.event_id.as_str(), "chan-42");
        assert_eq!(event.source, EventSource::Push);
        assert_eq!(event.event_type, "webhook_received");
    }

    #[test]
    fn poll_event_carries_preview() {
        let preview = vec![DocumentPreview {
            id: DocumentId::new("doc-1"),
            name: "report.txt".to_string(),
            modified_time: None,
        }];
        let event = ChangeEvent::poll(7, preview.clone(), Utc::now());
        assert_eq!(event.source, EventSource::Poll);
        assert_eq!(
            event.trigger,
            TriggerMetadata::Poll {
                files_found: 7,
                preview,
            }
        );
    }

    #[test]
    fn timestamp_is_z_suffixed() {
        let event = ChangeEvent::poll(0, Vec::new(), Utc::now());
        assert!(event.timestamp_rfc3339().ends_with('Z'));
    }

    proptest! {
        #[test]
        fn event_serde_roundtrip(
            channel in "[a-zA-Z0-9-]{1,30}",
            resource in prop::option::of("[a-zA-Z0-9]{1,20}"),
        ) {
            let event = ChangeEvent::push(
                ChannelId::new(&channel),
                ResourceState::Sync,
                resource,
                Some("127.0.0.1".parse().unwrap()),
                Utc::now(),
            );
            let json = serde_json::to_string(&event).unwrap();
            let parsed: ChangeEvent = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(event, parsed);
        }

        #[test]
        fn resource_state_parse_matches_as_str(state in prop::sample::select(vec![
            ResourceState::Sync,
            ResourceState::Update,
            ResourceState::Exists,
            ResourceState::NotExists,
            ResourceState::Trash,
            ResourceState::Untrash,
        ])) {
            prop_assert_eq!(ResourceState::parse(state.as_str()), Some(state));
        }
    }
}
