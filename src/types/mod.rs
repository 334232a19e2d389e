//! Core domain types for the sync pipeline.

pub mod event;
pub mod ids;

pub use event::{ChangeEvent, DocumentPreview, EventSource, ResourceState, TriggerMetadata};
pub use ids::{ChannelId, DocumentId, EventId, FolderId};
