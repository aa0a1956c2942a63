//! Persistence sinks for confirmed events.
//!
//! The crawl hands every accepted event to an [`EventSink`]. Records are
//! keyed by `(event_id, source_tag)`, so re-crawling an unchanged page
//! overwrites its record instead of adding a new one.

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::FreeFoodEvent;

// Re-export for convenience
pub use local::{LocalEventStore, StoredEvent, write_json_atomic};

/// Trait for event persistence backends.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Insert or replace the record for `event` under `source_tag`.
    ///
    /// Returns the record id, or `None` when the sink keeps nothing.
    async fn upsert(&self, event: &FreeFoodEvent, source_tag: &str) -> Result<Option<String>>;
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn upsert(&self, _event: &FreeFoodEvent, _source_tag: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Record key for an event under a source tag.
pub fn record_key(source_tag: &str, event_id: &str) -> String {
    format!("{source_tag}:{event_id}")
}
