//! The event type produced by the parser.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Event type used when a block carries no `event:` field.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// A fully parsed Server-Sent Events (SSE) event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseEvent {
    /// Event type, `"message"` unless the block set one.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data. Multiple `data:` lines are joined with `\n`.
    pub data: String,
    /// Event ID from this block's `id:` field, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Reconnection time in milliseconds, if the server ever suggested one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u64>,
}

impl SseEvent {
    /// Create a new `message` event with just data.
    pub fn new(data: impl Into<String>) -> Self {
        Self::with_type(DEFAULT_EVENT_TYPE, data)
    }

    /// Create a new SSE event with event type and data.
    pub fn with_type(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
            id: None,
            retry: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_retry(mut self, retry: u64) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Check if this event has the default `message` type.
    pub fn is_message(&self) -> bool {
        self.event_type == DEFAULT_EVENT_TYPE
    }

    /// The suggested reconnection delay as a [`Duration`].
    pub fn retry_delay(&self) -> Option<Duration> {
        self.retry.map(Duration::from_millis)
    }
}
