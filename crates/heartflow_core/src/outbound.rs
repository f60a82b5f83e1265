//! Entries of the per-stream outbound queue.

use crate::message::InboundMessage;
use crate::stream::StreamId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaceholderId(String);

impl PlaceholderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Marks an in-flight reply generation in the outbound queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingPlaceholder {
    pub id: PlaceholderId,
    pub stream_id: StreamId,
    /// The inbound message the reply is for.
    pub reply_to: InboundMessage,
    /// Unix seconds with sub-second precision.
    pub started_at: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundSegment {
    pub text: String,
    /// First segment of a reply chain; renderers group the rest under it.
    pub is_head: bool,
    pub reply_to_message_id: String,
}

/// A complete reply, ready for the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSet {
    pub stream_id: StreamId,
    pub thinking_id: PlaceholderId,
    pub thinking_started_at: f64,
    pub segments: Vec<OutboundSegment>,
}

impl MessageSet {
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutboundEntry {
    Thinking(ThinkingPlaceholder),
    Sending(MessageSet),
}

impl OutboundEntry {
    pub fn placeholder_id(&self) -> Option<&PlaceholderId> {
        match self {
            OutboundEntry::Thinking(p) => Some(&p.id),
            OutboundEntry::Sending(_) => None,
        }
    }
}
