pub mod config;
pub mod emotion;
pub mod error;
pub mod message;
pub mod outbound;
pub mod persona;
pub mod relationship;
pub mod stream;

pub use config::HeartflowConfig;
pub use emotion::{EmotionLabel, Stance};
pub use error::HeartflowError;
pub use message::InboundMessage;
pub use outbound::{MessageSet, OutboundEntry, OutboundSegment, PlaceholderId, ThinkingPlaceholder};
pub use persona::Personality;
pub use relationship::{Relationship, RelationshipKey, RelationshipLevel, RelationshipUpdate};
pub use stream::{ConversationStream, GroupInfo, StreamId, StreamRegistry, UserInfo};

use async_trait::async_trait;

/// A memory fragment recalled for a piece of text, with its activation score.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalledMemory {
    pub score: f32,
    pub excerpt: String,
}

/// Long-term memory retrieval. An empty result is a valid answer.
#[async_trait]
pub trait MemoryRetrieval: Send + Sync {
    async fn retrieve_relevant(
        &self,
        text: &str,
        max_results: usize,
        max_depth: usize,
    ) -> anyhow::Result<Vec<RecalledMemory>>;
}

/// Topical relevance of a message for the bot (0.0 = irrelevant).
#[async_trait]
pub trait InterestScorer: Send + Sync {
    async fn score_relevance(&self, text: &str) -> anyhow::Result<f32>;
}

/// Persisted per-user relationship values.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    async fn load(&self, key: &RelationshipKey) -> anyhow::Result<Option<Relationship>>;
    async fn load_all(&self) -> anyhow::Result<Vec<Relationship>>;
    async fn upsert(&self, relationship: &Relationship) -> anyhow::Result<()>;
}

/// Per-stream outbound queue the placeholder lifecycle writes into.
#[async_trait]
pub trait OutboundDispatch: Send + Sync {
    async fn enqueue(&self, stream_id: &StreamId, entry: OutboundEntry);
    async fn find_and_remove(
        &self,
        stream_id: &StreamId,
        placeholder_id: &PlaceholderId,
    ) -> Option<ThinkingPlaceholder>;
}

/// Source of the bot's current mood, owned outside the engagement core.
pub trait MoodSource: Send + Sync {
    fn current_mood_summary(&self) -> String;

    /// Nudge the mood after an emotion was detected in a reply.
    fn update_from_emotion(&self, _emotion: EmotionLabel, _intensity: f32) {}
}

/// Read access to what is being said in a stream.
#[async_trait]
pub trait ConversationObserver: Send + Sync {
    /// Rolling summary of the current topic.
    async fn talking_summary(&self, stream_id: &StreamId) -> String;
    /// The freshest `limit` messages rendered as plain text.
    async fn recent_excerpt(&self, stream_id: &StreamId, limit: usize) -> String;
}

/// What the bot is "doing" right now according to its daily schedule.
pub trait ScheduleSource: Send + Sync {
    fn current_task(&self) -> String;
}
