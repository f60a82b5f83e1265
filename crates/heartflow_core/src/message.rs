use crate::stream::{GroupInfo, StreamId, UserInfo};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A platform message after transport-level decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: String,
    pub platform: String,
    pub user_info: UserInfo,
    pub group_info: Option<GroupInfo>,
    /// Plain-text rendering of the message segments.
    pub plain_text: String,
    /// The message consists of a single sticker/emoji and nothing else.
    pub is_emoji: bool,
    /// The transport saw an explicit @ of the bot.
    pub at_bot: bool,
    /// Unix timestamp (seconds).
    pub timestamp: i64,
    /// Extra reply probability requested by the sender side.
    pub probability_gain: Option<f64>,
}

impl InboundMessage {
    /// A plain text message stamped now.
    pub fn text(user_info: UserInfo, group_info: Option<GroupInfo>, text: &str) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            platform: user_info.platform.clone(),
            user_info,
            group_info,
            plain_text: text.to_string(),
            is_emoji: false,
            at_bot: false,
            timestamp: chrono::Utc::now().timestamp(),
            probability_gain: None,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        StreamId::derive(&self.platform, &self.user_info.user_id, self.group_info.as_ref())
    }

    /// "nickname: text" as it appears in prompts and logs.
    pub fn render_line(&self) -> String {
        format!("{}: {}", self.user_info.nickname, self.plain_text)
    }
}
