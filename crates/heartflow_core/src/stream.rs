//! Conversation streams: one per group chat or private chat.

use crate::error::HeartflowError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(String);

impl StreamId {
    /// Group chats are keyed by group, private chats by the peer.
    pub fn derive(platform: &str, user_id: &str, group: Option<&GroupInfo>) -> Self {
        match group {
            Some(g) => Self(format!("{}:group:{}", platform, g.group_id)),
            None => Self(format!("{}:private:{}", platform, user_id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub platform: String,
    pub user_id: String,
    pub nickname: String,
    /// Group card name, if the platform has one.
    pub cardname: Option<String>,
}

impl UserInfo {
    pub fn new(platform: &str, user_id: &str, nickname: &str) -> Self {
        Self {
            platform: platform.to_string(),
            user_id: user_id.to_string(),
            nickname: nickname.to_string(),
            cardname: None,
        }
    }

    pub fn validate(&self) -> Result<(), HeartflowError> {
        if self.user_id.trim().is_empty() {
            return Err(HeartflowError::InvalidIdentity("user_id"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: String,
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationStream {
    pub stream_id: StreamId,
    pub platform: String,
    /// Most recent sender observed in this stream.
    pub user_info: UserInfo,
    pub group_info: Option<GroupInfo>,
    pub participants: BTreeSet<String>,
    pub created_at: i64,
    pub last_active_at: i64,
}

impl ConversationStream {
    pub fn is_group(&self) -> bool {
        self.group_info.is_some()
    }

    pub fn display_name(&self) -> String {
        match &self.group_info {
            Some(GroupInfo {
                group_name: Some(name),
                ..
            }) => name.clone(),
            Some(_) => "群聊".to_string(),
            None => "私聊".to_string(),
        }
    }
}

/// Process-wide map of streams, keyed by identity. Streams are never removed.
#[derive(Default)]
pub struct StreamRegistry {
    streams: RwLock<HashMap<StreamId, ConversationStream>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(
        &self,
        platform: &str,
        user: &UserInfo,
        group: Option<&GroupInfo>,
    ) -> Result<ConversationStream, HeartflowError> {
        if platform.trim().is_empty() {
            return Err(HeartflowError::InvalidIdentity("platform"));
        }
        user.validate()?;

        let stream_id = StreamId::derive(platform, &user.user_id, group);
        let now = chrono::Utc::now().timestamp();

        let mut streams = self.streams.write().await;
        let stream = streams
            .entry(stream_id.clone())
            .or_insert_with(|| {
                tracing::debug!("New conversation stream: {}", stream_id);
                ConversationStream {
                    stream_id: stream_id.clone(),
                    platform: platform.to_string(),
                    user_info: user.clone(),
                    group_info: group.cloned(),
                    participants: BTreeSet::new(),
                    created_at: now,
                    last_active_at: now,
                }
            });

        stream.user_info = user.clone();
        if let Some(g) = group {
            // Group names change; keep the freshest one.
            stream.group_info = Some(g.clone());
        }
        stream.participants.insert(user.user_id.clone());
        stream.last_active_at = now;

        Ok(stream.clone())
    }

    pub async fn get(&self, stream_id: &StreamId) -> Option<ConversationStream> {
        self.streams.read().await.get(stream_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.streams.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.streams.read().await.is_empty()
    }
}
