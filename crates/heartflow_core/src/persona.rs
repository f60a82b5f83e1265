use crate::config::BotConfig;
use serde::{Deserialize, Serialize};

/// The stable personality profile injected into every prompt.
///
/// Unlike the mood, this never changes while the process runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Personality {
    pub nickname: String,
    pub traits: Vec<String>,
}

impl Default for Personality {
    fn default() -> Self {
        Self::from_config(&BotConfig::default())
    }
}

impl Personality {
    pub fn from_config(bot: &BotConfig) -> Self {
        Self {
            nickname: bot.nickname.clone(),
            traits: bot.personality.clone(),
        }
    }

    /// "你是麦麦，是一个大学生…" style self-description.
    pub fn prompt_fragment(&self) -> String {
        if self.traits.is_empty() {
            return format!("你是{}", self.nickname);
        }
        format!("你是{}，{}", self.nickname, self.traits.join("，"))
    }
}
