//! Discrete emotion labels and stances detected on the bot's own replies.
//!
//! The inference collaborator answers in Chinese most of the time, so both
//! Chinese and English spellings parse.

use crate::error::HeartflowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Joy,
    Anger,
    Sadness,
    Surprise,
    Shyness,
    Calm,
    Fear,
    Disgust,
    Confusion,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 9] = [
        EmotionLabel::Joy,
        EmotionLabel::Anger,
        EmotionLabel::Sadness,
        EmotionLabel::Surprise,
        EmotionLabel::Shyness,
        EmotionLabel::Calm,
        EmotionLabel::Fear,
        EmotionLabel::Disgust,
        EmotionLabel::Confusion,
    ];

    /// Signed base magnitude fed into the relationship update.
    pub fn base_delta(self) -> f64 {
        match self {
            EmotionLabel::Joy => 1.5,
            EmotionLabel::Anger => -3.5,
            EmotionLabel::Sadness => -1.5,
            EmotionLabel::Surprise => 0.6,
            EmotionLabel::Shyness => 2.0,
            EmotionLabel::Calm => 0.3,
            EmotionLabel::Fear => -2.0,
            EmotionLabel::Disgust => -2.5,
            EmotionLabel::Confusion => 0.5,
        }
    }

    pub fn is_positive(self) -> bool {
        self.base_delta() >= 0.0
    }

    pub fn as_zh(self) -> &'static str {
        match self {
            EmotionLabel::Joy => "开心",
            EmotionLabel::Anger => "愤怒",
            EmotionLabel::Sadness => "悲伤",
            EmotionLabel::Surprise => "惊讶",
            EmotionLabel::Shyness => "害羞",
            EmotionLabel::Calm => "平静",
            EmotionLabel::Fear => "恐惧",
            EmotionLabel::Disgust => "厌恶",
            EmotionLabel::Confusion => "困惑",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_zh())
    }
}

impl FromStr for EmotionLabel {
    type Err = HeartflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = match s.trim().to_lowercase().as_str() {
            "开心" | "joy" | "happy" => EmotionLabel::Joy,
            "愤怒" | "anger" | "angry" => EmotionLabel::Anger,
            "悲伤" | "sadness" | "sad" => EmotionLabel::Sadness,
            "惊讶" | "surprise" | "surprised" => EmotionLabel::Surprise,
            "害羞" | "shyness" | "shy" => EmotionLabel::Shyness,
            "平静" | "calm" => EmotionLabel::Calm,
            "恐惧" | "fear" | "afraid" => EmotionLabel::Fear,
            "厌恶" | "disgust" | "disgusted" => EmotionLabel::Disgust,
            "困惑" | "confusion" | "confused" => EmotionLabel::Confusion,
            other => return Err(HeartflowError::UnknownEmotion(other.to_string())),
        };
        Ok(label)
    }
}

/// Whether the reply supports, ignores, or pushes back on what was said.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Supportive,
    Neutral,
    Opposed,
}

impl Stance {
    /// Whether an emotion of the given sign may move the relationship.
    pub fn admits(self, positive: bool) -> bool {
        match self {
            Stance::Supportive => positive,
            Stance::Opposed => !positive,
            Stance::Neutral => true,
        }
    }

    pub fn as_zh(self) -> &'static str {
        match self {
            Stance::Supportive => "支持",
            Stance::Neutral => "中立",
            Stance::Opposed => "反对",
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_zh())
    }
}

impl FromStr for Stance {
    type Err = HeartflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "支持" | "supportive" | "support" => Ok(Stance::Supportive),
            "中立" | "neutral" => Ok(Stance::Neutral),
            "反对" | "opposed" | "oppose" => Ok(Stance::Opposed),
            other => Err(HeartflowError::UnknownStance(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chinese_and_english() {
        assert_eq!("开心".parse::<EmotionLabel>().unwrap(), EmotionLabel::Joy);
        assert_eq!(" Calm ".parse::<EmotionLabel>().unwrap(), EmotionLabel::Calm);
        assert_eq!("反对".parse::<Stance>().unwrap(), Stance::Opposed);
        assert_eq!("neutral".parse::<Stance>().unwrap(), Stance::Neutral);
    }

    #[test]
    fn test_unknown_labels_are_errors() {
        assert_eq!(
            "无聊".parse::<EmotionLabel>(),
            Err(HeartflowError::UnknownEmotion("无聊".to_string()))
        );
        assert!("maybe".parse::<Stance>().is_err());
    }

    #[test]
    fn test_zh_roundtrip_covers_every_label() {
        for label in EmotionLabel::ALL {
            assert_eq!(label.as_zh().parse::<EmotionLabel>().unwrap(), label);
        }
    }

    #[test]
    fn test_stance_gating() {
        assert!(Stance::Neutral.admits(true));
        assert!(Stance::Neutral.admits(false));
        assert!(!Stance::Opposed.admits(true));
        assert!(Stance::Opposed.admits(false));
        assert!(Stance::Supportive.admits(true));
        assert!(!Stance::Supportive.admits(false));
    }
}
