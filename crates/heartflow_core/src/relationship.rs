//! Relationship records shared between the store and the update algorithm.

use crate::error::HeartflowError;
use crate::stream::UserInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relationship values live in this closed range.
pub const RELATIONSHIP_MIN: f64 = -1000.0;
pub const RELATIONSHIP_MAX: f64 = 1000.0;

const DEFAULT_PLATFORM: &str = "qq";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipKey {
    pub user_id: String,
    pub platform: String,
}

impl RelationshipKey {
    pub fn new(user_id: &str, platform: &str) -> Result<Self, HeartflowError> {
        if user_id.trim().is_empty() {
            return Err(HeartflowError::InvalidIdentity("user_id"));
        }
        let platform = if platform.trim().is_empty() {
            DEFAULT_PLATFORM
        } else {
            platform
        };
        Ok(Self {
            user_id: user_id.to_string(),
            platform: platform.to_string(),
        })
    }

    pub fn from_user(user: &UserInfo) -> Result<Self, HeartflowError> {
        Self::new(&user.user_id, &user.platform)
    }
}

impl fmt::Display for RelationshipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.user_id, self.platform)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub user_id: String,
    pub platform: String,
    pub nickname: String,
    pub value: f64,
    pub gender: Option<String>,
    pub age: Option<u32>,
    /// False while the in-memory copy has changes the store has not seen.
    #[serde(default)]
    pub saved: bool,
}

impl Relationship {
    /// Fresh neutral relationship from a live user snapshot.
    pub fn from_user(user: &UserInfo) -> Result<Self, HeartflowError> {
        let key = RelationshipKey::from_user(user)?;
        Ok(Self {
            user_id: key.user_id,
            platform: key.platform,
            nickname: user.nickname.clone(),
            value: 0.0,
            gender: None,
            age: None,
            saved: false,
        })
    }

    pub fn key(&self) -> RelationshipKey {
        RelationshipKey {
            user_id: self.user_id.clone(),
            platform: self.platform.clone(),
        }
    }

    pub fn level(&self) -> RelationshipLevel {
        RelationshipLevel::from_value(self.value)
    }

    /// Apply the mutable fields of an update; `None` leaves a field alone.
    pub fn apply(&mut self, update: &RelationshipUpdate) {
        if let Some(nickname) = &update.nickname {
            self.nickname = nickname.clone();
        }
        if let Some(gender) = &update.gender {
            self.gender = Some(gender.clone());
        }
        if let Some(age) = update.age {
            self.age = Some(age);
        }
        self.saved = false;
    }

    /// Additive change, clamped to the valid range.
    pub fn add_value(&mut self, delta: f64) {
        self.value = (self.value + delta).clamp(RELATIONSHIP_MIN, RELATIONSHIP_MAX);
        self.saved = false;
    }
}

/// The few fields that may be changed outside the value update path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipUpdate {
    pub nickname: Option<String>,
    pub gender: Option<String>,
    pub age: Option<u32>,
}

/// Display tiers derived from the relationship value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelationshipLevel {
    Disgust = 0,
    Dislike = 1,
    Neutral = 2,
    Friendly = 3,
    Fond = 4,
    Intimate = 5,
}

impl RelationshipLevel {
    pub fn from_value(value: f64) -> Self {
        if value < -227.0 {
            RelationshipLevel::Disgust
        } else if value < -73.0 {
            RelationshipLevel::Dislike
        } else if value < 227.0 {
            RelationshipLevel::Neutral
        } else if value < 587.0 {
            RelationshipLevel::Friendly
        } else if value < 900.0 {
            RelationshipLevel::Fond
        } else {
            RelationshipLevel::Intimate
        }
    }

    pub fn as_zh(self) -> &'static str {
        match self {
            RelationshipLevel::Disgust => "厌恶",
            RelationshipLevel::Dislike => "冷漠",
            RelationshipLevel::Neutral => "一般",
            RelationshipLevel::Friendly => "友好",
            RelationshipLevel::Fond => "喜欢",
            RelationshipLevel::Intimate => "暧昧",
        }
    }

    /// How the bot should lean when replying to someone at this level.
    pub fn reply_attitude(self) -> &'static str {
        match self {
            RelationshipLevel::Disgust => "冷漠回应",
            RelationshipLevel::Dislike => "冷淡回复",
            RelationshipLevel::Neutral => "保持理性",
            RelationshipLevel::Friendly => "愿意回复",
            RelationshipLevel::Fond => "积极回复",
            RelationshipLevel::Intimate => "无条件支持",
        }
    }
}
