use thiserror::Error;

/// Rejections surfaced to callers instead of being defaulted away.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeartflowError {
    #[error("invalid identity: missing {0}")]
    InvalidIdentity(&'static str),

    #[error("unknown emotion label: {0}")]
    UnknownEmotion(String),

    #[error("unknown stance: {0}")]
    UnknownStance(String),
}
