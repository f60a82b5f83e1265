//! # Heartflow Limbic System (System 1)
//!
//! Fast, non-verbal regulation of how much the bot wants to talk.
//!
//! Each conversation stream carries a single willingness scalar. Inbound
//! messages push it up (mentions, interesting topics) or down (emoji spam),
//! the slower reflection loop biases it, replies spend it, and a background
//! heartbeat pulls it back toward baseline.
//!
//! ## Signals
//!
//! - **Mention**: being addressed directly almost always earns a reply
//! - **Interest**: topical relevance from memory activation
//! - **Reflection**: the sub-mind's own 1-10 desire to speak
//! - **Continuation**: the sender is the person we just answered

mod heartbeat;
mod mention;
mod willing;

pub use heartbeat::DecayConfig;
pub use mention::is_mentioned_bot;
pub use willing::{
    reflection_bias, shape_probability, ReplyContext, WillingManager, WillingReading, WillingState,
};
