//! # Heartflow Reasoning (System 2)
//!
//! The slow, verbal side: inference providers, prompt assembly, the
//! per-stream reflection loop, and the engagement pipeline that decides
//! whether and how the bot answers a message.

pub mod chat;
pub mod heartflow;
pub mod llm;
pub mod prompts;
pub mod providers;
pub mod retry;
pub mod submind;

pub use chat::{ChatBot, ChatServices, Engagement};
pub use heartflow::Heartflow;
pub use llm::{CompletionParams, Generation, LlmClient};
pub use providers::{create_client, OpenAiCompatClient, ScriptedClient};
pub use submind::{parse_willing_rating, Activity, MindServices, ReflectionState, SubMind, TickOutcome};
