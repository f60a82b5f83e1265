//! Per-stream reflection loop ("sub-mind").
//!
//! While the bot has replied in the stream recently, every tick produces a
//! fresh internal monologue and a 1-10 rating of how much it wants to speak.
//! After `idle_threshold` without a reply the loop goes dormant and only
//! checks the clock, until a reply wakes it again.
//!
//! Periodic ticks and `do_after_reply` serialise on one cycle lock; the
//! state itself sits behind a separate `RwLock` so the engagement pipeline
//! can read the rating without waiting for an in-flight inference call.

use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::{MindContext, PromptBuilder};
use heartflow_core::config::ReflectionConfig;
use heartflow_core::{
    ConversationObserver, MemoryRetrieval, MoodSource, Personality, ScheduleSource, StreamId,
};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::{Instant, MissedTickBehavior};

static WILLING_RATING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<(\d+)>").unwrap());

const INITIAL_MIND: &str = "你什么也没想";
const NEUTRAL_RATING: u8 = 5;
const MAX_RATING: u8 = 10;

/// First bracketed integer in the model output, capped at 10. None found means 0.
pub fn parse_willing_rating(text: &str) -> u8 {
    match WILLING_RATING.captures(text) {
        Some(caps) => caps[1]
            .parse::<u64>()
            .map(|n| n.min(MAX_RATING as u64) as u8)
            .unwrap_or(MAX_RATING),
        None => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Active,
    Dormant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Idle for too long; nothing was generated.
    Dormant,
    Reflected,
}

#[derive(Debug, Clone)]
pub struct ReflectionState {
    pub current_mind: String,
    /// Every previous monologue, oldest first.
    pub past_minds: Vec<String>,
    pub mood: String,
    /// Last desire-to-speak rating (0 when the model gave none).
    pub willing: u8,
    pub last_reply_at: Instant,
    pub activity: Activity,
}

impl ReflectionState {
    fn new(mood: String) -> Self {
        Self {
            current_mind: INITIAL_MIND.to_string(),
            past_minds: Vec::new(),
            mood,
            willing: NEUTRAL_RATING,
            last_reply_at: Instant::now(),
            activity: Activity::Active,
        }
    }

    fn adopt(&mut self, mind: String) {
        let previous = std::mem::replace(&mut self.current_mind, mind);
        self.past_minds.push(previous);
    }
}

/// Collaborators a sub-mind reads from.
#[derive(Clone)]
pub struct MindServices {
    pub llm: Arc<dyn LlmClient>,
    pub memory: Arc<dyn MemoryRetrieval>,
    pub mood: Arc<dyn MoodSource>,
    pub observer: Arc<dyn ConversationObserver>,
    pub schedule: Arc<dyn ScheduleSource>,
}

pub struct SubMind {
    stream_id: StreamId,
    personality: Personality,
    config: ReflectionConfig,
    params: CompletionParams,
    services: MindServices,
    state: RwLock<ReflectionState>,
    cycle: Mutex<()>,
}

impl SubMind {
    pub fn new(
        stream_id: StreamId,
        personality: Personality,
        config: ReflectionConfig,
        params: CompletionParams,
        services: MindServices,
    ) -> Self {
        let mood = services.mood.current_mood_summary();
        Self {
            stream_id,
            personality,
            config,
            params,
            services,
            state: RwLock::new(ReflectionState::new(mood)),
            cycle: Mutex::new(()),
        }
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    pub async fn snapshot(&self) -> ReflectionState {
        self.state.read().await.clone()
    }

    pub async fn current_mind(&self) -> String {
        self.state.read().await.current_mind.clone()
    }

    /// The rating fed into the willingness engine.
    pub async fn reflection_rating(&self) -> u8 {
        self.state.read().await.willing
    }

    pub async fn activity(&self) -> Activity {
        self.state.read().await.activity
    }

    async fn is_idle(&self) -> bool {
        let last = self.state.read().await.last_reply_at;
        last.elapsed() > self.config.idle_threshold()
    }

    /// One cadence step: dormancy check, then think and judge.
    pub async fn tick(&self) -> TickOutcome {
        let _cycle = self.cycle.lock().await;

        if self.is_idle().await {
            let mut state = self.state.write().await;
            if state.activity == Activity::Active {
                tracing::debug!("{} idle, reflection going dormant", self.stream_id);
            }
            state.activity = Activity::Dormant;
            return TickOutcome::Dormant;
        }

        {
            let mut state = self.state.write().await;
            if state.activity == Activity::Dormant {
                tracing::debug!("{} reflection active again", self.stream_id);
            }
            state.activity = Activity::Active;
        }

        self.think_locked().await;
        self.judge_locked().await;
        TickOutcome::Reflected
    }

    pub async fn do_a_thinking(&self) {
        let _cycle = self.cycle.lock().await;
        self.think_locked().await;
    }

    pub async fn judge_willing(&self) -> u8 {
        let _cycle = self.cycle.lock().await;
        self.judge_locked().await
    }

    /// Re-think right after a reply was sent. Also restarts the idle clock.
    pub async fn do_after_reply(&self, reply: &str, fresh_excerpt: &str) {
        let _cycle = self.cycle.lock().await;

        let mood = self.services.mood.current_mood_summary();
        let summary = self.services.observer.talking_summary(&self.stream_id).await;
        let schedule = self.services.schedule.current_task();
        let personality = self.personality.prompt_fragment();
        let current_mind = self.current_mind().await;

        let prompt = PromptBuilder::after_reply(
            &MindContext {
                schedule: &schedule,
                personality: &personality,
                current_mind: &current_mind,
                talking_summary: &summary,
                mood: &mood,
            },
            fresh_excerpt,
            reply,
        );
        let generated = self.generate(&prompt).await;

        let mut state = self.state.write().await;
        state.mood = mood;
        state.last_reply_at = Instant::now();
        if let Some(mind) = generated {
            state.adopt(mind);
            tracing::info!("{} mind after reply: {}", self.stream_id, state.current_mind);
        }
    }

    async fn think_locked(&self) {
        let mood = self.services.mood.current_mood_summary();
        let summary = self.services.observer.talking_summary(&self.stream_id).await;
        let memories = self.recall(&summary).await;
        let schedule = self.services.schedule.current_task();
        let personality = self.personality.prompt_fragment();
        let current_mind = self.current_mind().await;

        let prompt = PromptBuilder::thinking(
            &MindContext {
                schedule: &schedule,
                personality: &personality,
                current_mind: &current_mind,
                talking_summary: &summary,
                mood: &mood,
            },
            &memories,
        );
        tracing::debug!("{} thinking prompt:\n{}", self.stream_id, prompt);
        let generated = self.generate(&prompt).await;

        let mut state = self.state.write().await;
        state.mood = mood;
        if let Some(mind) = generated {
            state.adopt(mind);
            tracing::info!("{} mind: {}", self.stream_id, state.current_mind);
        }
    }

    async fn judge_locked(&self) -> u8 {
        let (current_mind, mood) = {
            let state = self.state.read().await;
            (state.current_mind.clone(), state.mood.clone())
        };
        let prompt = PromptBuilder::willing(&self.personality.prompt_fragment(), &current_mind, &mood);

        match self.services.llm.generate(&prompt, self.params).await {
            Ok(generation) => {
                let rating = parse_willing_rating(&generation.text);
                self.state.write().await.willing = rating;
                tracing::info!("{} reply willingness: {}", self.stream_id, rating);
                rating
            }
            Err(e) => {
                tracing::warn!("{} willingness judgement failed: {:#}", self.stream_id, e);
                self.state.read().await.willing
            }
        }
    }

    /// Memory excerpts relevant to the live topic, concatenated.
    async fn recall(&self, summary: &str) -> String {
        if summary.is_empty() {
            return String::new();
        }
        match self
            .services
            .memory
            .retrieve_relevant(summary, self.config.memory_max_results, self.config.memory_max_depth)
            .await
        {
            Ok(memories) => memories.into_iter().map(|m| m.excerpt).collect(),
            Err(e) => {
                tracing::warn!("{} memory retrieval failed: {:#}", self.stream_id, e);
                String::new()
            }
        }
    }

    /// New monologue text, or `None` when inference failed or said nothing.
    async fn generate(&self, prompt: &str) -> Option<String> {
        match self.services.llm.generate(prompt, self.params).await {
            Ok(generation) if !generation.is_empty() => Some(generation.text.trim().to_string()),
            Ok(_) => {
                tracing::debug!("{} inference returned nothing", self.stream_id);
                None
            }
            Err(e) => {
                tracing::warn!("{} reflection inference failed: {:#}", self.stream_id, e);
                None
            }
        }
    }

    /// Tick on the configured cadence until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }
        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("{} reflection loop stopped", self.stream_id);
                        break;
                    }
                }
            }
        }
    }
}
