//! Per-stream willingness and the reply probability derived from it.

use crate::heartbeat::DecayConfig;
use heartflow_core::config::WillingConfig;
use heartflow_core::StreamId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

/// Persistent willingness of one stream.
#[derive(Debug, Clone)]
pub struct WillingState {
    pub willing: f64,
    pub updated_at: Instant,
    last_replied_sender: Option<String>,
    last_replied_at: Option<Instant>,
}

impl WillingState {
    fn new(baseline: f64) -> Self {
        Self {
            willing: baseline,
            updated_at: Instant::now(),
            last_replied_sender: None,
            last_replied_at: None,
        }
    }

    fn is_continuation(&self, sender_id: &str, window: Duration, now: Instant) -> bool {
        match (&self.last_replied_sender, self.last_replied_at) {
            (Some(sender), Some(at)) => sender == sender_id && now.duration_since(at) <= window,
            _ => false,
        }
    }
}

/// Everything the engine looks at for one inbound message.
#[derive(Debug, Clone)]
pub struct ReplyContext<'a> {
    pub stream_id: &'a StreamId,
    pub is_mentioned: bool,
    pub is_emoji: bool,
    /// Topical relevance, 0.0 = irrelevant.
    pub interest_rate: f32,
    pub sender_id: &'a str,
    /// The reflection loop's 0-10 desire to speak, if one is running.
    pub reflection_rating: Option<u8>,
}

/// Result of one probability computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WillingReading {
    /// Willingness after blending in the reflection bias, before stimulus.
    pub blended: f64,
    /// Willingness persisted after this message.
    pub willing: f64,
    pub probability: f64,
}

/// Map a 1-10 reflection rating onto a signed bias (5 is neutral).
pub fn reflection_bias(rating: u8) -> f64 {
    (f64::from(rating) - 5.0) / 4.0
}

/// Willingness → probability. Monotone, clamped to [0, 1].
pub fn shape_probability(willing: f64, config: &WillingConfig) -> f64 {
    ((willing - 0.5) * 2.0 * config.willing_amplifier.max(0.0)).clamp(0.0, 1.0)
}

/// Apply one message's stimulus to a willingness value.
///
/// Every step is non-decreasing in its input, so the result is monotone in
/// `interest_rate` with everything else fixed.
fn apply_stimulus(willing: f64, ctx: &ReplyContext<'_>, continuation: bool, config: &WillingConfig) -> f64 {
    let mut w = willing;

    let interest = f64::from(ctx.interest_rate.max(0.0)) * config.interest_amplifier.max(0.0);
    if interest > config.interest_threshold {
        w += (interest - config.interest_offset).max(0.0);
    }

    if ctx.is_mentioned {
        // +mention_boost below 1, +mention_saturated_boost above it, but never
        // less than the 1 + mention_boost a value just under 1 would reach.
        w = (w + config.mention_saturated_boost).max(w.min(1.0) + config.mention_boost);
    }

    if continuation {
        w += config.continuation_boost;
    }

    if ctx.is_emoji {
        w *= config.emoji_factor.max(0.0);
    }

    w.min(config.max_willing)
}

/// Owns the willingness of every stream.
///
/// All read-modify-write sequences for a stream run inside one critical
/// section, so two messages for the same stream never interleave.
pub struct WillingManager {
    states: Arc<Mutex<HashMap<StreamId, WillingState>>>,
    config: WillingConfig,
}

impl WillingManager {
    pub fn new(config: WillingConfig) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> &WillingConfig {
        &self.config
    }

    pub async fn get_willing(&self, stream_id: &StreamId) -> f64 {
        self.states
            .lock()
            .await
            .get(stream_id)
            .map(|s| s.willing)
            .unwrap_or(self.config.baseline)
    }

    pub async fn set_willing(&self, stream_id: &StreamId, willing: f64) {
        let baseline = self.config.baseline;
        let mut states = self.states.lock().await;
        let state = states
            .entry(stream_id.clone())
            .or_insert_with(|| WillingState::new(baseline));
        state.willing = willing;
        state.updated_at = Instant::now();
    }

    /// Blend in the reflection bias, apply the message stimulus, persist,
    /// and return the reply probability.
    pub async fn compute_reply_probability(&self, ctx: &ReplyContext<'_>) -> WillingReading {
        let now = Instant::now();
        let mut states = self.states.lock().await;
        let state = states
            .entry(ctx.stream_id.clone())
            .or_insert_with(|| WillingState::new(self.config.baseline));

        let blended = match ctx.reflection_rating {
            Some(rating) => (state.willing + reflection_bias(rating)) / 2.0,
            None => state.willing,
        };

        let window = Duration::from_secs(self.config.continuation_window_secs);
        let continuation = state.is_continuation(ctx.sender_id, window, now);
        let willing = apply_stimulus(blended, ctx, continuation, &self.config);

        state.willing = willing;
        state.updated_at = now;

        let probability = shape_probability(willing, &self.config);
        tracing::debug!(
            "Willing[{}]: blended={:.2} -> {:.2}, p={:.3} (mentioned={}, emoji={}, interest={:.2}, continuation={})",
            ctx.stream_id,
            blended,
            willing,
            probability,
            ctx.is_mentioned,
            ctx.is_emoji,
            ctx.interest_rate,
            continuation,
        );

        WillingReading {
            blended,
            willing,
            probability,
        }
    }

    /// A reply was queued: spend willingness and remember who we answered.
    pub async fn change_reply_willing_sent(&self, stream_id: &StreamId, sender_id: &str) {
        let now = Instant::now();
        let baseline = self.config.baseline;
        let mut states = self.states.lock().await;
        let state = states
            .entry(stream_id.clone())
            .or_insert_with(|| WillingState::new(baseline));

        if state.willing > baseline {
            state.willing = (state.willing - self.config.reply_penalty).max(baseline);
        }
        state.updated_at = now;
        state.last_replied_sender = Some(sender_id.to_string());
        state.last_replied_at = Some(now);
    }

    /// One decay step for every stream.
    pub async fn decay_all(&self, factor: f64) {
        decay_states(&self.states, self.config.baseline, factor).await;
    }

    /// Spawn the background decay heartbeat. Stops when `shutdown` flips to true.
    pub fn spawn_decay(&self, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let states = Arc::clone(&self.states);
        let baseline = self.config.baseline;
        let decay = DecayConfig::from_willing(&self.config);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(decay.interval);
            // The first tick fires immediately; skip it.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        decay_states(&states, baseline, decay.factor).await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!("Willing decay heartbeat stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}

async fn decay_states(states: &Mutex<HashMap<StreamId, WillingState>>, baseline: f64, factor: f64) {
    let mut states = states.lock().await;
    for state in states.values_mut() {
        state.willing = baseline + (state.willing - baseline) * factor;
    }
}
