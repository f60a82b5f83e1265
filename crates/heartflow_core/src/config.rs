use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeartflowConfig {
    pub bot: BotConfig,
    pub llm: LlmConfig,
    pub willing: WillingConfig,
    pub reflection: ReflectionConfig,
    pub relationship: RelationshipConfig,
    pub outbound: OutboundConfig,
    /// When disabled, the reflection loop's rating is not blended into
    /// willingness and no sub-minds are started.
    pub enable_think_flow: bool,
}

impl Default for HeartflowConfig {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            llm: LlmConfig::default(),
            willing: WillingConfig::default(),
            reflection: ReflectionConfig::default(),
            relationship: RelationshipConfig::default(),
            outbound: OutboundConfig::default(),
            enable_think_flow: true,
        }
    }
}

impl HeartflowConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: HeartflowConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Some(v) = var("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = var("LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = var("LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(n) = var("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.llm.max_tokens = n;
        }
        if let Some(n) = var("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.llm.temperature = n;
        }
        if let Some(v) = var("BOT_NICKNAME") {
            self.bot.nickname = v;
        }
        if let Some(v) = var("HEARTFLOW_DB") {
            self.relationship.db_path = Some(v);
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub user_id: String,
    pub nickname: String,
    /// Other names that count as addressing the bot.
    pub aliases: Vec<String>,
    /// Personality lines, joined into the stable profile used in every prompt.
    pub personality: Vec<String>,
    /// How many recent messages go into reply and after-reply prompts.
    pub max_context_size: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            user_id: "10000".to_string(),
            nickname: "麦麦".to_string(),
            aliases: Vec::new(),
            personality: vec![
                "是一个大学生，喜欢上网冲浪".to_string(),
                "说话简短，偶尔有点毒舌".to_string(),
            ],
            max_context_size: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "deepseek-chat".to_string(),
            base_url: None,
            api_key: None,
            max_tokens: 600,
            temperature: 0.7,
        }
    }
}

/// Shaping constants for the willingness engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WillingConfig {
    /// Resting willingness every stream decays toward.
    pub baseline: f64,
    /// Multiplier applied to the raw interest score.
    pub interest_amplifier: f64,
    /// Interest must exceed this before it raises willingness.
    pub interest_threshold: f64,
    /// Subtracted from amplified interest when it passes the threshold.
    pub interest_offset: f64,
    /// Boost for a direct mention while willingness is below 1.
    pub mention_boost: f64,
    /// Boost for a direct mention once willingness is already >= 1.
    pub mention_saturated_boost: f64,
    /// Boost when the sender is the user we just replied to.
    pub continuation_boost: f64,
    pub continuation_window_secs: u64,
    /// Emoji-only messages scale willingness by this factor.
    pub emoji_factor: f64,
    /// Upper bound on the persisted willingness.
    pub max_willing: f64,
    /// Multiplier in the willingness → probability mapping.
    pub willing_amplifier: f64,
    /// Subtracted after a reply is queued.
    pub reply_penalty: f64,
    /// Fraction of the distance to baseline kept per decay tick.
    pub decay_factor: f64,
    pub decay_interval_secs: u64,
}

impl Default for WillingConfig {
    fn default() -> Self {
        Self {
            baseline: 0.0,
            interest_amplifier: 1.0,
            interest_threshold: 0.4,
            interest_offset: 0.3,
            mention_boost: 1.0,
            mention_saturated_boost: 0.05,
            continuation_boost: 0.2,
            continuation_window_secs: 60,
            emoji_factor: 0.2,
            max_willing: 3.0,
            willing_amplifier: 1.0,
            reply_penalty: 1.8,
            decay_factor: 0.9,
            decay_interval_secs: 10,
        }
    }
}

impl WillingConfig {
    pub fn decay_interval(&self) -> Duration {
        Duration::from_secs(self.decay_interval_secs.max(1))
    }
}

/// Cadence of the per-stream reflection loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReflectionConfig {
    pub tick_interval_secs: u64,
    /// Without a committed reply for longer than this, the loop goes dormant.
    pub idle_threshold_secs: u64,
    pub memory_max_results: usize,
    pub memory_max_depth: usize,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            idle_threshold_secs: 180,
            memory_max_results: 2,
            memory_max_depth: 3,
        }
    }
}

impl ReflectionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs.max(1))
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelationshipConfig {
    /// SQLite file for relationships; in-memory store when unset.
    pub db_path: Option<String>,
    pub autosave_interval_secs: u64,
    /// Mood intensity passed along with the detected emotion.
    pub mood_intensity_factor: f32,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            autosave_interval_secs: 300,
            mood_intensity_factor: 1.0,
        }
    }
}

impl RelationshipConfig {
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    /// Thinking placeholders older than this are evicted by the sweeper.
    pub thinking_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    /// Max characters per outbound segment.
    pub max_segment_chars: usize,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            thinking_timeout_secs: 120,
            sweep_interval_secs: 5,
            max_segment_chars: 60,
        }
    }
}

impl OutboundConfig {
    pub fn thinking_timeout(&self) -> Duration {
        Duration::from_secs(self.thinking_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

// ============================================================================
// Tests
// ============================================================================
