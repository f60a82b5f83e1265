use anyhow::Result;
use async_trait::async_trait;
use heartflow_core::config::LlmConfig;

/// Sampling parameters for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 600,
            temperature: 0.7,
        }
    }
}

impl CompletionParams {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    pub fn with_temperature(self, temperature: f32) -> Self {
        Self {
            temperature,
            ..self
        }
    }
}

/// Output of the inference collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub text: String,
    /// Chain-of-thought returned alongside the answer by reasoning models.
    pub reasoning: String,
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reasoning: String::new(),
        }
    }

    /// Whitespace-only output counts as nothing.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single-turn completion. May fail or return empty text.
    async fn generate(&self, prompt: &str, params: CompletionParams) -> Result<Generation>;
}
