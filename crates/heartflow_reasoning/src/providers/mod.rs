pub mod mock;
pub mod openai;

pub use mock::ScriptedClient;
pub use openai::OpenAiCompatClient;

use crate::llm::LlmClient;
use anyhow::Result;
use heartflow_core::config::LlmConfig;
use std::sync::Arc;

/// Build the client named by `config.provider`.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider.as_str() {
        "mock" | "scripted" => Ok(Arc::new(ScriptedClient::offline())),
        "openai" | "deepseek" | "siliconflow" | "ollama" => {
            Ok(Arc::new(OpenAiCompatClient::new(config)?))
        }
        other => anyhow::bail!("Unknown LLM provider: {}", other),
    }
}
