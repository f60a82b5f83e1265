//! OpenAI-compatible chat completions (OpenAI, DeepSeek, SiliconFlow, Ollama).

use crate::llm::{CompletionParams, Generation, LlmClient};
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use heartflow_core::config::LlmConfig;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::LazyLock;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*<think>(.*?)</think>\s*").unwrap());

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    retry: RetryConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.is_empty())
            .context("No API key configured (llm.api_key / LLM_API_KEY)")?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .context("Failed to build HTTP client")?,
            api_key,
            base_url,
            model: config.model.clone(),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

fn build_payload(model: &str, prompt: &str, params: CompletionParams) -> Value {
    json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
        "max_tokens": params.max_tokens,
        "temperature": params.temperature,
    })
}

/// Pull text and reasoning out of a chat completion body.
///
/// Reasoning comes from `reasoning_content` when the provider sends it,
/// otherwise from a leading `<think>` block inside the content.
fn parse_response(body: &Value) -> Result<Generation> {
    let message = body
        .pointer("/choices/0/message")
        .context("Response has no choices")?;
    let content = message["content"].as_str().unwrap_or_default();
    let reasoning = message["reasoning_content"].as_str().unwrap_or_default();

    if reasoning.is_empty() {
        if let Some(caps) = THINK_BLOCK.captures(content) {
            let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
            return Ok(Generation {
                text: content[whole..].trim().to_string(),
                reasoning: caps[1].trim().to_string(),
            });
        }
    }

    Ok(Generation {
        text: content.trim().to_string(),
        reasoning: reasoning.to_string(),
    })
}

#[async_trait::async_trait]
impl LlmClient for OpenAiCompatClient {
    #[tracing::instrument(skip(self, prompt, params), fields(model = %self.model))]
    async fn generate(&self, prompt: &str, params: CompletionParams) -> Result<Generation> {
        let payload = build_payload(&self.model, prompt, params);
        let url = format!("{}/chat/completions", self.base_url);

        let response = with_retry(&self.retry, "OpenAI-compatible", || async {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await
                .context("Failed to send completion request")
        })
        .await?;

        let body: Value = response
            .json()
            .await
            .context("Failed to decode completion response")?;
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let params = CompletionParams {
            max_tokens: 256,
            temperature: 0.3,
        };
        let payload = build_payload("deepseek-chat", "你好", params);
        assert_eq!(payload["model"], "deepseek-chat");
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["messages"][0]["content"], "你好");
        assert_eq!(payload["max_tokens"], 256);
    }

    #[test]
    fn test_parse_reasoning_content() {
        let body = json!({
            "choices": [{ "message": { "content": " 好的 ", "reasoning_content": "想一想" } }]
        });
        let generation = parse_response(&body).unwrap();
        assert_eq!(generation.text, "好的");
        assert_eq!(generation.reasoning, "想一想");
    }

    #[test]
    fn test_parse_inline_think_block() {
        let body = json!({
            "choices": [{ "message": { "content": "<think>\n先想想\n</think>\n\n答案是<7>" } }]
        });
        let generation = parse_response(&body).unwrap();
        assert_eq!(generation.text, "答案是<7>");
        assert_eq!(generation.reasoning, "先想想");
    }

    #[test]
    fn test_parse_missing_choices() {
        assert!(parse_response(&json!({ "error": "overloaded" })).is_err());
    }

    #[test]
    fn test_blank_api_key_is_rejected() {
        let config = LlmConfig {
            api_key: Some(String::new()),
            ..LlmConfig::default()
        };
        assert!(OpenAiCompatClient::new(&config).is_err());
    }
}
