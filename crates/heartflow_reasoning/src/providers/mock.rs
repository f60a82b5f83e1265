//! Scripted LLM provider: deterministic responses for tests and offline runs.

use crate::llm::{CompletionParams, Generation, LlmClient};
use anyhow::Result;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// Answers prompts from, in order: the first matching rule, the queue,
/// the fallback. Without any of those the call fails.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    rules: Vec<(String, Reply)>,
    queue: Mutex<VecDeque<Reply>>,
    fallback: Option<String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canned persona for running without an API key.
    pub fn offline() -> Self {
        Self::new()
            .when("回复意愿", "<6>")
            .when("立场", "中立-平静")
            .when("内心独白", "群里好像挺热闹的，随便看看大家在聊什么")
            .otherwise("嗯嗯，我在听")
            .with_delay(Duration::from_millis(200))
    }

    /// Answer prompts containing `needle` with `text`.
    pub fn when(mut self, needle: &str, text: &str) -> Self {
        self.rules
            .push((needle.to_string(), Reply::Text(text.to_string())));
        self
    }

    /// Fail prompts containing `needle`.
    pub fn fail_when(mut self, needle: &str, error: &str) -> Self {
        self.rules
            .push((needle.to_string(), Reply::Fail(error.to_string())));
        self
    }

    /// Queue a one-shot answer.
    pub fn then(mut self, text: &str) -> Self {
        self.queue.get_mut().push_back(Reply::Text(text.to_string()));
        self
    }

    /// Queue a one-shot failure.
    pub fn then_fail(mut self, error: &str) -> Self {
        self.queue.get_mut().push_back(Reply::Fail(error.to_string()));
        self
    }

    pub fn otherwise(mut self, text: &str) -> Self {
        self.fallback = Some(text.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received so far, oldest first.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    async fn pick(&self, prompt: &str) -> Option<Reply> {
        if let Some((_, reply)) = self.rules.iter().find(|(needle, _)| prompt.contains(needle)) {
            return Some(reply.clone());
        }
        if let Some(reply) = self.queue.lock().await.pop_front() {
            return Some(reply);
        }
        self.fallback.clone().map(Reply::Text)
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    async fn generate(&self, prompt: &str, _params: CompletionParams) -> Result<Generation> {
        self.prompts.lock().await.push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.pick(prompt).await {
            Some(Reply::Text(text)) => Ok(Generation::text(text)),
            Some(Reply::Fail(error)) => anyhow::bail!("scripted failure: {}", error),
            None => anyhow::bail!("script exhausted"),
        }
    }
}
