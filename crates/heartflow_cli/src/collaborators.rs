//! Lightweight collaborators for running the engagement core in a terminal.

use async_trait::async_trait;
use heartflow_core::{
    ConversationObserver, EmotionLabel, InterestScorer, MemoryRetrieval, MoodSource,
    RecalledMemory, ScheduleSource, StreamId,
};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use tokio::sync::Mutex;

/// Lines kept per stream.
const LOG_CAPACITY: usize = 200;
/// Lines that make up the topic summary.
const SUMMARY_LINES: usize = 5;

/// Rolling per-stream chat transcript.
#[derive(Default)]
pub struct ChatLog {
    lines: Mutex<HashMap<StreamId, VecDeque<String>>>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, stream_id: &StreamId, line: String) {
        let mut lines = self.lines.lock().await;
        let log = lines.entry(stream_id.clone()).or_default();
        log.push_back(line);
        while log.len() > LOG_CAPACITY {
            log.pop_front();
        }
    }

    async fn tail(&self, stream_id: &StreamId, limit: usize) -> Vec<String> {
        let lines = self.lines.lock().await;
        match lines.get(stream_id) {
            Some(log) => log.iter().skip(log.len().saturating_sub(limit)).cloned().collect(),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl ConversationObserver for ChatLog {
    async fn talking_summary(&self, stream_id: &StreamId) -> String {
        self.tail(stream_id, SUMMARY_LINES).await.join("；")
    }

    async fn recent_excerpt(&self, stream_id: &StreamId, limit: usize) -> String {
        self.tail(stream_id, limit).await.join("\n")
    }
}

/// Mood that drifts to the last emotion the bot showed.
#[derive(Default)]
pub struct SimpleMood {
    current: RwLock<Option<(EmotionLabel, f32)>>,
}

impl SimpleMood {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MoodSource for SimpleMood {
    fn current_mood_summary(&self) -> String {
        let current = *self.current.read().unwrap_or_else(|e| e.into_inner());
        match current {
            None => "心情平静".to_string(),
            Some((emotion, intensity)) if intensity >= 1.5 => format!("非常{}", emotion),
            Some((emotion, _)) => format!("有点{}", emotion),
        }
    }

    fn update_from_emotion(&self, emotion: EmotionLabel, intensity: f32) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some((emotion, intensity));
    }
}

/// Interest is the number of configured topics mentioned in the text.
pub struct KeywordInterest {
    keywords: Vec<String>,
}

impl KeywordInterest {
    pub fn new(keywords: Vec<String>) -> Self {
        Self {
            keywords: keywords.into_iter().filter(|k| !k.is_empty()).collect(),
        }
    }
}

#[async_trait]
impl InterestScorer for KeywordInterest {
    async fn score_relevance(&self, text: &str) -> anyhow::Result<f32> {
        Ok(self.keywords.iter().filter(|k| text.contains(k.as_str())).count() as f32)
    }
}

/// No long-term memory attached.
pub struct NoMemory;

#[async_trait]
impl MemoryRetrieval for NoMemory {
    async fn retrieve_relevant(
        &self,
        _text: &str,
        _max_results: usize,
        _max_depth: usize,
    ) -> anyhow::Result<Vec<RecalledMemory>> {
        Ok(Vec::new())
    }
}

pub struct FixedSchedule(pub String);

impl ScheduleSource for FixedSchedule {
    fn current_task(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chat_log_tail() {
        let log = ChatLog::new();
        let s = StreamId::from("terminal:private:1");
        for i in 0..8 {
            log.record(&s, format!("line{}", i)).await;
        }
        assert_eq!(log.recent_excerpt(&s, 2).await, "line6\nline7");
        assert_eq!(log.talking_summary(&s).await, "line3；line4；line5；line6；line7");
        assert_eq!(log.recent_excerpt(&StreamId::from("other"), 5).await, "");
    }

    #[test]
    fn test_mood_follows_emotion() {
        let mood = SimpleMood::new();
        assert_eq!(mood.current_mood_summary(), "心情平静");
        mood.update_from_emotion(EmotionLabel::Joy, 1.0);
        assert_eq!(mood.current_mood_summary(), "有点开心");
        mood.update_from_emotion(EmotionLabel::Sadness, 2.0);
        assert_eq!(mood.current_mood_summary(), "非常悲伤");
    }

    #[tokio::test]
    async fn test_keyword_interest() {
        let scorer = KeywordInterest::new(vec!["游戏".into(), "".into(), "猫".into()]);
        assert_eq!(scorer.score_relevance("今天玩游戏吗").await.unwrap(), 1.0);
        assert_eq!(scorer.score_relevance("猫在玩游戏").await.unwrap(), 2.0);
        assert_eq!(scorer.score_relevance("天气不错").await.unwrap(), 0.0);
    }
}
