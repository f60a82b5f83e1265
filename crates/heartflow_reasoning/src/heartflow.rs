use crate::llm::CompletionParams;
use crate::submind::{MindServices, SubMind};
use heartflow_core::config::ReflectionConfig;
use heartflow_core::{Personality, StreamId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Registry of sub-minds, one per conversation stream.
pub struct Heartflow {
    personality: Personality,
    config: ReflectionConfig,
    params: CompletionParams,
    services: MindServices,
    minds: RwLock<HashMap<StreamId, Arc<SubMind>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Heartflow {
    pub fn new(
        personality: Personality,
        config: ReflectionConfig,
        params: CompletionParams,
        services: MindServices,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            personality,
            config,
            params,
            services,
            minds: RwLock::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
        }
    }

    /// Sub-mind for `stream_id`, starting its loop the first time it is seen.
    /// After `shutdown` no new loops are started.
    pub async fn create_submind(&self, stream_id: &StreamId) -> Arc<SubMind> {
        if let Some(mind) = self.get_submind(stream_id).await {
            return mind;
        }

        let mut minds = self.minds.write().await;
        if let Some(mind) = minds.get(stream_id) {
            return mind.clone();
        }

        let mind = Arc::new(SubMind::new(
            stream_id.clone(),
            self.personality.clone(),
            self.config.clone(),
            self.params,
            self.services.clone(),
        ));
        minds.insert(stream_id.clone(), mind.clone());
        drop(minds);

        if *self.shutdown_tx.borrow() {
            tracing::debug!("Heartflow is shut down, not starting a loop for {}", stream_id);
            return mind;
        }

        let handle = tokio::spawn(mind.clone().run(self.shutdown_tx.subscribe()));
        self.tasks.lock().await.push(handle);
        tracing::info!("Sub-mind started for {}", stream_id);
        mind
    }

    pub async fn get_submind(&self, stream_id: &StreamId) -> Option<Arc<SubMind>> {
        self.minds.read().await.get(stream_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.minds.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.minds.read().await.is_empty()
    }

    /// Stop every reflection loop and wait for them to finish.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Reflection loop ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ScriptedClient;
    use async_trait::async_trait;
    use heartflow_core::{
        ConversationObserver, MemoryRetrieval, MoodSource, RecalledMemory, ScheduleSource,
    };

    struct Nothing;

    impl MoodSource for Nothing {
        fn current_mood_summary(&self) -> String {
            "心情平静".to_string()
        }
    }

    impl ScheduleSource for Nothing {
        fn current_task(&self) -> String {
            "看书".to_string()
        }
    }

    #[async_trait]
    impl ConversationObserver for Nothing {
        async fn talking_summary(&self, _: &StreamId) -> String {
            String::new()
        }
        async fn recent_excerpt(&self, _: &StreamId, _: usize) -> String {
            String::new()
        }
    }

    #[async_trait]
    impl MemoryRetrieval for Nothing {
        async fn retrieve_relevant(&self, _: &str, _: usize, _: usize) -> anyhow::Result<Vec<RecalledMemory>> {
            Ok(Vec::new())
        }
    }

    fn heartflow() -> Heartflow {
        let nothing = Arc::new(Nothing);
        Heartflow::new(
            Personality::default(),
            ReflectionConfig::default(),
            CompletionParams::default(),
            MindServices {
                llm: Arc::new(ScriptedClient::new().otherwise("<5>")),
                memory: nothing.clone(),
                mood: nothing.clone(),
                observer: nothing.clone(),
                schedule: nothing,
            },
        )
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let hf = heartflow();
        let a = StreamId::from("qq:group:1");

        let first = hf.create_submind(&a).await;
        let second = hf.create_submind(&a).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(hf.len().await, 1);
        assert_eq!(hf.tasks.lock().await.len(), 1);

        hf.create_submind(&StreamId::from("qq:private:2")).await;
        assert_eq!(hf.len().await, 2);
        assert!(hf.get_submind(&StreamId::from("qq:group:404")).await.is_none());

        hf.shutdown().await;
        assert!(hf.tasks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_no_loops_after_shutdown() {
        let hf = heartflow();
        hf.shutdown().await;

        let stream = StreamId::from("qq:group:9");
        let mind = hf.create_submind(&stream).await;
        assert!(hf.tasks.lock().await.is_empty());
        assert!(Arc::ptr_eq(&mind, &hf.get_submind(&stream).await.unwrap()));
        assert_eq!(mind.reflection_rating().await, 5);
    }
}
