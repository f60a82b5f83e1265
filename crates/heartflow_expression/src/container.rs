//! Per-stream ordered outbound containers.

use async_trait::async_trait;
use heartflow_core::{
    MessageSet, OutboundDispatch, OutboundEntry, PlaceholderId, StreamId, ThinkingPlaceholder,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

#[derive(Default)]
pub struct MessageManager {
    containers: Mutex<HashMap<StreamId, VecDeque<OutboundEntry>>>,
}

impl MessageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued message set of a stream, in order.
    /// Thinking placeholders stay where they are.
    pub async fn drain_ready(&self, stream_id: &StreamId) -> Vec<MessageSet> {
        let mut containers = self.containers.lock().await;
        let Some(queue) = containers.get_mut(stream_id) else {
            return Vec::new();
        };

        let mut ready = Vec::new();
        queue.retain(|entry| match entry {
            OutboundEntry::Sending(set) => {
                ready.push(set.clone());
                false
            }
            OutboundEntry::Thinking(_) => true,
        });
        if queue.is_empty() {
            containers.remove(stream_id);
        }
        ready
    }

    pub async fn pending_thinking(&self, stream_id: &StreamId) -> usize {
        self.containers
            .lock()
            .await
            .get(stream_id)
            .map(|q| {
                q.iter()
                    .filter(|e| matches!(e, OutboundEntry::Thinking(_)))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Streams that currently have anything queued.
    pub async fn streams(&self) -> Vec<StreamId> {
        self.containers.lock().await.keys().cloned().collect()
    }

    /// Drop placeholders older than `timeout`. A reply finishing after this
    /// point finds nothing to replace and is abandoned.
    pub async fn evict_stale_thinking(&self, timeout: Duration) -> usize {
        let cutoff = now_secs() - timeout.as_secs_f64();
        let mut evicted = 0;
        let mut containers = self.containers.lock().await;
        for (stream_id, queue) in containers.iter_mut() {
            queue.retain(|entry| match entry {
                OutboundEntry::Thinking(p) if p.started_at < cutoff => {
                    tracing::warn!("Thinking placeholder {} in {} timed out", p.id, stream_id);
                    evicted += 1;
                    false
                }
                _ => true,
            });
        }
        containers.retain(|_, q| !q.is_empty());
        evicted
    }

    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        timeout: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let n = manager.evict_stale_thinking(timeout).await;
                        if n > 0 {
                            tracing::debug!("Swept {} stale thinking placeholders", n);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!("Outbound sweeper stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl OutboundDispatch for MessageManager {
    async fn enqueue(&self, stream_id: &StreamId, entry: OutboundEntry) {
        self.containers
            .lock()
            .await
            .entry(stream_id.clone())
            .or_default()
            .push_back(entry);
    }

    async fn find_and_remove(
        &self,
        stream_id: &StreamId,
        placeholder_id: &PlaceholderId,
    ) -> Option<ThinkingPlaceholder> {
        let mut containers = self.containers.lock().await;
        let queue = containers.get_mut(stream_id)?;
        let pos = queue
            .iter()
            .position(|e| e.placeholder_id() == Some(placeholder_id))?;
        match queue.remove(pos) {
            Some(OutboundEntry::Thinking(p)) => Some(p),
            _ => None,
        }
    }
}

pub(crate) fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
