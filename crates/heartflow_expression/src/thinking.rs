//! Thinking-placeholder lifecycle: `Pending -> {Fulfilled, Abandoned}`.
//!
//! A placeholder is enqueued when reply generation starts. Once the reply is
//! ready the placeholder is removed and the reply appended at the back of the
//! stream's queue, so replies go out in the order they finish. If something
//! else removed the placeholder meanwhile (for example the stale sweeper) the
//! reply is dropped with a warning.

use crate::container::now_secs;
use heartflow_core::{
    InboundMessage, MessageSet, OutboundDispatch, OutboundEntry, OutboundSegment, PlaceholderId,
    ThinkingPlaceholder,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Fulfillment {
    /// The placeholder was removed and this reply queued.
    Fulfilled(MessageSet),
    /// The placeholder was gone; the reply was discarded.
    Abandoned,
    /// Generation produced nothing; the placeholder was withdrawn.
    Discarded,
}

pub struct ThinkingLifecycle {
    dispatch: Arc<dyn OutboundDispatch>,
    seq: AtomicU64,
}

impl ThinkingLifecycle {
    pub fn new(dispatch: Arc<dyn OutboundDispatch>) -> Self {
        Self {
            dispatch,
            seq: AtomicU64::new(0),
        }
    }

    fn next_id(&self, started_at: f64) -> PlaceholderId {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        PlaceholderId::new(format!("mt{:.6}-{}", started_at, seq))
    }

    /// Enqueue a placeholder for a reply to `message`.
    pub async fn begin(&self, message: &InboundMessage) -> ThinkingPlaceholder {
        let started_at = now_secs();
        let placeholder = ThinkingPlaceholder {
            id: self.next_id(started_at),
            stream_id: message.stream_id(),
            reply_to: message.clone(),
            started_at,
        };
        self.dispatch
            .enqueue(
                &placeholder.stream_id,
                OutboundEntry::Thinking(placeholder.clone()),
            )
            .await;
        tracing::debug!("Thinking {} in {}", placeholder.id, placeholder.stream_id);
        placeholder
    }

    /// Remove the placeholder and queue the reply segments behind everything
    /// already waiting.
    pub async fn fulfill(
        &self,
        placeholder: &ThinkingPlaceholder,
        segments: Vec<String>,
    ) -> Fulfillment {
        if segments.is_empty() {
            self.discard(placeholder).await;
            return Fulfillment::Discarded;
        }

        if self
            .dispatch
            .find_and_remove(&placeholder.stream_id, &placeholder.id)
            .await
            .is_none()
        {
            tracing::warn!(
                "Thinking placeholder {} not found in {}, reply discarded",
                placeholder.id,
                placeholder.stream_id
            );
            return Fulfillment::Abandoned;
        }

        let set = MessageSet {
            stream_id: placeholder.stream_id.clone(),
            thinking_id: placeholder.id.clone(),
            thinking_started_at: placeholder.started_at,
            segments: segments
                .into_iter()
                .enumerate()
                .map(|(i, text)| OutboundSegment {
                    text,
                    is_head: i == 0,
                    reply_to_message_id: placeholder.reply_to.message_id.clone(),
                })
                .collect(),
        };
        self.dispatch
            .enqueue(&placeholder.stream_id, OutboundEntry::Sending(set.clone()))
            .await;
        Fulfillment::Fulfilled(set)
    }

    /// Withdraw a placeholder without replacing it. Returns whether it was still queued.
    pub async fn discard(&self, placeholder: &ThinkingPlaceholder) -> bool {
        let removed = self
            .dispatch
            .find_and_remove(&placeholder.stream_id, &placeholder.id)
            .await
            .is_some();
        tracing::debug!("Thinking {} withdrawn (found: {})", placeholder.id, removed);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageManager;
    use heartflow_core::{GroupInfo, UserInfo};
    use std::collections::HashSet;

    fn message() -> InboundMessage {
        let group = GroupInfo {
            group_id: "42".to_string(),
            group_name: Some("测试群".to_string()),
        };
        InboundMessage::text(UserInfo::new("qq", "7", "小七"), Some(group), "麦麦在吗")
    }

    fn setup() -> (Arc<MessageManager>, ThinkingLifecycle) {
        let manager = Arc::new(MessageManager::new());
        let lifecycle = ThinkingLifecycle::new(manager.clone());
        (manager, lifecycle)
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let (_, lifecycle) = setup();
        let msg = message();
        let mut ids = HashSet::new();
        for _ in 0..100 {
            let p = lifecycle.begin(&msg).await;
            assert!(p.id.as_str().starts_with("mt"));
            assert!(ids.insert(p.id));
        }
    }

    #[tokio::test]
    async fn test_fulfill_marks_head_and_replaces_placeholder() {
        let (manager, lifecycle) = setup();
        let msg = message();
        let p = lifecycle.begin(&msg).await;
        assert_eq!(manager.pending_thinking(&p.stream_id).await, 1);

        let outcome = lifecycle
            .fulfill(&p, vec!["在的".to_string(), "怎么了".to_string()])
            .await;
        let Fulfillment::Fulfilled(set) = outcome else {
            panic!("expected fulfilment, got {:?}", outcome);
        };
        assert!(set.segments[0].is_head);
        assert!(!set.segments[1].is_head);
        assert_eq!(set.segments[1].reply_to_message_id, msg.message_id);
        assert_eq!(set.thinking_id, p.id);

        assert_eq!(manager.pending_thinking(&p.stream_id).await, 0);
        assert_eq!(manager.drain_ready(&p.stream_id).await, vec![set]);
    }

    #[tokio::test]
    async fn test_replies_queue_in_completion_order() {
        let (manager, lifecycle) = setup();
        let msg = message();
        let slow = lifecycle.begin(&msg).await;
        let fast = lifecycle.begin(&msg).await;

        let Fulfillment::Fulfilled(fast_set) = lifecycle.fulfill(&fast, vec!["快".to_string()]).await else {
            panic!("fast reply not fulfilled");
        };
        // The slow placeholder is still queued.
        assert_eq!(manager.pending_thinking(&slow.stream_id).await, 1);
        let Fulfillment::Fulfilled(slow_set) = lifecycle.fulfill(&slow, vec!["慢".to_string()]).await else {
            panic!("slow reply not fulfilled");
        };

        assert_eq!(manager.drain_ready(&slow.stream_id).await, vec![fast_set, slow_set]);
    }

    #[tokio::test]
    async fn test_double_fulfilment_abandons_second() {
        let (manager, lifecycle) = setup();
        let p = lifecycle.begin(&message()).await;

        let first = lifecycle.fulfill(&p, vec!["一".to_string()]).await;
        let second = lifecycle.fulfill(&p, vec!["二".to_string()]).await;
        assert!(matches!(first, Fulfillment::Fulfilled(_)));
        assert_eq!(second, Fulfillment::Abandoned);
        assert_eq!(manager.drain_ready(&p.stream_id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_removed_placeholder_is_abandoned() {
        let (manager, lifecycle) = setup();
        let p = lifecycle.begin(&message()).await;
        manager.find_and_remove(&p.stream_id, &p.id).await;

        let outcome = lifecycle.fulfill(&p, vec!["迟到的回复".to_string()]).await;
        assert_eq!(outcome, Fulfillment::Abandoned);
        assert!(manager.drain_ready(&p.stream_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_generation_withdraws_placeholder() {
        let (manager, lifecycle) = setup();
        let p = lifecycle.begin(&message()).await;
        assert_eq!(lifecycle.fulfill(&p, Vec::new()).await, Fulfillment::Discarded);
        assert_eq!(manager.pending_thinking(&p.stream_id).await, 0);
    }
}
