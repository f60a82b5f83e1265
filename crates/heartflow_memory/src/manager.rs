//! In-memory relationship cache in front of a [`RelationshipStore`].
//!
//! Each relationship sits behind its own mutex so concurrent updates to one
//! (user, platform) key serialise while different keys proceed in parallel.

use crate::relationship::{relationship_delta, HIGH_VALUE_THRESHOLD};
use anyhow::Result;
use heartflow_core::{
    EmotionLabel, Relationship, RelationshipKey, RelationshipLevel, RelationshipStore,
    RelationshipUpdate, Stance, UserInfo,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};

type Entry = Arc<Mutex<Relationship>>;

pub struct RelationshipManager {
    store: Arc<dyn RelationshipStore>,
    relationships: RwLock<HashMap<RelationshipKey, Entry>>,
}

impl RelationshipManager {
    pub fn new(store: Arc<dyn RelationshipStore>) -> Self {
        Self {
            store,
            relationships: RwLock::new(HashMap::new()),
        }
    }

    /// Warm the cache from the store. Returns how many records were loaded.
    pub async fn load_all(&self) -> Result<usize> {
        let rows = self.store.load_all().await?;
        let mut map = self.relationships.write().await;
        for mut rel in rows {
            rel.saved = true;
            map.insert(rel.key(), Arc::new(Mutex::new(rel)));
        }
        tracing::debug!("Loaded {} relationship records", map.len());
        Ok(map.len())
    }

    async fn cached(&self, key: &RelationshipKey) -> Option<Entry> {
        self.relationships.read().await.get(key).cloned()
    }

    /// Cached entry, else the stored one, else a new one from the live snapshot.
    async fn entry_or_create(&self, user: &UserInfo) -> Result<Entry> {
        let key = RelationshipKey::from_user(user)?;
        if let Some(entry) = self.cached(&key).await {
            return Ok(entry);
        }

        let (rel, is_new) = match self.store.load(&key).await {
            Ok(Some(mut stored)) => {
                stored.saved = true;
                (stored, false)
            }
            Ok(None) => (Relationship::from_user(user)?, true),
            Err(e) => {
                tracing::warn!("Relationship store lookup for {} failed: {:#}", key, e);
                (Relationship::from_user(user)?, true)
            }
        };

        let entry = {
            let mut map = self.relationships.write().await;
            // Another task may have created it meanwhile; first one wins.
            map.entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(rel)))
                .clone()
        };

        if is_new {
            let mut guard = entry.lock().await;
            if !guard.saved {
                tracing::info!("New relationship with {} ({})", guard.nickname, key);
                self.persist(&mut guard).await;
            }
        }
        Ok(entry)
    }

    /// Save one record, marking it saved on success. Failures are left for autosave.
    async fn persist(&self, rel: &mut Relationship) {
        match self.store.upsert(rel).await {
            Ok(()) => rel.saved = true,
            Err(e) => {
                rel.saved = false;
                tracing::warn!("Failed to persist relationship {}: {:#}", rel.key(), e);
            }
        }
    }

    /// The relationship with `user`, if one exists. Absent is not the same as zero.
    pub async fn get(&self, user: &UserInfo) -> Result<Option<Relationship>> {
        let key = RelationshipKey::from_user(user)?;
        match self.cached(&key).await {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    /// Make sure a relationship exists for a user seen in a live conversation.
    pub async fn ensure(&self, user: &UserInfo) -> Result<Relationship> {
        let entry = self.entry_or_create(user).await?;
        let rel = entry.lock().await.clone();
        Ok(rel)
    }

    /// Update the descriptive fields, creating the record if needed.
    pub async fn update_relationship(
        &self,
        user: &UserInfo,
        update: &RelationshipUpdate,
    ) -> Result<Relationship> {
        let entry = self.entry_or_create(user).await?;
        let mut rel = entry.lock().await;
        rel.apply(update);
        self.persist(&mut rel).await;
        Ok(rel.clone())
    }

    /// Add `delta` to the relationship value, creating the record if needed.
    pub async fn update_relationship_value(&self, user: &UserInfo, delta: f64) -> Result<Relationship> {
        let entry = self.entry_or_create(user).await?;
        let mut rel = entry.lock().await;
        rel.add_value(delta);
        self.persist(&mut rel).await;
        Ok(rel.clone())
    }

    /// Apply the emotion detected in a reply to the relationship with `user`.
    ///
    /// Returns the applied delta, or `None` when there is no relationship yet.
    pub async fn calculate_update_relationship_value(
        &self,
        user: &UserInfo,
        emotion: EmotionLabel,
        stance: Stance,
    ) -> Result<Option<f64>> {
        let key = RelationshipKey::from_user(user)?;
        let Some(entry) = self.cached(&key).await else {
            tracing::debug!("No relationship with {}, skipping value update", key);
            return Ok(None);
        };

        let mut rel = entry.lock().await;
        let old_value = rel.value;
        let peers = self.count_high_value_peers(&key).await;
        let delta = relationship_delta(old_value, emotion, stance, peers);

        rel.add_value(delta);
        tracing::info!(
            "Relationship {}: level={}, value={:.2}, stance/emotion={}-{}, change={:+.5}",
            key,
            RelationshipLevel::from_value(rel.value).as_zh(),
            old_value,
            stance,
            emotion,
            delta,
        );
        self.persist(&mut rel).await;
        Ok(Some(delta))
    }

    /// High-value relationships other than `subject`.
    ///
    /// Records locked by a concurrent update are skipped; the count is
    /// approximate by contract.
    async fn count_high_value_peers(&self, subject: &RelationshipKey) -> usize {
        let map = self.relationships.read().await;
        map.iter()
            .filter(|(key, _)| *key != subject)
            .filter_map(|(_, entry)| entry.try_lock().ok().map(|r| r.value))
            .filter(|value| *value >= HIGH_VALUE_THRESHOLD)
            .count()
    }

    /// Name to use for `user` in prompts.
    pub async fn get_name(&self, user: &UserInfo) -> String {
        if let Ok(key) = RelationshipKey::from_user(user) {
            if let Some(entry) = self.cached(&key).await {
                let nickname = entry.lock().await.nickname.clone();
                if !nickname.is_empty() {
                    return nickname;
                }
            }
        }
        if !user.nickname.is_empty() {
            return user.nickname.clone();
        }
        match &user.cardname {
            Some(card) if !card.is_empty() => card.clone(),
            _ => "某人".to_string(),
        }
    }

    /// Prompt fragment describing how the bot feels about `user`.
    pub async fn build_relationship_info(&self, user: &UserInfo) -> String {
        let value = match self.get(user).await {
            Ok(Some(rel)) => rel.value,
            _ => 0.0,
        };
        let level = RelationshipLevel::from_value(value);
        let who = match &user.cardname {
            Some(card) if !card.is_empty() => {
                format!("[({}){}]{}", user.user_id, user.nickname, card)
            }
            _ => format!("({}){}", user.user_id, user.nickname),
        };
        format!(
            "你对昵称为'{}'的用户的态度为{}，回复态度为{}，关系等级为{}。",
            who,
            level.as_zh(),
            level.reply_attitude(),
            level as u8,
        )
    }

    /// Flush every record with unsaved changes. Returns how many were written.
    pub async fn save_all(&self) -> usize {
        let entries: Vec<Entry> = self.relationships.read().await.values().cloned().collect();
        let mut written = 0;
        for entry in entries {
            let mut rel = entry.lock().await;
            if !rel.saved {
                self.persist(&mut rel).await;
                if rel.saved {
                    written += 1;
                }
            }
        }
        written
    }

    pub async fn len(&self) -> usize {
        self.relationships.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.relationships.read().await.is_empty()
    }

    /// Periodically flush unsaved records; flushes once more on shutdown.
    pub fn spawn_autosave(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tracing::debug!("Autosaving relationships");
                        manager.save_all().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            let n = manager.save_all().await;
                            tracing::debug!("Relationship autosave stopped, flushed {}", n);
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRelationshipStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn user(id: &str) -> UserInfo {
        UserInfo::new("qq", id, &format!("用户{}", id))
    }

    fn manager() -> RelationshipManager {
        RelationshipManager::new(Arc::new(InMemoryRelationshipStore::new()))
    }

    #[tokio::test]
    async fn test_absent_is_not_zero() {
        let m = manager();
        assert!(m.get(&user("1")).await.unwrap().is_none());
        m.ensure(&user("1")).await.unwrap();
        let rel = m.get(&user("1")).await.unwrap().unwrap();
        assert_eq!(rel.value, 0.0);
        assert!(rel.saved);
    }

    #[tokio::test]
    async fn test_missing_identity_is_rejected() {
        let m = manager();
        let err = m.ensure(&UserInfo::new("qq", "", "无名")).await.unwrap_err();
        assert!(err.to_string().contains("user_id"));
    }

    #[tokio::test]
    async fn test_emotion_update_requires_relationship() {
        let m = manager();
        let delta = m
            .calculate_update_relationship_value(&user("1"), EmotionLabel::Joy, Stance::Neutral)
            .await
            .unwrap();
        assert!(delta.is_none());
    }

    #[tokio::test]
    async fn test_emotion_update_is_additive() {
        let m = manager();
        m.update_relationship(
            &user("1"),
            &RelationshipUpdate {
                gender: Some("男".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let delta = m
            .calculate_update_relationship_value(&user("1"), EmotionLabel::Calm, Stance::Neutral)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delta, 0.3);

        let rel = m.get(&user("1")).await.unwrap().unwrap();
        assert_eq!(rel.value, 0.3);
        assert_eq!(rel.gender.as_deref(), Some("男"));
    }

    #[tokio::test]
    async fn test_peers_exclude_subject() {
        let store = InMemoryRelationshipStore::new();
        for (id, value) in [("1", 800.0), ("2", 750.0), ("3", 900.0), ("4", 710.0), ("5", 10.0)] {
            let mut rel = Relationship::from_user(&user(id)).unwrap();
            rel.value = value;
            store.upsert(&rel).await.unwrap();
        }
        let m = RelationshipManager::new(Arc::new(store));
        assert_eq!(m.load_all().await.unwrap(), 5);

        let delta = m
            .calculate_update_relationship_value(&user("1"), EmotionLabel::Joy, Stance::Supportive)
            .await
            .unwrap()
            .unwrap();
        assert!((delta - 0.278).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_concurrent_updates_to_one_key_serialise() {
        let m = Arc::new(manager());
        m.ensure(&user("1")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let m = Arc::clone(&m);
            handles.push(tokio::spawn(async move {
                m.update_relationship_value(&user("1"), 1.0).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(m.get(&user("1")).await.unwrap().unwrap().value, 50.0);
    }

    #[tokio::test]
    async fn test_relationship_info_and_name() {
        let m = manager();
        let mut u = user("7");
        u.cardname = Some("群名片".to_string());
        m.update_relationship_value(&u, 300.0).await.unwrap();

        let info = m.build_relationship_info(&u).await;
        assert!(info.contains("友好"));
        assert!(info.contains("愿意回复"));
        assert!(info.contains("群名片"));
        assert_eq!(m.get_name(&u).await, "用户7");

        let stranger = UserInfo::new("qq", "8", "");
        assert_eq!(m.get_name(&stranger).await, "某人");
    }

    /// Store that fails until told otherwise.
    struct FlakyStore {
        inner: InMemoryRelationshipStore,
        healthy: AtomicBool,
    }

    #[async_trait]
    impl RelationshipStore for FlakyStore {
        async fn load(&self, key: &RelationshipKey) -> Result<Option<Relationship>> {
            self.inner.load(key).await
        }
        async fn load_all(&self) -> Result<Vec<Relationship>> {
            self.inner.load_all().await
        }
        async fn upsert(&self, relationship: &Relationship) -> Result<()> {
            if !self.healthy.load(Ordering::SeqCst) {
                anyhow::bail!("database is locked");
            }
            self.inner.upsert(relationship).await
        }
    }

    #[tokio::test]
    async fn test_failed_saves_are_flushed_later() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryRelationshipStore::new(),
            healthy: AtomicBool::new(false),
        });
        let m = RelationshipManager::new(store.clone());

        let rel = m.update_relationship_value(&user("1"), 5.0).await.unwrap();
        assert!(!rel.saved);
        assert_eq!(m.save_all().await, 0);

        store.healthy.store(true, Ordering::SeqCst);
        assert_eq!(m.save_all().await, 1);
        assert!(m.get(&user("1")).await.unwrap().unwrap().saved);
        assert_eq!(m.save_all().await, 0);
    }
}
