//! Relationship manager against a real SQLite file.

use heartflow_core::{EmotionLabel, RelationshipUpdate, Stance, UserInfo};
use heartflow_memory::{RelationshipManager, SqliteRelationshipStore};
use std::sync::Arc;
use std::time::Duration;

async fn open(dir: &tempfile::TempDir) -> Arc<RelationshipManager> {
    let store = SqliteRelationshipStore::new(dir.path().join("relationships.db"))
        .await
        .unwrap();
    let manager = Arc::new(RelationshipManager::new(Arc::new(store)));
    manager.load_all().await.unwrap();
    manager
}

fn alice() -> UserInfo {
    UserInfo::new("qq", "1001", "Alice")
}

#[tokio::test]
async fn test_values_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let manager = open(&dir).await;
        manager
            .update_relationship(
                &alice(),
                &RelationshipUpdate {
                    age: Some(20),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        manager
            .calculate_update_relationship_value(&alice(), EmotionLabel::Joy, Stance::Supportive)
            .await
            .unwrap();
    }

    let manager = open(&dir).await;
    assert_eq!(manager.len().await, 1);
    let rel = manager.get(&alice()).await.unwrap().unwrap();
    assert!((rel.value - 1.5).abs() < 1e-9);
    assert_eq!(rel.age, Some(20));
    assert_eq!(rel.nickname, "Alice");
}

#[tokio::test]
async fn test_same_user_on_two_platforms_is_two_relationships() {
    let dir = tempfile::TempDir::new().unwrap();
    let manager = open(&dir).await;

    manager.update_relationship_value(&alice(), 10.0).await.unwrap();
    let elsewhere = UserInfo::new("discord", "1001", "Alice");
    manager.update_relationship_value(&elsewhere, -10.0).await.unwrap();

    assert_eq!(manager.get(&alice()).await.unwrap().unwrap().value, 10.0);
    assert_eq!(manager.get(&elsewhere).await.unwrap().unwrap().value, -10.0);
}

#[tokio::test]
async fn test_concurrent_emotion_updates_are_not_lost() {
    let dir = tempfile::TempDir::new().unwrap();
    let manager = open(&dir).await;
    manager.ensure(&alice()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let m = manager.clone();
        handles.push(tokio::spawn(async move {
            m.calculate_update_relationship_value(&alice(), EmotionLabel::Calm, Stance::Neutral)
                .await
                .unwrap()
                .unwrap()
        }));
    }
    let mut total = 0.0;
    for h in handles {
        total += h.await.unwrap();
    }

    let rel = manager.get(&alice()).await.unwrap().unwrap();
    assert!((rel.value - total).abs() < 1e-9);
    assert!(rel.value > 5.9 && rel.value <= 6.0);
}

#[tokio::test]
async fn test_autosave_stops_on_shutdown() {
    let dir = tempfile::TempDir::new().unwrap();
    let manager = open(&dir).await;
    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = manager.spawn_autosave(Duration::from_secs(300), rx);

    manager.update_relationship_value(&alice(), 3.0).await.unwrap();
    tx.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(manager.save_all().await, 0);
}
