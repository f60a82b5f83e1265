use anyhow::{Context, Result};
use async_trait::async_trait;
use heartflow_core::{Relationship, RelationshipKey, RelationshipStore};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

/// Volatile store, used by tests and when no database is configured.
#[derive(Default)]
pub struct InMemoryRelationshipStore {
    rows: RwLock<HashMap<RelationshipKey, Relationship>>,
}

impl InMemoryRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Relationship>) -> Self {
        Self {
            rows: RwLock::new(rows.into_iter().map(|r| (r.key(), r)).collect()),
        }
    }
}

#[async_trait]
impl RelationshipStore for InMemoryRelationshipStore {
    async fn load(&self, key: &RelationshipKey) -> Result<Option<Relationship>> {
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn load_all(&self) -> Result<Vec<Relationship>> {
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn upsert(&self, relationship: &Relationship) -> Result<()> {
        let mut stored = relationship.clone();
        stored.saved = true;
        self.rows.write().await.insert(stored.key(), stored);
        Ok(())
    }
}

#[derive(Clone)]
pub struct SqliteRelationshipStore {
    pool: Pool<Sqlite>,
}

impl SqliteRelationshipStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relationships (
                user_id TEXT NOT NULL,
                platform TEXT NOT NULL,
                nickname TEXT NOT NULL DEFAULT '',
                relationship_value REAL NOT NULL DEFAULT 0,
                gender TEXT,
                age INTEGER,
                updated_at INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, platform)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create relationships table")?;
        Ok(())
    }

    fn row_to_relationship(row: &sqlx::sqlite::SqliteRow) -> Relationship {
        let age: Option<i64> = row.get("age");
        Relationship {
            user_id: row.get("user_id"),
            platform: row.get("platform"),
            nickname: row.get("nickname"),
            value: row.get("relationship_value"),
            gender: row.get("gender"),
            age: age.and_then(|a| u32::try_from(a).ok()),
            saved: true,
        }
    }
}

#[async_trait]
impl RelationshipStore for SqliteRelationshipStore {
    async fn load(&self, key: &RelationshipKey) -> Result<Option<Relationship>> {
        let row = sqlx::query(
            "SELECT user_id, platform, nickname, relationship_value, gender, age
             FROM relationships WHERE user_id = ? AND platform = ?",
        )
        .bind(&key.user_id)
        .bind(&key.platform)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to load relationship {}", key))?;

        Ok(row.as_ref().map(Self::row_to_relationship))
    }

    async fn load_all(&self) -> Result<Vec<Relationship>> {
        let rows = sqlx::query(
            "SELECT user_id, platform, nickname, relationship_value, gender, age FROM relationships",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load relationships")?;

        Ok(rows.iter().map(Self::row_to_relationship).collect())
    }

    async fn upsert(&self, relationship: &Relationship) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO relationships
                (user_id, platform, nickname, relationship_value, gender, age, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, platform) DO UPDATE SET
                nickname = excluded.nickname,
                relationship_value = excluded.relationship_value,
                gender = excluded.gender,
                age = excluded.age,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&relationship.user_id)
        .bind(&relationship.platform)
        .bind(&relationship.nickname)
        .bind(relationship.value)
        .bind(&relationship.gender)
        .bind(relationship.age.map(i64::from))
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save relationship {}", relationship.key()))?;
        Ok(())
    }
}
