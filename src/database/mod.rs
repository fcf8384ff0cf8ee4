use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use tracing::info;

use crate::models::{ChatId, OwnerKey};

/// SQLite storage for subscribers and cached result lists
pub struct Database {
    pool: SqlitePool,
}

/// A cached result list as persisted: the serialized deals and the page size they
/// were first delivered with
#[derive(Debug)]
pub struct CacheRecord {
    pub deals_json: String,
    pub page_size: usize,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Create database file if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            if let Some(dir) = db_url
                .strip_prefix("sqlite:")
                .and_then(|path| Path::new(path.trim_start_matches("//")).parent())
                .filter(|dir| !dir.as_os_str().is_empty())
            {
                tokio::fs::create_dir_all(dir).await?;
            }

            info!("Creating database file");
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePool::connect(db_url).await?;
        Self::migrate(pool).await
    }

    /// Private in-memory database; a single connection so every query sees the same data
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        // Run migrations
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database initialized successfully");
        Ok(Self { pool })
    }

    pub async fn set_subscription(
        &self,
        chat: ChatId,
        username: Option<&str>,
        subscribed: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO users (chat_id, username, is_subscribed, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (chat_id) DO UPDATE SET
                username = COALESCE(excluded.username, users.username),
                is_subscribed = excluded.is_subscribed,
                updated_at = excluded.updated_at
            ",
        )
        .bind(chat.0)
        .bind(username)
        .bind(subscribed)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_subscribed_users(&self) -> Result<Vec<ChatId>, sqlx::Error> {
        let rows = sqlx::query("SELECT chat_id FROM users WHERE is_subscribed = 1 ORDER BY chat_id")
            .fetch_all(&self.pool)
            .await?;

        let chats = rows
            .into_iter()
            .map(|row| ChatId(row.get::<i64, _>("chat_id")))
            .collect();

        Ok(chats)
    }

    /// Replace the cached list for `owner`
    pub async fn save_cache_record(
        &self,
        owner: &OwnerKey,
        record: &CacheRecord,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO page_cache (chat_id, namespace, deals, page_size, stored_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (chat_id, namespace) DO UPDATE SET
                deals = excluded.deals,
                page_size = excluded.page_size,
                stored_at = excluded.stored_at
            ",
        )
        .bind(owner.chat.0)
        .bind(owner.namespace.as_str())
        .bind(&record.deals_json)
        .bind(record.page_size as i64)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn load_cache_record(&self, owner: &OwnerKey) -> Result<Option<CacheRecord>, sqlx::Error> {
        let row = sqlx::query("SELECT deals, page_size FROM page_cache WHERE chat_id = ? AND namespace = ?")
            .bind(owner.chat.0)
            .bind(owner.namespace.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| CacheRecord {
            deals_json: row.get("deals"),
            page_size: row.get::<i64, _>("page_size").max(1) as usize,
        }))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}
