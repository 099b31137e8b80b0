//! SQLite-backed local state: config entries, read-through caches for remote
//! entities, and the append-only action log.

use std::path::Path;

use sqlx::{
    Row,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
};

use crate::domain::{Comment, Conversation, Post};

use super::error::InfraError;

/// Row mirror of `posts_cache`. Only read back for diagnostics and tests;
/// page renders always use the fresh remote response.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CachedPost {
    pub id: String,
    pub submolt: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub score: i64,
    pub created_at: Option<String>,
    pub fetched_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CachedComment {
    pub id: String,
    pub post_id: Option<String>,
    pub parent_id: Option<String>,
    pub author: Option<String>,
    pub content: Option<String>,
    pub score: i64,
    pub created_at: Option<String>,
    pub fetched_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActionLogEntry {
    pub id: i64,
    pub action: String,
    pub target_id: Option<String>,
    pub detail: Option<String>,
    pub created_at: String,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open (creating if necessary) the database file and apply migrations.
    pub async fn open(path: &Path) -> Result<Self, InfraError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|err| InfraError::database(err.to_string()))?;

        Self::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    /// In-memory database for tests.
    pub async fn open_in_memory() -> Result<Self, InfraError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().in_memory(true))
            .await
            .map_err(|err| InfraError::database(err.to_string()))?;

        Self::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn run_migrations(pool: &SqlitePool) -> Result<(), InfraError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|err| InfraError::database(err.to_string()))
    }

    pub async fn health_check(&self) -> Result<(), InfraError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|err| InfraError::database(err.to_string()))
    }

    // ── Config ──

    pub async fn config_get(&self, key: &str) -> Result<Option<String>, InfraError> {
        let row = sqlx::query("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| InfraError::database(err.to_string()))?;
        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    pub async fn config_set(&self, key: &str, value: &str) -> Result<(), InfraError> {
        sqlx::query("INSERT OR REPLACE INTO config (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(|err| InfraError::database(err.to_string()))?;
        Ok(())
    }

    pub async fn config_delete(&self, key: &str) -> Result<(), InfraError> {
        sqlx::query("DELETE FROM config WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|err| InfraError::database(err.to_string()))?;
        Ok(())
    }

    // ── Caches ──
    //
    // Upserts replace the whole row, last write wins. `fetched_at` is
    // refreshed on every write.

    pub async fn cache_post(&self, post: &Post) -> Result<(), InfraError> {
        sqlx::query(
            "INSERT OR REPLACE INTO posts_cache \
             (id, submolt, title, content, url, author, score, created_at, fetched_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
        )
        .bind(&post.id)
        .bind(&post.submolt)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.url)
        .bind(&post.author)
        .bind(post.score())
        .bind(&post.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
        Ok(())
    }

    pub async fn cached_post(&self, id: &str) -> Result<Option<CachedPost>, InfraError> {
        sqlx::query_as::<_, CachedPost>("SELECT * FROM posts_cache WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| InfraError::database(err.to_string()))
    }

    pub async fn cache_comment(&self, comment: &Comment) -> Result<(), InfraError> {
        sqlx::query(
            "INSERT OR REPLACE INTO comments_cache \
             (id, post_id, parent_id, author, content, score, created_at, fetched_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))",
        )
        .bind(&comment.id)
        .bind(&comment.post_id)
        .bind(&comment.parent_id)
        .bind(&comment.author)
        .bind(&comment.content)
        .bind(comment.score)
        .bind(&comment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
        Ok(())
    }

    pub async fn cached_comment(&self, id: &str) -> Result<Option<CachedComment>, InfraError> {
        sqlx::query_as::<_, CachedComment>("SELECT * FROM comments_cache WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| InfraError::database(err.to_string()))
    }

    pub async fn cache_conversation(&self, conv: &Conversation) -> Result<(), InfraError> {
        sqlx::query(
            "INSERT OR REPLACE INTO conversations_cache \
             (id, with_agent, last_message_at, unread_count, fetched_at) \
             VALUES (?, ?, ?, ?, datetime('now'))",
        )
        .bind(&conv.id)
        .bind(&conv.with_agent)
        .bind(&conv.last_message_at)
        .bind(conv.unread_count)
        .execute(&self.pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
        Ok(())
    }

    // ── Action log ──

    pub async fn log_action(
        &self,
        action: &str,
        target_id: Option<&str>,
        detail: Option<&str>,
    ) -> Result<(), InfraError> {
        sqlx::query("INSERT INTO action_log (action, target_id, detail) VALUES (?, ?, ?)")
            .bind(action)
            .bind(target_id)
            .bind(detail)
            .execute(&self.pool)
            .await
            .map_err(|err| InfraError::database(err.to_string()))?;
        Ok(())
    }

    pub async fn recent_actions(&self, limit: i64) -> Result<Vec<ActionLogEntry>, InfraError> {
        sqlx::query_as::<_, ActionLogEntry>(
            "SELECT * FROM action_log ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn config_round_trip() {
        let store = Store::open_in_memory().await.expect("open store");

        store.config_set("api_key", "secret").await.unwrap();
        assert_eq!(
            store.config_get("api_key").await.unwrap().as_deref(),
            Some("secret")
        );

        store.config_set("api_key", "rotated").await.unwrap();
        assert_eq!(
            store.config_get("api_key").await.unwrap().as_deref(),
            Some("rotated")
        );

        store.config_delete("api_key").await.unwrap();
        assert_eq!(store.config_get("api_key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn post_upsert_is_last_write_wins() {
        let store = Store::open_in_memory().await.expect("open store");

        let mut post = Post {
            id: "p1".into(),
            title: "first title".into(),
            author: "alice".into(),
            upvotes: 1,
            ..Default::default()
        };
        store.cache_post(&post).await.unwrap();

        post.title = "second title".into();
        post.upvotes = 7;
        store.cache_post(&post).await.unwrap();

        let rows: i64 = sqlx::query("SELECT COUNT(*) AS n FROM posts_cache")
            .fetch_one(store.pool())
            .await
            .map(|row| row.get("n"))
            .unwrap();
        assert_eq!(rows, 1);

        let cached = store.cached_post("p1").await.unwrap().expect("row present");
        assert_eq!(cached.title.as_deref(), Some("second title"));
        assert_eq!(cached.score, 7);
    }

    #[tokio::test]
    async fn comment_cache_resolves_post_id() {
        let store = Store::open_in_memory().await.expect("open store");

        let comment = Comment {
            id: "c9".into(),
            post_id: Some("p4".into()),
            author: "bob".into(),
            content: "hi".into(),
            ..Default::default()
        };
        store.cache_comment(&comment).await.unwrap();

        let cached = store.cached_comment("c9").await.unwrap().expect("row");
        assert_eq!(cached.post_id.as_deref(), Some("p4"));
    }

    #[tokio::test]
    async fn action_log_appends_in_order() {
        let store = Store::open_in_memory().await.expect("open store");

        store.log_action("upvote", Some("p1"), None).await.unwrap();
        store
            .log_action("comment", Some("p1"), Some("first!"))
            .await
            .unwrap();

        let actions = store.recent_actions(10).await.unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].action, "comment");
        assert_eq!(actions[1].action, "upvote");
    }
}
