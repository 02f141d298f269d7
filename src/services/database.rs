use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::models::{ChatMessage, User, UserCredentials, UserStats};

pub struct Database {
    pool: SqlitePool,
    max_chat_history: i64,
}

impl Database {
    /// Open (or create) the SQLite file at `path`
    pub async fn new(path: &Path, max_chat_history: i64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Database {
            pool,
            max_chat_history,
        };
        db.init_tables().await?;
        Ok(db)
    }

    /// Private in-memory database; a single connection keeps it alive
    #[cfg(test)]
    pub async fn in_memory(max_chat_history: i64) -> Result<Self> {
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Database {
            pool,
            max_chat_history,
        };
        db.init_tables().await?;
        Ok(db)
    }

    async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                last_login TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                message TEXT NOT NULL,
                is_user_message BOOLEAN NOT NULL,
                timestamp TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_id ON chat_history(user_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_timestamp ON chat_history(timestamp)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert a user. Returns `None` when the username or email is taken.
    pub async fn insert_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<i64>> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(Some(done.last_insert_rowid())),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                log::debug!("Username or email already registered: {}", username);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_credentials(&self, username: &str) -> Result<Option<UserCredentials>> {
        let credentials = sqlx::query(
            "SELECT id, username, password_hash FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| UserCredentials {
            id: row.get(0),
            username: row.get(1),
            password_hash: row.get(2),
        });

        Ok(credentials)
    }

    pub async fn touch_last_login(&self, user_id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query(
            "SELECT id, username, email, created_at, last_login FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| User {
            id: row.get(0),
            username: row.get(1),
            email: row.get(2),
            created_at: row.get(3),
            last_login: row.get(4),
        });

        Ok(user)
    }

    /// Store a message, then drop the user's oldest messages past the cap
    pub async fn save_message(
        &self,
        user_id: i64,
        message: &str,
        is_user_message: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_history (user_id, message, is_user_message, timestamp)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(message)
        .bind(is_user_message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let count: i64 = sqlx::query("SELECT COUNT(*) FROM chat_history WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?
            .get(0);

        if count > self.max_chat_history {
            let excess = count - self.max_chat_history;
            let deleted = sqlx::query(
                r#"
                DELETE FROM chat_history
                WHERE id IN (
                    SELECT id FROM chat_history
                    WHERE user_id = ?
                    ORDER BY timestamp ASC, id ASC
                    LIMIT ?
                )
                "#,
            )
            .bind(user_id)
            .bind(excess)
            .execute(&self.pool)
            .await?
            .rows_affected();

            log::debug!("🧹 Trimmed {} old messages for user {}", deleted, user_id);
        }

        Ok(())
    }

    /// Latest `limit` messages, oldest first
    pub async fn get_chat_history(&self, user_id: i64, limit: i64) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT message, is_user_message, timestamp
            FROM chat_history
            WHERE user_id = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<ChatMessage> = rows
            .into_iter()
            .map(|row| ChatMessage {
                message: row.get(0),
                is_user_message: row.get(1),
                timestamp: row.get(2),
            })
            .collect();
        messages.reverse();

        Ok(messages)
    }

    pub async fn clear_chat_history(&self, user_id: i64) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM chat_history WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    pub async fn get_user_stats(&self, user_id: i64) -> Result<UserStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN is_user_message = 1 THEN 1 ELSE 0 END), 0),
                MIN(timestamp),
                MAX(timestamp)
            FROM chat_history
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        // Aggregates carry no declared column type, so decode as text
        let first: Option<String> = row.get(2);
        let last: Option<String> = row.get(3);

        Ok(UserStats {
            total_messages: row.get(0),
            user_messages: row.get(1),
            first_message: first.as_deref().and_then(parse_timestamp),
            last_message: last.as_deref().and_then(parse_timestamp),
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            log::warn!("Unparseable timestamp '{}': {}", raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn db_with_user(max_history: i64) -> (Database, i64) {
        let db = Database::in_memory(max_history).await.unwrap();
        let user_id = db
            .insert_user("alice", "alice@example.com", "hash")
            .await
            .unwrap()
            .unwrap();
        (db, user_id)
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let (db, _) = db_with_user(100).await;

        let same_name = db.insert_user("alice", "other@example.com", "hash").await.unwrap();
        assert!(same_name.is_none());

        let same_email = db.insert_user("bob", "alice@example.com", "hash").await.unwrap();
        assert!(same_email.is_none());

        let fresh = db.insert_user("bob", "bob@example.com", "hash").await.unwrap();
        assert!(fresh.is_some());
    }

    #[tokio::test]
    async fn test_user_lookup_and_last_login() {
        let (db, user_id) = db_with_user(100).await;

        let creds = db.find_credentials("alice").await.unwrap().unwrap();
        assert_eq!(creds.id, user_id);
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password_hash, "hash");
        assert!(db.find_credentials("nobody").await.unwrap().is_none());

        let user = db.get_user_by_id(user_id).await.unwrap().unwrap();
        assert!(user.last_login.is_none());

        db.touch_last_login(user_id).await.unwrap();
        let user = db.get_user_by_id(user_id).await.unwrap().unwrap();
        assert!(user.last_login.is_some());
        assert_eq!(user.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_history_is_chronological_and_limited() {
        let (db, user_id) = db_with_user(100).await;

        for i in 0..5 {
            db.save_message(user_id, &format!("msg {}", i), i % 2 == 0)
                .await
                .unwrap();
        }

        let history = db.get_chat_history(user_id, 3).await.unwrap();
        let texts: Vec<&str> = history.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["msg 2", "msg 3", "msg 4"]);
        assert!(history[0].is_user_message);
        assert!(!history[1].is_user_message);
    }

    #[tokio::test]
    async fn test_history_is_trimmed_to_cap() {
        let (db, user_id) = db_with_user(4).await;

        for i in 0..7 {
            db.save_message(user_id, &format!("msg {}", i), true).await.unwrap();
        }

        let history = db.get_chat_history(user_id, 50).await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].message, "msg 3");
        assert_eq!(history[3].message, "msg 6");
    }

    #[tokio::test]
    async fn test_clear_history_only_affects_owner() {
        let (db, alice) = db_with_user(100).await;
        let bob = db
            .insert_user("bob", "bob@example.com", "hash")
            .await
            .unwrap()
            .unwrap();

        db.save_message(alice, "hi", true).await.unwrap();
        db.save_message(bob, "hello", true).await.unwrap();

        assert_eq!(db.clear_chat_history(alice).await.unwrap(), 1);
        assert!(db.get_chat_history(alice, 50).await.unwrap().is_empty());
        assert_eq!(db.get_chat_history(bob, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_user_stats() {
        let (db, user_id) = db_with_user(100).await;

        let empty = db.get_user_stats(user_id).await.unwrap();
        assert_eq!(empty.total_messages, 0);
        assert_eq!(empty.user_messages, 0);
        assert!(empty.first_message.is_none());

        db.save_message(user_id, "hello", true).await.unwrap();
        db.save_message(user_id, "hi there", false).await.unwrap();
        db.save_message(user_id, "bmi?", true).await.unwrap();

        let stats = db.get_user_stats(user_id).await.unwrap();
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.user_messages, 2);
        assert!(stats.first_message.unwrap() <= stats.last_message.unwrap());
    }
}
