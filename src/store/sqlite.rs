//! SQLite-backed `IncidentStore`.
//!
//! Follows the functional-core/imperative-shell split used elsewhere in
//! this codebase: SQL text lives in a private `sql` module, pure
//! conversions in `mapping`, and the public impl only does I/O.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::time::Duration;

use super::error::StoreError;
use super::traits::IncidentStore;

mod sql {
    pub(super) fn create_kv_table() -> &'static str {
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expires_at INTEGER
        )"
    }

    pub(super) fn create_counter_table() -> &'static str {
        "CREATE TABLE IF NOT EXISTS counter_store (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL,
            expires_at INTEGER
        )"
    }

    pub(super) fn create_list_table() -> &'static str {
        "CREATE TABLE IF NOT EXISTS list_store (
            key TEXT NOT NULL,
            seq INTEGER NOT NULL,
            value TEXT NOT NULL,
            expires_at INTEGER,
            PRIMARY KEY (key, seq)
        )"
    }

    pub(super) fn create_list_seq_table() -> &'static str {
        "CREATE TABLE IF NOT EXISTS list_seq (
            key TEXT PRIMARY KEY,
            next_seq INTEGER NOT NULL
        )"
    }

    pub(super) fn create_zset_table() -> &'static str {
        "CREATE TABLE IF NOT EXISTS zset_store (
            key TEXT NOT NULL,
            score REAL NOT NULL,
            member TEXT NOT NULL,
            expires_at INTEGER,
            PRIMARY KEY (key, member)
        )"
    }

    pub(super) fn create_set_table() -> &'static str {
        "CREATE TABLE IF NOT EXISTS set_store (
            key TEXT NOT NULL,
            member TEXT NOT NULL,
            PRIMARY KEY (key, member)
        )"
    }
}

mod mapping {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    /// Converts a TTL into an absolute unix-seconds expiry, if given.
    pub(super) fn ttl_to_expires_at(ttl: Option<Duration>) -> Option<i64> {
        ttl.map(|d| now_unix_secs() + i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
    }

    pub(super) fn now_unix_secs() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Whether a row with the given optional expiry has expired as of now.
    pub(super) fn is_expired(expires_at: Option<i64>) -> bool {
        expires_at.is_some_and(|exp| exp <= now_unix_secs())
    }
}

/// SQLite connection pool wrapped as an `IncidentStore`.
#[derive(Clone)]
pub struct SqliteIncidentStore {
    pool: SqlitePool,
}

impl SqliteIncidentStore {
    /// Connects to `path` (created if missing) and ensures the schema
    /// exists. `:memory:` is accepted for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or schema migration fails.
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        let options = format!("sqlite://{path}?mode=rwc");
        let pool = SqlitePool::connect(&options).await?;
        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Builds a store over an in-memory database, for tests.
    ///
    /// Pinned to a single pooled connection: SQLite's `:memory:` database is
    /// private to the connection that opened it, so a pool handing out more
    /// than one connection would silently scatter state across independent
    /// databases.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await?;
        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        for stmt in [
            sql::create_kv_table(),
            sql::create_counter_table(),
            sql::create_list_table(),
            sql::create_list_seq_table(),
            sql::create_zset_table(),
            sql::create_set_table(),
        ] {
            sqlx::query(stmt).execute(pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for SqliteIncidentStore {
    async fn get_json(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT value, expires_at FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        let expires_at: Option<i64> = row.try_get("expires_at").ok();
        if mapping::is_expired(expires_at) {
            return Ok(None);
        }
        let raw: String = row.try_get("value").map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let value = serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(value))
    }

    async fn set_json(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let expires_at = mapping::ttl_to_expires_at(ttl);
        sqlx::query(
            "INSERT INTO kv_store (key, value, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(raw)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Option<Duration>) -> Result<i64, StoreError> {
        let expires_at = mapping::ttl_to_expires_at(ttl);
        let mut tx = self.pool.begin().await?;
        let existing: Option<i64> = sqlx::query_scalar("SELECT value FROM counter_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;
        let next = existing.unwrap_or(0) + 1;
        sqlx::query(
            "INSERT INTO counter_store (key, value, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(next)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(next)
    }

    async fn list_push_front(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let mut tx = self.pool.begin().await?;
        let next_seq: i64 = sqlx::query_scalar("SELECT next_seq FROM list_seq WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?
            .unwrap_or(0);
        sqlx::query(
            "INSERT INTO list_seq (key, next_seq) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET next_seq = excluded.next_seq",
        )
        .bind(key)
        .bind(next_seq + 1)
        .execute(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO list_store (key, seq, value, expires_at) VALUES (?, ?, ?, NULL)")
            .bind(key)
            .bind(next_seq)
            .bind(raw)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_trim(&self, key: &str, n: usize) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM list_store WHERE key = ? AND seq NOT IN (
                SELECT seq FROM list_store WHERE key = ? ORDER BY seq DESC LIMIT ?
            )",
        )
        .bind(key)
        .bind(key)
        .bind(i64::try_from(n).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = mapping::ttl_to_expires_at(Some(ttl));
        sqlx::query("UPDATE list_store SET expires_at = ? WHERE key = ?")
            .bind(expires_at)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_range(&self, key: &str) -> Result<Vec<Value>, StoreError> {
        let rows = sqlx::query("SELECT value, expires_at FROM list_store WHERE key = ? ORDER BY seq DESC")
            .bind(key)
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let expires_at: Option<i64> = row.try_get("expires_at").ok();
            if mapping::is_expired(expires_at) {
                continue;
            }
            let raw: String = row.try_get("value").map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            })?;
            out.push(serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            })?);
        }
        Ok(out)
    }

    async fn zadd(&self, key: &str, score: f64, member: &Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(member).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        sqlx::query(
            "INSERT INTO zset_store (key, score, member, expires_at) VALUES (?, ?, ?, NULL)
             ON CONFLICT(key, member) DO UPDATE SET score = excluded.score",
        )
        .bind(key)
        .bind(score)
        .bind(raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<Value>, StoreError> {
        let rows = sqlx::query(
            "SELECT member, expires_at FROM zset_store WHERE key = ? AND score >= ? AND score <= ? ORDER BY score ASC",
        )
        .bind(key)
        .bind(min)
        .bind(max)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let expires_at: Option<i64> = row.try_get("expires_at").ok();
            if mapping::is_expired(expires_at) {
                continue;
            }
            let raw: String = row.try_get("member").map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            })?;
            out.push(serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            })?);
        }
        Ok(out)
    }

    async fn zset_expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = mapping::ttl_to_expires_at(Some(ttl));
        sqlx::query("UPDATE zset_store SET expires_at = ? WHERE key = ?")
            .bind(expires_at)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO set_store (key, member) VALUES (?, ?)")
            .bind(key)
            .bind(member)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let member: Option<String> = sqlx::query_scalar("SELECT member FROM set_store WHERE key = ? LIMIT 1")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(ref m) = member {
            sqlx::query("DELETE FROM set_store WHERE key = ? AND member = ?")
                .bind(key)
                .bind(m)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let value = serde_json::json!({"a": 1});
        store.set_json("k", &value, None).await.unwrap();
        assert_eq!(store.get_json("k").await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn ttl_expiry_hides_the_value() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        store
            .set_json("k", &serde_json::json!(1), Some(Duration::from_secs(0)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(store.get_json("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_starts_at_one_and_accumulates() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        assert_eq!(store.incr("c", None).await.unwrap(), 1);
        assert_eq!(store.incr("c", None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn list_push_front_orders_most_recent_first() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        store.list_push_front("l", &serde_json::json!(1)).await.unwrap();
        store.list_push_front("l", &serde_json::json!(2)).await.unwrap();
        let values = store.list_range("l").await.unwrap();
        assert_eq!(values, vec![serde_json::json!(2), serde_json::json!(1)]);
    }

    #[tokio::test]
    async fn list_trim_keeps_only_most_recent_n() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        for i in 0..5 {
            store.list_push_front("l", &serde_json::json!(i)).await.unwrap();
        }
        store.list_trim("l", 2).await.unwrap();
        let values = store.list_range("l").await.unwrap();
        assert_eq!(values, vec![serde_json::json!(4), serde_json::json!(3)]);
    }

    #[tokio::test]
    async fn zrange_by_score_filters_and_orders() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        store.zadd("z", 10.0, &serde_json::json!("a")).await.unwrap();
        store.zadd("z", 20.0, &serde_json::json!("b")).await.unwrap();
        store.zadd("z", 30.0, &serde_json::json!("c")).await.unwrap();
        let values = store.zrange_by_score("z", 15.0, 25.0).await.unwrap();
        assert_eq!(values, vec![serde_json::json!("b")]);
    }

    #[tokio::test]
    async fn set_pop_drains_before_returning_none() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        store.set_add("s", "x").await.unwrap();
        assert_eq!(store.set_pop("s").await.unwrap(), Some("x".to_string()));
        assert_eq!(store.set_pop("s").await.unwrap(), None);
    }
}
