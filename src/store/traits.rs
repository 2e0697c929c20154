//! The `IncidentStore` trait: the operation set the core consumes from the
//! durable backing store (spec §4.1).

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::error::StoreError;

/// Durable keyed state for in-flight incidents, correlation windows, the
/// BSID pool, and dampen timers.
///
/// Each operation is individually atomic (spec §4.1); multi-step logical
/// transactions (allocate-then-assign) are composed by callers as an
/// optimistic pop followed by a push-back on downstream failure. No
/// cross-key transactions are assumed.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Fetches the JSON blob at `key`, or `None` if absent or expired.
    async fn get_json(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Sets the JSON blob at `key`, optionally expiring after `ttl`.
    async fn set_json(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Deletes the value at `key`, if any.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically increments the counter at `key` (creating it at 0 first
    /// if absent) and returns the new value. Refreshes `ttl` if given.
    async fn incr(&self, key: &str, ttl: Option<Duration>) -> Result<i64, StoreError>;

    /// Pushes `value` to the front of the list at `key`.
    async fn list_push_front(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Trims the list at `key` to its first `n` entries.
    async fn list_trim(&self, key: &str, n: usize) -> Result<(), StoreError>;

    /// Sets (or refreshes) the list's expiry.
    async fn list_expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Returns the full list at `key`, most-recently-pushed first.
    async fn list_range(&self, key: &str) -> Result<Vec<Value>, StoreError>;

    /// Adds `member` to the time-ordered set at `key` with the given score
    /// (typically a unix timestamp).
    async fn zadd(&self, key: &str, score: f64, member: &Value) -> Result<(), StoreError>;

    /// Returns members of the time-ordered set at `key` scored within
    /// `[min, max]`, ascending by score.
    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<Value>, StoreError>;

    /// Sets the expiry of the time-ordered set at `key`.
    async fn zset_expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Adds `member` to the unordered set at `key`.
    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// Pops and returns an arbitrary member from the unordered set at
    /// `key`, or `None` if empty. Used for BSID free-set reuse.
    async fn set_pop(&self, key: &str) -> Result<Option<String>, StoreError>;
}
