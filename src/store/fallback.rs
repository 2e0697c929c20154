//! Degraded-mode wrapper combining a durable `IncidentStore` with an
//! in-process fallback cache for non-authoritative keys (spec §4.1
//! "Failure semantics").

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use super::degraded::DegradedModeCache;
use super::error::StoreError;
use super::keys::is_authoritative;
use super::traits::IncidentStore;

/// Wraps an inner `IncidentStore` so non-authoritative operations (flap
/// history, dedup hashes, the BSID pool) survive a transient outage of the
/// backing store by falling back to an in-process cache. Authoritative
/// keys (`orchestrator:incident:*`, `tunnel:*`) always propagate the
/// inner store's error: guessing at incident or tunnel state is worse
/// than failing the operation.
pub struct DegradedModeStore<S> {
    inner: S,
    cache: DegradedModeCache,
}

impl<S: IncidentStore> DegradedModeStore<S> {
    /// Wraps `inner` with a fresh, empty fallback cache.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: DegradedModeCache::new(),
        }
    }

    fn falls_back(key: &str, err: &StoreError) -> bool {
        matches!(err, StoreError::Unavailable { .. }) && !is_authoritative(key)
    }
}

#[async_trait]
impl<S: IncidentStore> IncidentStore for DegradedModeStore<S> {
    async fn get_json(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self.inner.get_json(key).await {
            Err(err) if Self::falls_back(key, &err) => {
                warn!(key, %err, "store unavailable, serving from degraded-mode cache");
                Ok(self.cache.get_json(key))
            }
            other => other,
        }
    }

    async fn set_json(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        match self.inner.set_json(key, value, ttl).await {
            Err(err) if Self::falls_back(key, &err) => {
                warn!(key, %err, "store unavailable, writing to degraded-mode cache");
                self.cache.set_json(key, value.clone(), ttl);
                Ok(())
            }
            other => other,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.inner.delete(key).await {
            Err(err) if Self::falls_back(key, &err) => {
                warn!(key, %err, "store unavailable, deleting from degraded-mode cache");
                self.cache.delete(key);
                Ok(())
            }
            other => other,
        }
    }

    async fn incr(&self, key: &str, ttl: Option<Duration>) -> Result<i64, StoreError> {
        match self.inner.incr(key, ttl).await {
            Err(err) if Self::falls_back(key, &err) => {
                warn!(key, %err, "store unavailable, incrementing degraded-mode cache");
                Ok(self.cache.incr(key))
            }
            other => other,
        }
    }

    async fn list_push_front(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        match self.inner.list_push_front(key, value).await {
            Err(err) if Self::falls_back(key, &err) => {
                warn!(key, %err, "store unavailable, pushing to degraded-mode cache");
                self.cache.list_push_front(key, value.clone());
                Ok(())
            }
            other => other,
        }
    }

    async fn list_trim(&self, key: &str, n: usize) -> Result<(), StoreError> {
        match self.inner.list_trim(key, n).await {
            Err(err) if Self::falls_back(key, &err) => {
                self.cache.list_trim(key, n);
                Ok(())
            }
            other => other,
        }
    }

    async fn list_expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        match self.inner.list_expire(key, ttl).await {
            // the cache models no per-collection TTL; entries only live as
            // long as the process does, which bounds staleness well enough
            // for a fallback path.
            Err(err) if Self::falls_back(key, &err) => Ok(()),
            other => other,
        }
    }

    async fn list_range(&self, key: &str) -> Result<Vec<Value>, StoreError> {
        match self.inner.list_range(key).await {
            Err(err) if Self::falls_back(key, &err) => {
                warn!(key, %err, "store unavailable, reading degraded-mode cache");
                Ok(self.cache.list_range(key))
            }
            other => other,
        }
    }

    async fn zadd(&self, key: &str, score: f64, member: &Value) -> Result<(), StoreError> {
        match self.inner.zadd(key, score, member).await {
            Err(err) if Self::falls_back(key, &err) => {
                warn!(key, %err, "store unavailable, writing to degraded-mode cache");
                self.cache.zadd(key, score, member.clone());
                Ok(())
            }
            other => other,
        }
    }

    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Result<Vec<Value>, StoreError> {
        match self.inner.zrange_by_score(key, min, max).await {
            Err(err) if Self::falls_back(key, &err) => {
                warn!(key, %err, "store unavailable, reading degraded-mode cache");
                Ok(self.cache.zrange_by_score(key, min, max))
            }
            other => other,
        }
    }

    async fn zset_expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        match self.inner.zset_expire(key, ttl).await {
            Err(err) if Self::falls_back(key, &err) => Ok(()),
            other => other,
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        match self.inner.set_add(key, member).await {
            Err(err) if Self::falls_back(key, &err) => {
                warn!(key, %err, "store unavailable, writing to degraded-mode cache");
                self.cache.set_add(key, member);
                Ok(())
            }
            other => other,
        }
    }

    async fn set_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.inner.set_pop(key).await {
            Err(err) if Self::falls_back(key, &err) => {
                warn!(key, %err, "store unavailable, popping from degraded-mode cache");
                Ok(self.cache.set_pop(key))
            }
            other => other,
        }
    }
}
