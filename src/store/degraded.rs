//! In-process fallback cache used only for non-authoritative data (flap
//! history, dedup hashes, BSID pool) when the backing store is unreachable
//! (spec §4.1 "Failure semantics").

use dashmap::DashMap;
use serde_json::Value;
use std::time::{Duration, Instant};

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

/// A `DashMap`-backed cache mirroring the subset of `IncidentStore`
/// operations that non-authoritative namespaces need. It is never
/// consulted for `orchestrator:incident:*` or `tunnel:*` keys.
#[derive(Default)]
pub struct DegradedModeCache {
    kv: DashMap<String, Entry>,
    counters: DashMap<String, i64>,
    lists: DashMap<String, Vec<Value>>,
    zsets: DashMap<String, Vec<(f64, Value)>>,
    sets: DashMap<String, Vec<String>>,
}

impl DegradedModeCache {
    /// Builds an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors `IncidentStore::get_json`.
    pub fn get_json(&self, key: &str) -> Option<Value> {
        let entry = self.kv.get(key)?;
        if entry.expires_at.is_some_and(|at| at <= Instant::now()) {
            drop(entry);
            self.kv.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Mirrors `IncidentStore::delete`.
    pub fn delete(&self, key: &str) {
        self.kv.remove(key);
    }

    /// Mirrors `IncidentStore::set_json`.
    pub fn set_json(&self, key: &str, value: Value, ttl: Option<Duration>) {
        self.kv.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
    }

    /// Mirrors `IncidentStore::incr`.
    pub fn incr(&self, key: &str) -> i64 {
        let mut counter = self.counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Mirrors `IncidentStore::list_push_front`.
    pub fn list_push_front(&self, key: &str, value: Value) {
        let mut list = self.lists.entry(key.to_string()).or_default();
        list.insert(0, value);
    }

    /// Mirrors `IncidentStore::list_trim`.
    pub fn list_trim(&self, key: &str, n: usize) {
        if let Some(mut list) = self.lists.get_mut(key) {
            list.truncate(n);
        }
    }

    /// Mirrors `IncidentStore::list_range`.
    pub fn list_range(&self, key: &str) -> Vec<Value> {
        self.lists.get(key).map(|l| l.clone()).unwrap_or_default()
    }

    /// Mirrors `IncidentStore::zadd`.
    pub fn zadd(&self, key: &str, score: f64, member: Value) {
        let mut zset = self.zsets.entry(key.to_string()).or_default();
        zset.retain(|(_, m)| m != &member);
        zset.push((score, member));
    }

    /// Mirrors `IncidentStore::zrange_by_score`.
    pub fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> Vec<Value> {
        let Some(zset) = self.zsets.get(key) else {
            return Vec::new();
        };
        let mut matches: Vec<_> = zset
            .iter()
            .filter(|(score, _)| *score >= min && *score <= max)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        matches.into_iter().map(|(_, member)| member).collect()
    }

    /// Mirrors `IncidentStore::set_add`.
    pub fn set_add(&self, key: &str, member: &str) {
        let mut set = self.sets.entry(key.to_string()).or_default();
        if !set.iter().any(|m| m == member) {
            set.push(member.to_string());
        }
    }

    /// Mirrors `IncidentStore::set_pop`.
    pub fn set_pop(&self, key: &str) -> Option<String> {
        self.sets.get_mut(key).and_then(|mut set| {
            if set.is_empty() {
                None
            } else {
                Some(set.remove(0))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_expiry_evicts_lazily_on_read() {
        let cache = DegradedModeCache::new();
        cache.set_json("k", serde_json::json!(1), Some(Duration::from_millis(0)));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get_json("k"), None);
    }

    #[test]
    fn set_pop_drains_members_once() {
        let cache = DegradedModeCache::new();
        cache.set_add("s", "x");
        assert_eq!(cache.set_pop("s"), Some("x".to_string()));
        assert_eq!(cache.set_pop("s"), None);
    }
}
