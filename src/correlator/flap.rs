//! Flap detection with exponential dampening (spec §4.3 step 4), grounded
//! in `original_source/agents/event_correlator/tools/flap_detector.py`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::domain_types::LinkId;
use crate::store::{keys, IncidentStore, StoreError};

/// Window over which state changes are counted (`FLAP_WINDOW`).
const FLAP_WINDOW_SECONDS: i64 = 300;
/// Number of state changes within the window that counts as flapping.
const FLAP_THRESHOLD: usize = 3;
/// Base dampen duration (`INITIAL_DAMPEN`).
const INITIAL_DAMPEN_SECONDS: u64 = 60;
/// Dampen duration ceiling (`MAX_DAMPEN`).
const MAX_DAMPEN_SECONDS: u64 = 3600;

/// Outcome of a flap check for a single link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlapState {
    /// Whether the link has exceeded the flap threshold.
    pub is_flapping: bool,
    /// Seconds to suppress emission for, if flapping.
    pub dampen_seconds: u64,
}

/// Records a state-change event for `link_id`, then checks whether the link
/// is flapping.
///
/// Recording happens before the check so the just-recorded change counts
/// toward the threshold (spec §4.3 step 4, matching
/// `flap_detect_node.py`'s `record_state_change` then `check_flapping`
/// ordering).
///
/// # Errors
///
/// Propagates `StoreError` from the backing store.
pub async fn record_and_check(store: &dyn IncidentStore, link_id: &LinkId, now: DateTime<Utc>) -> Result<FlapState, StoreError> {
    record_state_change(store, link_id, now).await?;
    check_flapping(store, link_id, now).await
}

async fn record_state_change(store: &dyn IncidentStore, link_id: &LinkId, now: DateTime<Utc>) -> Result<(), StoreError> {
    let key = keys::flap_history(link_id.as_ref());
    store.list_push_front(&key, &json!(now.to_rfc3339())).await?;
    store.list_trim(&key, 100).await?;
    store.list_expire(&key, Duration::from_secs((FLAP_WINDOW_SECONDS * 2) as u64)).await
}

/// Checks whether `link_id` is currently flapping without recording a new
/// state change, for callers (the Orchestrator's `detecting` node) that are
/// re-checking stability rather than reacting to a fresh alert.
pub(crate) async fn check_flapping(store: &dyn IncidentStore, link_id: &LinkId, now: DateTime<Utc>) -> Result<FlapState, StoreError> {
    let history_key = keys::flap_history(link_id.as_ref());
    let history = store.list_range(&history_key).await?;
    let window_start = now - chrono::Duration::seconds(FLAP_WINDOW_SECONDS);

    let recent = history
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|s| DateTime::parse_from_rfc3339(s).ok())
        .filter(|t| t.with_timezone(&Utc) >= window_start)
        .count();

    if recent < FLAP_THRESHOLD {
        return Ok(FlapState { is_flapping: false, dampen_seconds: 0 });
    }

    let count_key = keys::flap_count(link_id.as_ref());
    let flap_count = store.incr(&count_key, Some(Duration::from_secs(MAX_DAMPEN_SECONDS * 2))).await?;
    let exponent = u32::try_from(flap_count.saturating_sub(1)).unwrap_or(u32::MAX);
    let dampen_seconds = INITIAL_DAMPEN_SECONDS.saturating_mul(2u64.saturating_pow(exponent)).min(MAX_DAMPEN_SECONDS);

    Ok(FlapState { is_flapping: true, dampen_seconds })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteIncidentStore;

    #[tokio::test]
    async fn fewer_than_threshold_changes_is_not_flapping() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let link = LinkId::try_new("link-A".to_string()).unwrap();
        let now = Utc::now();

        let first = record_and_check(&store, &link, now).await.unwrap();
        let second = record_and_check(&store, &link, now).await.unwrap();
        assert!(!first.is_flapping);
        assert!(!second.is_flapping);
    }

    #[tokio::test]
    async fn threshold_changes_within_window_trips_flapping() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let link = LinkId::try_new("link-A".to_string()).unwrap();
        let now = Utc::now();

        record_and_check(&store, &link, now).await.unwrap();
        record_and_check(&store, &link, now).await.unwrap();
        let third = record_and_check(&store, &link, now).await.unwrap();

        assert!(third.is_flapping);
        assert_eq!(third.dampen_seconds, 60);
    }

    #[tokio::test]
    async fn dampen_doubles_and_caps_at_max() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let link = LinkId::try_new("link-A".to_string()).unwrap();
        let now = Utc::now();

        for _ in 0..2 {
            record_and_check(&store, &link, now).await.unwrap();
        }
        let first_trip = record_and_check(&store, &link, now).await.unwrap();
        assert_eq!(first_trip.dampen_seconds, 60);

        let second_trip = record_and_check(&store, &link, now).await.unwrap();
        assert_eq!(second_trip.dampen_seconds, 120);
    }

    #[tokio::test]
    async fn changes_outside_window_are_not_counted() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let link = LinkId::try_new("link-A".to_string()).unwrap();
        let old = Utc::now() - chrono::Duration::seconds(FLAP_WINDOW_SECONDS + 60);

        record_and_check(&store, &link, old).await.unwrap();
        record_and_check(&store, &link, old).await.unwrap();
        let recent_check = record_and_check(&store, &link, Utc::now()).await.unwrap();

        assert!(!recent_check.is_flapping);
    }
}
