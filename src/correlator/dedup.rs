//! Alert deduplication (spec §4.3 step 2), grounded in
//! `original_source/agents/event_correlator/tools/dedup_checker.py`.

use std::time::Duration;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::alert::Alert;
use crate::store::{keys, IncidentStore, StoreError};

/// Dedup window: repeated alerts hashing the same within this many seconds
/// are treated as one (spec §4.3, `DedupChecker.DEDUP_WINDOW`).
const DEDUP_WINDOW_SECONDS: u64 = 300;

/// Computes the dedup hash over `(link_id, severity, sorted violated_thresholds)`.
fn dedup_hash(alert: &Alert) -> String {
    let (link_id, severity, thresholds) = alert.dedup_fields();
    let mut hasher = Sha256::new();
    hasher.update(link_id.as_ref().as_bytes());
    hasher.update([0u8]);
    hasher.update(format!("{severity:?}").as_bytes());
    hasher.update([0u8]);
    hasher.update(thresholds.join(",").as_bytes());
    let digest = hasher.finalize();
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

/// Checks whether `alert` duplicates one already recorded within the dedup
/// window, returning the original alert ID's text if so.
///
/// # Errors
///
/// Propagates `StoreError` from the backing store.
pub async fn check_duplicate(store: &dyn IncidentStore, alert: &Alert) -> Result<Option<String>, StoreError> {
    let key = keys::dedup_hash(&dedup_hash(alert));
    let existing = store.get_json(&key).await?;
    Ok(existing.and_then(|v| v.as_str().map(str::to_string)))
}

/// Records `alert` under its dedup hash so later duplicates resolve back to
/// it, for [`DEDUP_WINDOW_SECONDS`].
///
/// # Errors
///
/// Propagates `StoreError` from the backing store.
pub async fn record(store: &dyn IncidentStore, alert: &Alert) -> Result<(), StoreError> {
    let key = keys::dedup_hash(&dedup_hash(alert));
    let value = Value::String(alert.alert_id.as_ref().to_string());
    store.set_json(&key, &value, Some(Duration::from_secs(DEDUP_WINDOW_SECONDS))).await
}
