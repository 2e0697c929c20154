//! Correlation rules applied in fixed declared order (spec §4.3 step 3),
//! grounded in `original_source/agents/event_correlator/tools/correlator.py`
//! (`CORRELATION_RULES`, `AlertCorrelator._apply_rule`/`_store_alert`).

use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};

use crate::alert::Alert;
use crate::domain_types::{IncidentId, LinkId};
use crate::store::{keys, IncidentStore, StoreError};

/// A single correlation rule: alerts sharing `group_by`'s value within
/// `window_seconds` of each other are merged into one incident.
pub struct CorrelationRule {
    /// Stable rule name, carried through as `correlation_rule`.
    pub name: &'static str,
    /// Human description, carried through as `correlation_reason`.
    pub description: &'static str,
    /// Time window alerts must fall within to correlate.
    pub window_seconds: i64,
    /// Extracts the grouping value from an alert, if it carries one.
    pub group_by: fn(&Alert) -> Option<String>,
}

/// The fixed, first-match-wins rule table (spec §4.3).
pub const CORRELATION_RULES: &[CorrelationRule] = &[
    CorrelationRule {
        name: "same_link_multiple_metrics",
        description: "Multiple SLA violations on same link within 60s",
        window_seconds: 60,
        group_by: |alert| Some(alert.link_id.as_ref().to_string()),
    },
    CorrelationRule {
        name: "adjacent_link_failures",
        description: "Alerts on links sharing a node within 30s",
        window_seconds: 30,
        group_by: |alert| alert.shared_node.clone(),
    },
    CorrelationRule {
        name: "path_correlation",
        description: "Multiple links on same SR policy path",
        window_seconds: 120,
        group_by: |alert| alert.policy_path.clone(),
    },
];

/// Result of correlating a single alert against the rule table.
pub struct CorrelationMatch {
    /// The incident this alert belongs to (existing or freshly minted).
    pub incident_id: IncidentId,
    /// Whether `incident_id` was just minted rather than inherited.
    pub is_new_incident: bool,
    /// Every alert ID folded into this incident so far, including this one.
    pub correlated_alerts: Vec<String>,
    /// The rule name that matched, if any.
    pub correlation_rule: Option<&'static str>,
    /// The rule's description, if one matched.
    pub correlation_reason: Option<&'static str>,
    /// Every distinct link implicated across the correlated alerts.
    pub degraded_links: Vec<LinkId>,
}

/// Correlates `alert` against the rule table in declared order, recording it
/// under every rule's window afterward so later alerts can find it.
///
/// # Errors
///
/// Propagates `StoreError` from the backing store.
pub async fn correlate(store: &dyn IncidentStore, alert: &Alert) -> Result<CorrelationMatch, StoreError> {
    let now = Utc::now();
    let score = now.timestamp() as f64;

    for rule in CORRELATION_RULES {
        let Some(group) = (rule.group_by)(alert) else { continue };
        let key = keys::correlation_window(rule.name, &group);
        let window_start = score - rule.window_seconds as f64;
        let existing = store.zrange_by_score(&key, window_start, f64::INFINITY).await?;

        if existing.is_empty() {
            continue;
        }

        let mut correlated_alerts = vec![alert.alert_id.as_ref().to_string()];
        let mut degraded_links = vec![alert.link_id.clone()];
        let mut incident_id = None;

        for item in &existing {
            if let Some(stored_alert_id) = item.get("alert_id").and_then(Value::as_str) {
                correlated_alerts.push(stored_alert_id.to_string());
            }
            if incident_id.is_none() {
                if let Some(stored_incident) = item.get("incident_id").and_then(Value::as_str) {
                    incident_id = IncidentId::try_new(stored_incident.to_string()).ok();
                }
            }
            if let Some(stored_link) = item.get("link_id").and_then(Value::as_str) {
                if let Ok(link) = LinkId::try_new(stored_link.to_string()) {
                    if !degraded_links.contains(&link) {
                        degraded_links.push(link);
                    }
                }
            }
        }

        let incident_id = incident_id.unwrap_or_else(|| IncidentId::generate(now));
        store_alert(store, alert, &incident_id, now, score).await?;

        return Ok(CorrelationMatch {
            incident_id,
            is_new_incident: false,
            correlated_alerts,
            correlation_rule: Some(rule.name),
            correlation_reason: Some(rule.description),
            degraded_links,
        });
    }

    let incident_id = IncidentId::generate(now);
    store_alert(store, alert, &incident_id, now, score).await?;

    Ok(CorrelationMatch {
        incident_id,
        is_new_incident: true,
        correlated_alerts: vec![alert.alert_id.as_ref().to_string()],
        correlation_rule: None,
        correlation_reason: None,
        degraded_links: vec![alert.link_id.clone()],
    })
}

async fn store_alert(
    store: &dyn IncidentStore,
    alert: &Alert,
    incident_id: &IncidentId,
    now: chrono::DateTime<Utc>,
    score: f64,
) -> Result<(), StoreError> {
    let payload = json!({
        "alert_id": alert.alert_id.as_ref(),
        "incident_id": incident_id.as_ref(),
        "link_id": alert.link_id.as_ref(),
        "timestamp": now.to_rfc3339(),
    });

    for rule in CORRELATION_RULES {
        let Some(group) = (rule.group_by)(alert) else { continue };
        let key = keys::correlation_window(rule.name, &group);
        store.zadd(&key, score, &payload).await?;
        store.zset_expire(&key, Duration::from_secs((rule.window_seconds * 2) as u64)).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_types::{AlertId, AlertType, Severity};
    use crate::store::SqliteIncidentStore;

    fn make_alert(alert_id: &str, link_id: &str) -> Alert {
        Alert {
            alert_id: AlertId::try_new(alert_id.to_string()).unwrap(),
            source: "cnc".to_string(),
            timestamp: Utc::now(),
            link_id: LinkId::try_new(link_id.to_string()).unwrap(),
            endpoints: None,
            metrics: Default::default(),
            violated_thresholds: vec![],
            severity: Severity::Major,
            alert_type: AlertType::ReactiveAlarm,
            shared_node: None,
            policy_path: None,
            raw_payload: json!({}),
        }
    }

    #[tokio::test]
    async fn first_alert_on_a_link_opens_a_new_incident() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let alert = make_alert("a1", "link-A");

        let result = correlate(&store, &alert).await.unwrap();
        assert!(result.is_new_incident);
        assert!(result.correlation_rule.is_none());
    }

    #[tokio::test]
    async fn second_alert_on_same_link_within_window_merges_into_existing_incident() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let first = make_alert("a1", "link-A");
        let second = make_alert("a2", "link-A");

        let first_result = correlate(&store, &first).await.unwrap();
        let second_result = correlate(&store, &second).await.unwrap();

        assert!(!second_result.is_new_incident);
        assert_eq!(second_result.correlation_rule, Some("same_link_multiple_metrics"));
        assert_eq!(second_result.incident_id, first_result.incident_id);
        assert_eq!(second_result.correlated_alerts.len(), 2);
    }

    #[tokio::test]
    async fn alerts_on_different_links_without_shared_grouping_do_not_correlate() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let first = make_alert("a1", "link-A");
        let second = make_alert("a2", "link-B");

        correlate(&store, &first).await.unwrap();
        let second_result = correlate(&store, &second).await.unwrap();

        assert!(second_result.is_new_incident);
    }
}
