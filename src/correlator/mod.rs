//! Event correlation: normalize → deduplicate → correlate → flap-detect →
//! emit (spec §4.3), grounded in
//! `original_source/agents/event_correlator/{tools,nodes}/*.py`.

mod dedup;
pub(crate) mod flap;
mod normalize;
mod rules;

use chrono::Utc;
use serde_json::Value;

use crate::domain_types::{AlertType, IncidentId, LinkId, Severity};
use crate::error::CoreError;
use crate::store::IncidentStore;

pub use flap::FlapState;

/// Outcome of running an alert through the full correlation pipeline.
#[derive(Debug)]
pub enum CorrelationOutcome {
    /// The alert hashed identically to one already seen within the dedup
    /// window; nothing further happened.
    Discarded {
        /// The alert ID this one duplicates.
        duplicate_of: String,
    },
    /// The alert correlated, but the affected link is flapping; emission is
    /// suppressed for `dampen_seconds`.
    Suppressed {
        /// The flapping link.
        link_id: LinkId,
        /// Seconds to suppress further emission for.
        dampen_seconds: u64,
        /// Incident the alert still correlated into, in case a caller wants
        /// to annotate it despite the suppression.
        incident_id: IncidentId,
    },
    /// The alert correlated into an incident and should be emitted
    /// downstream (spec §4.3 step 5).
    Correlated {
        /// Incident this alert belongs to.
        incident_id: IncidentId,
        /// Every link implicated by the correlated alert group.
        degraded_links: Vec<LinkId>,
        /// Highest severity among the correlated group. For a first alert
        /// this is simply its own severity.
        severity: Severity,
        /// How this alert was observed; used to seed a freshly-minted
        /// incident record.
        alert_type: AlertType,
        /// Count of alerts folded into this incident so far.
        alert_count: usize,
        /// Alert IDs folded into this incident so far.
        correlated_alerts: Vec<String>,
        /// The rule that matched, if any (`None` for a brand-new incident).
        correlation_rule: Option<&'static str>,
        /// The matched rule's human description, if any.
        correlation_reason: Option<&'static str>,
    },
}

/// Runs the full correlator pipeline for one raw alert from `source`.
///
/// Order is fixed (spec §4.3): normalize, then dedupe (short-circuits on a
/// hit), then correlate against the rule table, then flap-detect the
/// implicated link (short-circuits emission while flapping).
///
/// # Errors
///
/// Returns [`CoreError::Correlation`] if the payload is malformed for its
/// declared `source`, or [`CoreError::Store`] if the backing store is
/// unreachable.
pub async fn correlate_alert(store: &dyn IncidentStore, source: &str, raw_payload: &Value) -> Result<CorrelationOutcome, CoreError> {
    let alert = normalize::normalize(source, raw_payload)?;

    if let Some(duplicate_of) = dedup::check_duplicate(store, &alert).await? {
        return Ok(CorrelationOutcome::Discarded { duplicate_of });
    }
    dedup::record(store, &alert).await?;

    let correlation = rules::correlate(store, &alert).await?;

    let flap = flap::record_and_check(store, &alert.link_id, Utc::now()).await?;
    if flap.is_flapping {
        return Ok(CorrelationOutcome::Suppressed {
            link_id: alert.link_id,
            dampen_seconds: flap.dampen_seconds,
            incident_id: correlation.incident_id,
        });
    }

    Ok(CorrelationOutcome::Correlated {
        incident_id: correlation.incident_id,
        alert_count: correlation.correlated_alerts.len(),
        degraded_links: correlation.degraded_links,
        severity: alert.severity,
        alert_type: alert.alert_type,
        correlated_alerts: correlation.correlated_alerts,
        correlation_rule: correlation.correlation_rule,
        correlation_reason: correlation.correlation_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteIncidentStore;
    use serde_json::json;

    #[tokio::test]
    async fn first_alert_on_a_link_yields_a_new_correlated_incident() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let raw = json!({"alert_id": "a1", "link_id": "link-A", "severity": "major"});

        let outcome = correlate_alert(&store, "cnc", &raw).await.unwrap();
        match outcome {
            CorrelationOutcome::Correlated { correlation_rule, alert_count, .. } => {
                assert!(correlation_rule.is_none());
                assert_eq!(alert_count, 1);
            }
            other => panic!("expected Correlated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn identical_repeat_alert_is_discarded_as_duplicate() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let raw = json!({
            "alert_id": "a1", "link_id": "link-A", "severity": "major",
            "violated_thresholds": ["latency"],
        });
        let repeat = json!({
            "alert_id": "a2", "link_id": "link-A", "severity": "major",
            "violated_thresholds": ["latency"],
        });

        correlate_alert(&store, "cnc", &raw).await.unwrap();
        let outcome = correlate_alert(&store, "cnc", &repeat).await.unwrap();

        assert!(matches!(outcome, CorrelationOutcome::Discarded { duplicate_of } if duplicate_of == "a1"));
    }

    #[tokio::test]
    async fn third_state_change_on_a_link_within_window_is_suppressed() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        for i in 0..3 {
            let raw = json!({
                "alert_id": format!("a{i}"), "link_id": "link-A", "severity": "major",
                "violated_thresholds": [format!("metric-{i}")],
            });
            let outcome = correlate_alert(&store, "cnc", &raw).await.unwrap();
            if i == 2 {
                assert!(matches!(outcome, CorrelationOutcome::Suppressed { dampen_seconds: 60, .. }));
            }
        }
    }

    #[tokio::test]
    async fn unknown_source_is_rejected_before_touching_the_store() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let raw = json!({"alert_id": "a1"});
        let err = correlate_alert(&store, "unknown", &raw).await.unwrap_err();
        assert!(matches!(err, CoreError::Correlation(_)));
    }
}
