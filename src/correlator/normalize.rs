//! Alert normalization (spec §4.3 step 1), grounded in
//! `original_source/agents/event_correlator/nodes/ingest_node.py` and
//! `schemas/alerts.py`.

use chrono::Utc;
use serde_json::Value;

use crate::alert::{Alert, InterfaceEndpoints, SlaMetrics};
use crate::domain_types::{AlertId, AlertType, LinkId, Severity};
use crate::error::CorrelationError;

/// Normalizes a raw source payload into the common [`Alert`] shape.
///
/// # Errors
///
/// Returns [`CorrelationError::MalformedAlert`] if the payload is missing
/// fields the named `source` requires (an `alert_id`, and either a
/// `link_id` or both `source_ip`/`dest_ip`).
pub fn normalize(source: &str, raw: &Value) -> Result<Alert, CorrelationError> {
    match source {
        "pca" => normalize_pca(raw),
        "cnc" => normalize_cnc(raw),
        "proactive" => normalize_proactive(raw),
        other => Err(CorrelationError::MalformedAlert {
            message: format!("unknown alert source: {other}"),
        }),
    }
}

fn alert_id(raw: &Value) -> Result<AlertId, CorrelationError> {
    raw.get("alert_id")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .ok_or_else(|| CorrelationError::MalformedAlert { message: "missing alert_id".to_string() })
        .and_then(|s| AlertId::try_new(s).map_err(|e| CorrelationError::MalformedAlert { message: e.to_string() }))
}

fn link_id_or_reconstruct(raw: &Value) -> Result<LinkId, CorrelationError> {
    if let Some(link) = raw.get("link_id").and_then(Value::as_str) {
        return LinkId::try_new(link.to_string()).map_err(|e| CorrelationError::MalformedAlert { message: e.to_string() });
    }
    let source_ip = raw.get("source_ip").and_then(Value::as_str);
    let dest_ip = raw.get("dest_ip").and_then(Value::as_str);
    match (source_ip, dest_ip) {
        (Some(src), Some(dst)) => {
            LinkId::try_new(format!("{src}-{dst}")).map_err(|e| CorrelationError::MalformedAlert { message: e.to_string() })
        }
        _ => Err(CorrelationError::MalformedAlert {
            message: "missing link_id and no source_ip/dest_ip to reconstruct it from".to_string(),
        }),
    }
}

fn endpoints(raw: &Value) -> Option<InterfaceEndpoints> {
    let source = raw.get("source_ip").and_then(Value::as_str)?;
    let destination = raw.get("dest_ip").and_then(Value::as_str)?;
    Some(InterfaceEndpoints { source: source.to_string(), destination: destination.to_string() })
}

fn metrics(raw: &Value) -> SlaMetrics {
    SlaMetrics {
        latency_ms: raw.get("latency_ms").and_then(Value::as_f64),
        jitter_ms: raw.get("jitter_ms").and_then(Value::as_f64),
        loss_ratio: raw.get("loss_ratio").and_then(Value::as_f64),
    }
}

fn violated_thresholds(raw: &Value) -> Vec<String> {
    raw.get("violated_thresholds")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// PCA-style alerts carry `current_value`/`threshold_value`; severity is
/// derived from their ratio (spec §4.3 step 1, testable property 5 in §8).
fn pca_severity(ratio: f64) -> Severity {
    if ratio >= 2.0 {
        Severity::Critical
    } else if ratio >= 1.5 {
        Severity::Major
    } else if ratio >= 1.2 {
        Severity::Minor
    } else {
        Severity::Warning
    }
}

fn normalize_pca(raw: &Value) -> Result<Alert, CorrelationError> {
    let current_value = raw.get("current_value").and_then(Value::as_f64).unwrap_or(0.0);
    let threshold_value = raw.get("threshold_value").and_then(Value::as_f64).unwrap_or(1.0);
    let ratio = if threshold_value.abs() < f64::EPSILON { f64::MAX } else { current_value / threshold_value };
    let metric_name = raw.get("metric_name").and_then(Value::as_str).unwrap_or("latency").to_string();

    Ok(Alert {
        alert_id: alert_id(raw)?,
        source: "pca".to_string(),
        timestamp: Utc::now(),
        link_id: link_id_or_reconstruct(raw)?,
        endpoints: endpoints(raw),
        metrics: metrics(raw),
        violated_thresholds: vec![metric_name],
        severity: pca_severity(ratio),
        alert_type: AlertType::ReactiveSla,
        shared_node: raw.get("shared_node").and_then(Value::as_str).map(str::to_string),
        policy_path: raw.get("policy_path").and_then(Value::as_str).map(str::to_string),
        raw_payload: raw.clone(),
    })
}

fn normalize_cnc(raw: &Value) -> Result<Alert, CorrelationError> {
    let severity_tag = raw.get("severity").and_then(Value::as_str).unwrap_or("warning");
    let severity = match severity_tag {
        "critical" => Severity::Critical,
        "major" => Severity::Major,
        "minor" => Severity::Minor,
        // CNC-style "clear" (an alarm clearing) maps to warning (spec §4.3).
        _ => Severity::Warning,
    };

    Ok(Alert {
        alert_id: alert_id(raw)?,
        source: "cnc".to_string(),
        timestamp: Utc::now(),
        link_id: link_id_or_reconstruct(raw)?,
        endpoints: endpoints(raw),
        metrics: metrics(raw),
        violated_thresholds: violated_thresholds(raw),
        severity,
        alert_type: AlertType::ReactiveAlarm,
        shared_node: raw.get("shared_node").and_then(Value::as_str).map(str::to_string),
        policy_path: raw.get("policy_path").and_then(Value::as_str).map(str::to_string),
        raw_payload: raw.clone(),
    })
}

fn normalize_proactive(raw: &Value) -> Result<Alert, CorrelationError> {
    let severity_tag = raw.get("severity").and_then(Value::as_str).unwrap_or("warning");
    let severity = match severity_tag {
        "critical" => Severity::Critical,
        "major" => Severity::Major,
        "minor" => Severity::Minor,
        _ => Severity::Warning,
    };
    let thresholds = raw
        .get("predicted_violations")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    Ok(Alert {
        alert_id: alert_id(raw)?,
        source: "proactive".to_string(),
        timestamp: Utc::now(),
        link_id: link_id_or_reconstruct(raw)?,
        endpoints: endpoints(raw),
        metrics: metrics(raw),
        violated_thresholds: thresholds,
        severity,
        alert_type: AlertType::ProactivePrediction,
        shared_node: raw.get("shared_node").and_then(Value::as_str).map(str::to_string),
        policy_path: raw.get("policy_path").and_then(Value::as_str).map(str::to_string),
        raw_payload: raw.clone(),
    })
}
