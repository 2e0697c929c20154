//! The normalized `Alert` type (spec §3) — the common shape every source
//! format (PCA, CNC, proactive) collapses into before correlation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain_types::{AlertId, AlertType, LinkId, Severity};

/// The two interface endpoints a link alert names, when available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceEndpoints {
    /// Source-side interface or IP address.
    pub source: String,
    /// Destination-side interface or IP address.
    pub destination: String,
}

/// SLA metrics an alert may carry; any subset may be present depending on
/// source format (spec §3 "each optional").
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SlaMetrics {
    /// One-way or round-trip latency in milliseconds.
    pub latency_ms: Option<f64>,
    /// Jitter in milliseconds.
    pub jitter_ms: Option<f64>,
    /// Packet loss as a fraction in `[0, 1]`.
    pub loss_ratio: Option<f64>,
}

/// A normalized alert, immutable once ingested (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Identifier as assigned by the source system.
    pub alert_id: AlertId,
    /// Source system tag (e.g. `"pca"`, `"cnc"`, `"proactive"`).
    pub source: String,
    /// When the source system raised the alert.
    pub timestamp: DateTime<Utc>,
    /// The degraded link this alert concerns.
    pub link_id: LinkId,
    /// Interface endpoints, when the source reports them.
    pub endpoints: Option<InterfaceEndpoints>,
    /// SLA metric values carried by the alert.
    pub metrics: SlaMetrics,
    /// Names of the thresholds this alert violated.
    pub violated_thresholds: Vec<String>,
    /// Normalized severity.
    pub severity: Severity,
    /// How this alert was produced.
    pub alert_type: AlertType,
    /// The node shared with adjacent alerts, used by the
    /// `adjacent_link_failures` correlation rule (spec §4.3).
    pub shared_node: Option<String>,
    /// The SR policy path shared with other alerts, used by the
    /// `path_correlation` rule.
    pub policy_path: Option<String>,
    /// The unmodified source payload, retained for audit replay.
    pub raw_payload: Value,
}

impl Alert {
    /// The fields the dedup hash is computed over (spec §3 "Dedup hash").
    pub fn dedup_fields(&self) -> (LinkId, Severity, Vec<String>) {
        let mut thresholds = self.violated_thresholds.clone();
        thresholds.sort();
        (self.link_id.clone(), self.severity, thresholds)
    }
}
