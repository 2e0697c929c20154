//! The Incident record — the durable object capturing one protection
//! lifecycle (spec §3), and the lifecycle status enum driven by the
//! Orchestrator state machine (spec §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain_types::{
    AlertId, AlertType, BindingIdentifier, CorrelationId, CutoverMode, EscalationReason, IncidentId, LinkId, NodeId, Severity,
    TunnelId,
};

/// Lifecycle state of an incident, mirroring the Orchestrator's state
/// machine (spec §4.8). `Dampening` branches from `Detecting`; `Escalated`
/// branches from any other state on a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    /// A fresh or re-checked alert is being evaluated for flapping.
    Detecting,
    /// Suppressing alerts for a flapping link; backing off before re-detect.
    Dampening,
    /// Service Impact is ranking affected services.
    Assessing,
    /// Path Computer is searching for a protection path.
    Computing,
    /// Tunnel Provisioner is creating the protection tunnel.
    Provisioning,
    /// Traffic is being steered onto the protection tunnel.
    Steering,
    /// Restoration Monitor is polling the original path's SLA.
    Monitoring,
    /// A cutover (immediate or gradual) is in progress.
    Restoring,
    /// Terminal: notified, audited, and retained for 24h (spec §3).
    Closed,
    /// Terminal-bound: a hard failure occurred; notify + audit, then close.
    Escalated,
}

impl IncidentStatus {
    /// Whether this status is a true terminal state (no further
    /// transitions). `Escalated` always routes to `Closed` next (spec
    /// §4.8's transition table), so it is not terminal by this definition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Why an incident closed without escalating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Service Impact reported zero affected services (spec §8 scenario b).
    NoServicesAffected,
    /// The full restore-then-cutover cycle completed successfully.
    CutoverComplete,
    /// The incident closed after an escalation (spec §4.8 "escalated ->
    /// close"); the original cause is still available on the incident's
    /// `escalation_reason` field.
    Escalated,
}

/// The durable incident record (spec §3). Owned exclusively by one
/// Orchestrator run; the Incident Store is its only persistent backing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    /// Time-ordered unique identifier minted by the correlator.
    pub id: IncidentId,
    /// Degraded link identifiers driving this incident.
    pub degraded_links: Vec<LinkId>,
    /// Aggregated severity across all correlated alerts.
    pub severity: Severity,
    /// How the degradation was first observed.
    pub alert_type: AlertType,
    /// All alert IDs the correlator folded into this incident.
    pub correlated_alert_ids: Vec<AlertId>,
    /// Current lifecycle state.
    pub status: IncidentStatus,
    /// Number of provisioning attempts made so far (spec §4.8, capped at 3).
    pub retry_count: u8,
    /// Number of times this incident has entered `Dampening`, driving the
    /// exponential backoff sequence 30/60/120/300/600s (spec §4.8).
    pub dampen_attempt: u8,
    /// The orchestrator node (state) currently executing or last executed.
    pub current_node: String,
    /// Ordered list of every node this incident's run has visited, used to
    /// prove testable property 1 (spec §8): the list begins with
    /// start/detect and ends with close.
    pub nodes_visited: Vec<String>,
    /// When the incident was first created.
    pub created_at: DateTime<Utc>,
    /// When the incident record was last mutated.
    pub updated_at: DateTime<Utc>,
    /// When the incident reached `Closed`, if it has.
    pub closed_at: Option<DateTime<Utc>>,
    /// Why the incident closed, if it has.
    pub close_reason: Option<CloseReason>,
    /// The specific cause if the incident escalated (spec §4.8, §7).
    pub escalation_reason: Option<EscalationReason>,
    /// The protection tunnel provisioned for this incident, if any.
    pub protection_tunnel_id: Option<TunnelId>,
    /// The protection tunnel's head-end, durable so a crash-recovered run
    /// can tear it down without re-deriving it from topology inputs.
    pub protection_head_end: Option<NodeId>,
    /// The protection tunnel's allocated binding identifier (numeric MPLS
    /// label or SRv6 locator), durable for the same reason (spec §8
    /// invariant 2, §3 "binding-SID (numeric for MPLS, textual locator for
    /// SRv6)").
    pub protection_binding_sid: Option<BindingIdentifier>,
    /// The highest-priority affected service, chosen by Service Impact.
    pub primary_service: Option<String>,
    /// How traffic will be (or was) cut back to the original path.
    pub cutover_mode: Option<CutoverMode>,
    /// Correlation ID threaded through every A2A call this incident makes.
    pub correlation_id: CorrelationId,
    /// Human-readable detail of the most recent node failure, if any (spec
    /// §7 "captured, written to the incident record's `error_message`").
    pub error_message: Option<String>,
}

impl Incident {
    /// Builds a freshly-minted incident in `Detecting` status.
    pub fn new(
        id: IncidentId,
        degraded_links: Vec<LinkId>,
        severity: Severity,
        alert_type: AlertType,
        correlated_alert_ids: Vec<AlertId>,
        correlation_id: CorrelationId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            degraded_links,
            severity,
            alert_type,
            correlated_alert_ids,
            status: IncidentStatus::Detecting,
            retry_count: 0,
            dampen_attempt: 0,
            current_node: "detect".to_string(),
            nodes_visited: vec!["detect".to_string()],
            created_at: now,
            updated_at: now,
            closed_at: None,
            close_reason: None,
            escalation_reason: None,
            protection_tunnel_id: None,
            protection_head_end: None,
            protection_binding_sid: None,
            primary_service: None,
            cutover_mode: None,
            correlation_id,
            error_message: None,
        }
    }

    /// Records a transition into `node`, appending it to the visited list
    /// and stamping `updated_at`. This is the "write-last policy" mutation
    /// point spec §4.8 requires before every state transition.
    pub fn visit_node(&mut self, node: &str, status: IncidentStatus, now: DateTime<Utc>) {
        self.current_node = node.to_string();
        self.nodes_visited.push(node.to_string());
        self.status = status;
        self.updated_at = now;
    }

    /// Closes the incident with the given reason, stamping `closed_at`.
    pub fn close(&mut self, reason: CloseReason, now: DateTime<Utc>) {
        self.visit_node("close", IncidentStatus::Closed, now);
        self.close_reason = Some(reason);
        self.closed_at = Some(now);
    }

    /// Transitions to `Escalated` with the given cause.
    pub fn escalate(&mut self, reason: EscalationReason, now: DateTime<Utc>) {
        self.visit_node("escalate", IncidentStatus::Escalated, now);
        self.escalation_reason = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_incident(now: DateTime<Utc>) -> Incident {
        Incident::new(
            IncidentId::generate(now),
            vec![LinkId::try_new("link-A".to_string()).unwrap()],
            Severity::Major,
            AlertType::ReactiveSla,
            vec![AlertId::try_new("alert-1".to_string()).unwrap()],
            CorrelationId::generate(),
            now,
        )
    }

    #[test]
    fn new_incident_starts_at_detect_and_detecting() {
        let now = Utc::now();
        let incident = sample_incident(now);
        assert_eq!(incident.nodes_visited, vec!["detect".to_string()]);
        assert_eq!(incident.status, IncidentStatus::Detecting);
    }

    #[test]
    fn closing_appends_close_and_sets_terminal_fields() {
        let now = Utc::now();
        let mut incident = sample_incident(now);
        incident.visit_node("assess", IncidentStatus::Assessing, now);
        incident.close(CloseReason::NoServicesAffected, now);

        assert_eq!(incident.nodes_visited.last().unwrap(), "close");
        assert!(incident.nodes_visited.first().unwrap() == "detect");
        assert!(incident.status.is_terminal());
        assert_eq!(incident.close_reason, Some(CloseReason::NoServicesAffected));
        assert!(incident.closed_at.is_some());
    }

    #[test]
    fn escalate_then_close_preserves_escalation_reason() {
        let now = Utc::now();
        let mut incident = sample_incident(now);
        incident.escalate(EscalationReason::NoAlternatePath, now);
        incident.close(CloseReason::Escalated, now);
        assert_eq!(incident.escalation_reason, Some(EscalationReason::NoAlternatePath));
        assert_eq!(incident.close_reason, Some(CloseReason::Escalated));
    }
}
