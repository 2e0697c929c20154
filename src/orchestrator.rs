//! The Orchestrator: the state machine that drives one incident through
//! its full protection lifecycle (spec §4.8), grounded in
//! `original_source/agents/orchestrator/workflow.py` (a LangGraph state
//! graph re-expressed here as a plain Rust loop over [`IncidentStatus`]).
//!
//! Every other agent module in this crate (`service_impact`,
//! `path_computer`, `tunnel`, `restoration`) exposes its contract as a
//! trait the Orchestrator calls directly; in production those traits are
//! backed by A2A clients dialing the collaborator agent's own process,
//! but the state machine itself is agnostic to that and is exercised here
//! against in-process fakes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::correlator::flap;
use crate::domain_types::{CutoverMode, EscalationReason, NodeId, PathType, SlaTier};
use crate::error::{CoreError, OrchestratorError};
use crate::incident::{CloseReason, Incident, IncidentStatus};
use crate::notification::{log_event, send_notification, AuditSink, EventType, NotificationSink};
use crate::path_computer::{compute_protected_path, ComputedPath, PathQuerySource};
use crate::restoration::{monitor_restoration, PathEndpoints, RestorationOutcome, SlaProbe, TrafficWeightController};
use crate::service_impact::{assess_impact, ServiceHealthSource, ServiceImpactResponse};
use crate::store::{keys, IncidentStore};
use crate::tunnel::{provision_tunnel, OperationalStatus, TunnelControllerSource, TunnelResult};

/// Backoff sequence for the `dampening` → `detecting` re-check (spec
/// §4.8): 30, 60, 120, 300, 600 seconds, held at the last value once the
/// incident has dampened that many times.
const DAMPEN_BACKOFF_SECONDS: [u64; 5] = [30, 60, 120, 300, 600];

/// Every external collaborator source and sink the Orchestrator calls
/// through while driving one incident (spec §4.8's per-node dispatch
/// list). Bundled so `run_incident` doesn't carry ten separate
/// parameters.
pub struct Collaborators<'a> {
    /// Service Impact's topology/service-health source.
    pub service_health: &'a dyn ServiceHealthSource,
    /// Path Computer's topology query source.
    pub path_query: &'a dyn PathQuerySource,
    /// Tunnel Provisioner's and Restoration Monitor's shared controller.
    pub tunnel_controller: &'a dyn TunnelControllerSource,
    /// Restoration Monitor's SLA telemetry source.
    pub sla_probe: &'a dyn SlaProbe,
    /// Restoration Monitor's traffic-steering controller.
    pub traffic_weights: &'a dyn TrafficWeightController,
    /// Operator-facing notification sink.
    pub notifications: &'a dyn NotificationSink,
    /// Append-only audit log sink.
    pub audit: &'a dyn AuditSink,
}

/// Tunable timing knobs, separated from [`Collaborators`] so tests can
/// shrink every wait to near-zero without touching collaborator wiring
/// (spec §8 tests drive scenarios end-to-end; real backoffs would make
/// that impractical).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Backoff sequence for repeated `dampening` visits.
    pub dampen_backoff_seconds: [u64; 5],
    /// Delay between a failed provisioning/steering attempt and the retry.
    pub provisioning_retry_backoff: Duration,
    /// Attempts allowed before provisioning or steering escalates (spec
    /// §4.8, §7 `tunnel-provision-failed-3x`).
    pub max_provisioning_retries: u8,
    /// Spacing between tunnel VERIFY polls during provisioning.
    pub tunnel_verify_poll_interval: Duration,
    /// Poll-attempt cap for a single provisioning attempt's VERIFY step.
    pub tunnel_verify_max_attempts: u32,
    /// Spacing between SLA samples during restoration monitoring.
    pub restoration_poll_interval: Duration,
    /// Poll-attempt cap before restoration monitoring gives up.
    pub restoration_max_poll_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            dampen_backoff_seconds: DAMPEN_BACKOFF_SECONDS,
            provisioning_retry_backoff: Duration::from_secs(1),
            max_provisioning_retries: 3,
            tunnel_verify_poll_interval: Duration::from_secs(5),
            tunnel_verify_max_attempts: 10,
            restoration_poll_interval: Duration::from_secs(30),
            restoration_max_poll_attempts: 100,
        }
    }
}

/// Working state for one orchestrator run: the durable [`Incident`] plus
/// the ephemeral collaborator responses threaded between nodes. Only
/// `incident` is persisted; a crash mid-run re-enters at whatever node
/// `incident.status` names and re-derives the rest from scratch.
struct WorkflowState {
    incident: Incident,
    impact: Option<ServiceImpactResponse>,
    path: Option<ComputedPath>,
    tunnel: Option<TunnelResult>,
}

/// Runs `incident` to completion: detecting → ... → closed (spec §4.8).
///
/// Persists the incident record to `store` after every node (the
/// "write-last policy": a crash between a node finishing and this write
/// never commits the transition, since the in-memory status change and
/// the store write happen together here before the loop re-reads
/// `incident.status` to dispatch the next node).
///
/// # Errors
///
/// Returns [`CoreError::Store`] if a persist fails (the incident remains
/// at its last successfully written state), or propagates a transport
/// failure from any collaborator.
pub async fn run_incident(
    store: &dyn IncidentStore,
    collaborators: &Collaborators<'_>,
    config: &OrchestratorConfig,
    cancel: &CancellationToken,
    incident: Incident,
) -> Result<Incident, CoreError> {
    persist(store, &incident).await?;
    let mut state = WorkflowState { incident, impact: None, path: None, tunnel: None };

    loop {
        if state.incident.status.is_terminal() {
            return Ok(state.incident);
        }
        state = step(store, collaborators, config, cancel, state).await?;
    }
}

/// Executes exactly one node for `state.incident.status`, persisting the
/// result before returning (spec §4.8's transition table, one row per
/// match arm below).
async fn step(
    store: &dyn IncidentStore,
    collaborators: &Collaborators<'_>,
    config: &OrchestratorConfig,
    cancel: &CancellationToken,
    mut state: WorkflowState,
) -> Result<WorkflowState, CoreError> {
    let node_result = match state.incident.status {
        IncidentStatus::Detecting => detect(store, &mut state.incident).await,
        IncidentStatus::Dampening => {
            dampen(&mut state.incident, config, cancel).await;
            Ok(())
        }
        IncidentStatus::Assessing => assess(collaborators, &mut state).await,
        IncidentStatus::Computing => compute(collaborators, &mut state).await,
        IncidentStatus::Provisioning => provision(collaborators, store, config, cancel, &mut state).await,
        IncidentStatus::Steering => steer(collaborators, config, cancel, &mut state).await,
        IncidentStatus::Monitoring => monitor(collaborators, store, config, cancel, &mut state).await,
        IncidentStatus::Restoring => {
            // `monitor` transitions straight through `Restoring` into
            // `Closed` once cutover and cleanup both succeed; this state
            // is never dispatched on its own.
            Ok(())
        }
        IncidentStatus::Escalated => escalate_close(collaborators, &mut state.incident).await,
        IncidentStatus::Closed => Ok(()),
    };

    if let Err(err) = node_result {
        capture_node_failure(&mut state.incident, err);
    }

    persist(store, &state.incident).await?;
    Ok(state)
}

/// Captures a node-level failure into the incident record (spec §7: "a
/// thrown error inside a node is captured, written to the incident
/// record's `error_message`") and routes to `Escalated`. If the failure
/// happened while already escalating — the terminal notification/audit
/// pair for a *previous* escalation itself failed — forces a close
/// instead of re-escalating, so a persistently failing sink can't spin
/// the state machine forever.
fn capture_node_failure(incident: &mut Incident, err: CoreError) {
    let now = Utc::now();
    incident.error_message = Some(err.to_string());
    if incident.status == IncidentStatus::Escalated {
        incident.close(CloseReason::Escalated, now);
    } else {
        escalate(incident, err.escalation_reason(), now);
    }
}

async fn persist(store: &dyn IncidentStore, incident: &Incident) -> Result<(), CoreError> {
    let value = serde_json::to_value(incident).expect("Incident serializes without error: every field is a plain serde type");
    store.set_json(&keys::incident(incident.id.as_ref()), &value, None).await?;
    Ok(())
}

fn node_error(node: &str, err: impl Into<CoreError>) -> CoreError {
    CoreError::Orchestrator(OrchestratorError::NodeFailed { node: node.to_string(), source: Box::new(err.into()) })
}

/// `detecting`: re-checks whether the incident's primary degraded link is
/// still flapping. Flapping routes to `dampening`; stable routes to
/// `assessing` (spec §4.8).
async fn detect(store: &dyn IncidentStore, incident: &mut Incident) -> Result<(), CoreError> {
    let now = Utc::now();
    let Some(link) = incident.degraded_links.first() else {
        incident.visit_node("assess", IncidentStatus::Assessing, now);
        return Ok(());
    };

    let flap_state = flap::check_flapping(store, link, now).await?;
    if flap_state.is_flapping {
        incident.dampen_attempt = incident.dampen_attempt.saturating_add(1);
        incident.visit_node("dampen", IncidentStatus::Dampening, now);
    } else {
        incident.visit_node("assess", IncidentStatus::Assessing, now);
    }
    Ok(())
}

/// `dampening`: waits the backoff for the current `dampen_attempt`, then
/// always returns to `detecting` for a re-check (spec §4.8).
async fn dampen(incident: &mut Incident, config: &OrchestratorConfig, cancel: &CancellationToken) {
    let index = usize::from(incident.dampen_attempt.saturating_sub(1)).min(config.dampen_backoff_seconds.len() - 1);
    let backoff = Duration::from_secs(config.dampen_backoff_seconds[index]);

    tokio::select! {
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(backoff) => {}
    }

    incident.visit_node("detect", IncidentStatus::Detecting, Utc::now());
}

/// `assessing`: queries Service Impact for the degraded links. Zero
/// affected services closes the incident outright; otherwise the
/// highest-priority service and a cutover strategy are recorded and the
/// run advances to `computing` (spec §4.8, §4.4).
async fn assess(collaborators: &Collaborators<'_>, state: &mut WorkflowState) -> Result<(), CoreError> {
    let now = Utc::now();
    let impact = assess_impact(collaborators.service_health, state.incident.id.clone(), &state.incident.degraded_links)
        .await
        .map_err(|e| node_error("assess", e))?;

    if impact.total_affected == 0 {
        return close(
            collaborators,
            &mut state.incident,
            CloseReason::NoServicesAffected,
            EventType::NoImpactClose,
            "no services affected by the degraded links",
            json!({}),
            now,
        )
        .await;
    }

    let primary = impact.affected_services.first().expect("total_affected > 0 implies a first affected service");
    state.incident.primary_service = Some(primary.service_id.clone());
    state.incident.cutover_mode = Some(cutover_mode_for(primary.sla_tier));
    state.impact = Some(impact);
    state.incident.visit_node("compute", IncidentStatus::Computing, now);
    Ok(())
}

/// Premium tiers step down gradually so a borderline recovery doesn't
/// bounce traffic back and forth; lower tiers cut back immediately since
/// a brief reconvergence blip is within their SLA.
fn cutover_mode_for(tier: SlaTier) -> CutoverMode {
    if tier >= SlaTier::Gold {
        CutoverMode::Gradual
    } else {
        CutoverMode::Immediate
    }
}

/// `computing`: asks Path Computer for a protection path between the
/// primary affected service's endpoints. No path after full relaxation
/// escalates with `no-alternate-path` (spec §4.8, §4.4).
async fn compute(collaborators: &Collaborators<'_>, state: &mut WorkflowState) -> Result<(), CoreError> {
    let now = Utc::now();
    let impact = state.impact.as_ref().expect("computing is only reached after assess populates impact");
    let primary = impact.affected_services.first().expect("computing is only reached with a non-empty affected_services");

    let source = NodeId::try_new(primary.endpoint_a.clone()).map_err(|_| CoreError::LogicExhaustion { reason: EscalationReason::ConflictingConstraints })?;
    let destination = NodeId::try_new(primary.endpoint_z.clone()).map_err(|_| CoreError::LogicExhaustion { reason: EscalationReason::ConflictingConstraints })?;

    let found = compute_protected_path(
        collaborators.path_query,
        &source,
        &destination,
        state.incident.degraded_links.clone(),
        primary.current_te_type,
        None,
        None,
    )
    .await
    .map_err(|e| node_error("compute", e))?;

    match found {
        Some(path) => {
            state.path = Some(path);
            state.incident.visit_node("provision", IncidentStatus::Provisioning, now);
        }
        None => escalate(&mut state.incident, EscalationReason::NoAlternatePath, now),
    }
    Ok(())
}

/// `provisioning`: asks Tunnel Provisioner to create the protection
/// tunnel along the computed path. Success advances to `steering`;
/// failure retries up to `max_provisioning_retries` before escalating
/// with `tunnel-provision-failed-3x` (spec §4.8, §4.5).
async fn provision(
    collaborators: &Collaborators<'_>,
    store: &dyn IncidentStore,
    config: &OrchestratorConfig,
    cancel: &CancellationToken,
    state: &mut WorkflowState,
) -> Result<(), CoreError> {
    let now = Utc::now();
    let path = state.path.clone().expect("provisioning is only reached after compute populates path");

    let result = provision_tunnel(
        collaborators.tunnel_controller,
        store,
        state.incident.id.as_ref(),
        Some(path.recommended_te_type),
        path.source.clone(),
        path.destination.clone(),
        Some(path.segments.clone()),
        PathType::Explicit,
        config.tunnel_verify_poll_interval,
        config.tunnel_verify_max_attempts,
    )
    .await
    .map_err(|e| node_error("provision", e))?;

    if result.success {
        state.incident.protection_tunnel_id = result.tunnel_id;
        state.incident.protection_head_end = Some(path.source.clone());
        state.incident.protection_binding_sid = result.binding.clone();
        state.incident.retry_count = 0;
        state.tunnel = Some(result);
        state.incident.visit_node("steer", IncidentStatus::Steering, now);
        return Ok(());
    }

    state.incident.error_message = result.error;
    retry_or_escalate(&mut state.incident, config, cancel, "provision", IncidentStatus::Provisioning).await;
    Ok(())
}

/// `steering`: confirms the protection tunnel is actively steering
/// traffic. A negative confirmation is treated the same as a failed
/// provisioning attempt (spec §4.8 "steering | activation failed |
/// provisioning (retry)").
async fn steer(collaborators: &Collaborators<'_>, config: &OrchestratorConfig, cancel: &CancellationToken, state: &mut WorkflowState) -> Result<(), CoreError> {
    let now = Utc::now();
    let tunnel_id = state.incident.protection_tunnel_id.expect("steering is only reached after provision records a tunnel id");

    let status = collaborators.tunnel_controller.verify_tunnel(tunnel_id).await.map_err(|e| node_error("steer", e))?;

    if status == OperationalStatus::Up {
        let detail = json!({"tunnel_id": tunnel_id.to_string()});
        send_notification(collaborators.notifications, state.incident.id.clone(), EventType::ProtectionActivated, "traffic steered onto protection tunnel", detail, now)
            .await
            .map_err(|e| node_error("steer", e))?;
        state.incident.visit_node("monitor", IncidentStatus::Monitoring, now);
        return Ok(());
    }

    retry_or_escalate(&mut state.incident, config, cancel, "steer", IncidentStatus::Provisioning).await;
    Ok(())
}

/// Shared retry/escalate policy for `provisioning` and `steering`: counts
/// against the same `retry_count` and `max_provisioning_retries` budget
/// (spec §4.8 treats both failure edges identically).
async fn retry_or_escalate(incident: &mut Incident, config: &OrchestratorConfig, cancel: &CancellationToken, node: &str, retry_status: IncidentStatus) {
    incident.retry_count = incident.retry_count.saturating_add(1);

    if incident.retry_count >= config.max_provisioning_retries {
        escalate(incident, EscalationReason::TunnelProvisionFailed3x, Utc::now());
        return;
    }

    tokio::select! {
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(config.provisioning_retry_backoff) => {}
    }
    incident.visit_node(&format!("retry-{node}"), retry_status, Utc::now());
}

/// `monitoring`: hands off to Restoration Monitor, which owns its own
/// POLL/CHECK/WAIT/VERIFY/CUTOVER/CLEANUP sub-loop (spec §4.6, §4.7) and
/// blocks until the original path is restored or the poll cap is hit.
/// Success visits `restoring` then closes; failure escalates with
/// `restoration-timeout` (spec §4.8).
async fn monitor(
    collaborators: &Collaborators<'_>,
    store: &dyn IncidentStore,
    config: &OrchestratorConfig,
    cancel: &CancellationToken,
    state: &mut WorkflowState,
) -> Result<(), CoreError> {
    let now = Utc::now();
    let path = state.path.clone().expect("monitoring is only reached after compute populates path");
    let tunnel = state.tunnel.clone().expect("monitoring is only reached after provision populates tunnel");
    let impact = state.impact.as_ref().expect("monitoring is only reached after assess populates impact");
    let primary = impact.affected_services.first().expect("monitoring is only reached with a non-empty affected_services");

    let endpoints = PathEndpoints { source: path.source.clone(), destination: path.destination.clone() };
    let outcome: RestorationOutcome = monitor_restoration(
        collaborators.sla_probe,
        collaborators.traffic_weights,
        collaborators.tunnel_controller,
        store,
        cancel,
        state.incident.id.as_ref(),
        endpoints,
        primary.sla_tier,
        state.incident.cutover_mode.unwrap_or(CutoverMode::Immediate),
        state.incident.protection_head_end.clone().expect("steering recorded a protection head-end"),
        tunnel.tunnel_id.expect("a successful provision always records a tunnel id"),
        tunnel.binding.expect("a successful provision always records a binding identifier"),
        now,
        config.restoration_poll_interval,
        config.restoration_max_poll_attempts,
    )
    .await
    .map_err(|e| node_error("monitor", e))?;

    if outcome.restored {
        state.incident.visit_node("restore", IncidentStatus::Restoring, Utc::now());
        let detail = json!({"total_protection_duration_seconds": outcome.total_protection_duration_seconds});
        return close(
            collaborators,
            &mut state.incident,
            CloseReason::CutoverComplete,
            EventType::RestorationComplete,
            "original path restored and protection tunnel removed",
            detail,
            Utc::now(),
        )
        .await;
    }

    escalate(&mut state.incident, EscalationReason::RestorationTimeout, Utc::now());
    Ok(())
}

/// `escalated`: always emits exactly one notification and one audit entry
/// before closing (spec §7), regardless of which prior node escalated.
async fn escalate_close(collaborators: &Collaborators<'_>, incident: &mut Incident) -> Result<(), CoreError> {
    let now = Utc::now();
    let reason = incident.escalation_reason.map_or("unknown", EscalationReason::as_str);
    let detail = json!({"escalation_reason": reason});
    close(collaborators, incident, CloseReason::Escalated, EventType::Escalated, "incident escalated", detail, now).await
}

fn escalate(incident: &mut Incident, reason: EscalationReason, now: DateTime<Utc>) {
    incident.escalate(reason, now);
}

/// Emits the terminal notification and audit entry, then closes the
/// incident (spec §7: "every terminal state emits exactly one
/// `send_notification` and one `log_event` before closing"). Delivery
/// failures on either sink are logged and discarded rather than halting
/// the transition: notification/audit delivery is not one of spec §7's
/// transition-halting error kinds, so a flaky sink must never keep an
/// incident from reaching its terminal state.
async fn close(collaborators: &Collaborators<'_>, incident: &mut Incident, reason: CloseReason, event: EventType, summary: &str, detail: Value, now: DateTime<Utc>) -> Result<(), CoreError> {
    if let Err(err) = send_notification(collaborators.notifications, incident.id.clone(), event, summary.to_string(), detail.clone(), now).await {
        warn!(incident_id = %incident.id, error = %err, "notification delivery failed while closing incident; continuing");
    }
    if let Err(err) = log_event(collaborators.audit, incident.id.clone(), event, detail, now).await {
        warn!(incident_id = %incident.id, error = %err, "audit log append failed while closing incident; continuing");
    }
    incident.close(reason, now);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_types::{AlertId, AlertType, CorrelationId, IncidentId, LinkId, Severity, TeType, TunnelId, Weight};
    use crate::notification::{AuditEntry, Notification};
    use crate::path_computer::PathConstraints;
    use crate::restoration::SlaSample;
    use crate::service_impact::{ServiceDetails, ServiceEndpoint, ServiceType};
    use crate::store::SqliteIncidentStore;
    use crate::tunnel::TunnelConfig;
    use async_trait::async_trait;
    use dashmap::DashMap;
    use std::sync::Mutex;

    fn node(name: &str) -> NodeId {
        NodeId::try_new(name.to_string()).unwrap()
    }

    fn sample_incident(degraded_links: Vec<&str>, now: DateTime<Utc>) -> Incident {
        Incident::new(
            IncidentId::generate(now),
            degraded_links.into_iter().map(|l| LinkId::try_new(l.to_string()).unwrap()).collect(),
            Severity::Major,
            AlertType::ReactiveSla,
            vec![AlertId::try_new("alert-1".to_string()).unwrap()],
            CorrelationId::generate(),
            now,
        )
    }

    struct FakeServiceHealth {
        services: Vec<ServiceDetails>,
    }

    #[async_trait]
    impl ServiceHealthSource for FakeServiceHealth {
        async fn services_by_link(&self, _link_id: &LinkId) -> Result<Vec<ServiceDetails>, crate::error::A2aError> {
            Ok(self.services.clone())
        }
    }

    fn endpoint(name: &str) -> ServiceEndpoint {
        ServiceEndpoint { device_name: name.to_string(), device_ip: "10.0.0.1".to_string(), interface_name: "Gi0/0/0".to_string(), vrf_name: None, vlan_id: None }
    }

    fn one_service(tier: SlaTier, path: &[&str]) -> ServiceDetails {
        ServiceDetails {
            service_id: "svc-1".to_string(),
            service_name: "svc-1-name".to_string(),
            service_type: ServiceType::L3vpn,
            endpoint_a: endpoint("PE-SJ"),
            endpoint_z: endpoint("PE-NY"),
            customer_id: "cust-1".to_string(),
            customer_name: "Acme".to_string(),
            sla_tier: tier,
            current_te_type: TeType::SrMpls,
            current_path: path.iter().map(|l| LinkId::try_new((*l).to_string()).unwrap()).collect(),
            redundancy_available: false,
        }
    }

    struct FakePathQuery {
        path: Option<ComputedPath>,
    }

    #[async_trait]
    impl PathQuerySource for FakePathQuery {
        async fn compute_path(&self, _source: &NodeId, _destination: &NodeId, _constraints: &PathConstraints) -> Result<Option<ComputedPath>, crate::error::A2aError> {
            Ok(self.path.clone())
        }
    }

    fn a_path() -> ComputedPath {
        ComputedPath {
            path_id: "path-1".to_string(),
            source: node("PE-SJ"),
            destination: node("PE-NY"),
            segments: vec![node("PE-SJ"), node("PE-NY")],
            segment_sids: vec!["16001".to_string(), "16002".to_string()],
            total_hops: 1,
            total_delay_ms: Some(5.0),
            total_igp_metric: Some(10.0),
            total_te_metric: None,
            min_available_bandwidth_gbps: Some(10.0),
            recommended_te_type: TeType::SrMpls,
            constraints_relaxed: false,
            relaxation_level: crate::domain_types::RelaxationLevel::strict(),
        }
    }

    struct FakeTunnelController {
        create_results: Mutex<Vec<Result<TunnelId, String>>>,
        verify_results: Mutex<Vec<OperationalStatus>>,
    }

    impl FakeTunnelController {
        fn always_succeeds() -> Self {
            Self { create_results: Mutex::new(vec![Ok(TunnelId::generate())]), verify_results: Mutex::new(vec![OperationalStatus::Up]) }
        }

        fn always_fails() -> Self {
            Self {
                create_results: Mutex::new(vec![Err("create failed".to_string()); 10]),
                verify_results: Mutex::new(vec![OperationalStatus::Down; 10]),
            }
        }
    }

    #[async_trait]
    impl TunnelControllerSource for FakeTunnelController {
        async fn create_tunnel(&self, _config: &TunnelConfig) -> Result<TunnelId, crate::error::A2aError> {
            let mut results = self.create_results.lock().unwrap();
            match if results.len() > 1 { results.remove(0) } else { results.first().cloned().unwrap_or_else(|| Ok(TunnelId::generate())) } {
                Ok(id) => Ok(id),
                Err(message) => Err(crate::error::A2aError::Downstream { agent: "tunnel-controller".to_string(), message }),
            }
        }

        async fn verify_tunnel(&self, _tunnel_id: TunnelId) -> Result<OperationalStatus, crate::error::A2aError> {
            let mut results = self.verify_results.lock().unwrap();
            Ok(if results.len() > 1 { results.remove(0) } else { results.first().copied().unwrap_or(OperationalStatus::Up) })
        }

        async fn delete_tunnel(&self, _tunnel_id: TunnelId) -> Result<(), crate::error::A2aError> {
            Ok(())
        }

        async fn device_capabilities(&self, _head_end: &NodeId) -> Result<Vec<TeType>, crate::error::A2aError> {
            Ok(vec![TeType::SrMpls])
        }
    }

    struct FakeSlaProbe {
        samples: Mutex<Vec<SlaSample>>,
    }

    impl FakeSlaProbe {
        fn always_good() -> Self {
            Self { samples: Mutex::new(vec![SlaSample { within_thresholds: true, latency_ms: Some(5.0), jitter_ms: Some(1.0), loss_ratio: Some(0.0) }]) }
        }
    }

    #[async_trait]
    impl SlaProbe for FakeSlaProbe {
        async fn sample(&self, _endpoints: &PathEndpoints, _sla_tier: SlaTier) -> Result<SlaSample, crate::error::A2aError> {
            let mut samples = self.samples.lock().unwrap();
            Ok(if samples.len() > 1 { samples.remove(0) } else { samples.first().copied().unwrap() })
        }
    }

    struct NoopWeights;

    #[async_trait]
    impl TrafficWeightController for NoopWeights {
        async fn set_weights(&self, _tunnel_id: TunnelId, _protection_weight: Weight, _original_weight: Weight) -> Result<(), crate::error::A2aError> {
            Ok(())
        }
    }

    struct RecordingSinks {
        notifications: DashMap<String, Vec<Notification>>,
        audit: DashMap<String, Vec<AuditEntry>>,
    }

    impl RecordingSinks {
        fn new() -> Self {
            Self { notifications: DashMap::new(), audit: DashMap::new() }
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSinks {
        async fn notify(&self, notification: Notification) -> Result<(), crate::error::A2aError> {
            self.notifications.entry(notification.incident_id.to_string()).or_default().push(notification);
            Ok(())
        }
    }

    #[async_trait]
    impl AuditSink for RecordingSinks {
        async fn log(&self, entry: AuditEntry) -> Result<(), crate::error::A2aError> {
            self.audit.entry(entry.incident_id.to_string()).or_default().push(entry);
            Ok(())
        }
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            dampen_backoff_seconds: [0, 0, 0, 0, 0],
            provisioning_retry_backoff: Duration::from_millis(1),
            max_provisioning_retries: 3,
            tunnel_verify_poll_interval: Duration::from_millis(1),
            tunnel_verify_max_attempts: 3,
            restoration_poll_interval: Duration::from_millis(1),
            restoration_max_poll_attempts: 5,
        }
    }

    #[tokio::test]
    async fn no_affected_services_closes_with_exactly_one_notification_and_audit_entry() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let service_health = FakeServiceHealth { services: vec![] };
        let path_query = FakePathQuery { path: None };
        let tunnel_controller = FakeTunnelController::always_succeeds();
        let sla_probe = FakeSlaProbe::always_good();
        let weights = NoopWeights;
        let sinks = RecordingSinks::new();
        let collaborators = Collaborators {
            service_health: &service_health,
            path_query: &path_query,
            tunnel_controller: &tunnel_controller,
            sla_probe: &sla_probe,
            traffic_weights: &weights,
            notifications: &sinks,
            audit: &sinks,
        };
        let cancel = CancellationToken::new();
        let incident = sample_incident(vec!["link-A"], Utc::now());
        let incident_id = incident.id.to_string();

        let result = run_incident(&store, &collaborators, &fast_config(), &cancel, incident).await.unwrap();

        assert_eq!(result.status, IncidentStatus::Closed);
        assert_eq!(result.close_reason, Some(CloseReason::NoServicesAffected));
        assert_eq!(result.nodes_visited.first().unwrap(), "detect");
        assert_eq!(result.nodes_visited.last().unwrap(), "close");
        assert_eq!(sinks.notifications.get(&incident_id).unwrap().len(), 1);
        assert_eq!(sinks.audit.get(&incident_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_path_found_escalates_with_no_alternate_path() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let service_health = FakeServiceHealth { services: vec![one_service(SlaTier::Gold, &["link-A"])] };
        let path_query = FakePathQuery { path: None };
        let tunnel_controller = FakeTunnelController::always_succeeds();
        let sla_probe = FakeSlaProbe::always_good();
        let weights = NoopWeights;
        let sinks = RecordingSinks::new();
        let collaborators = Collaborators {
            service_health: &service_health,
            path_query: &path_query,
            tunnel_controller: &tunnel_controller,
            sla_probe: &sla_probe,
            traffic_weights: &weights,
            notifications: &sinks,
            audit: &sinks,
        };
        let cancel = CancellationToken::new();
        let incident = sample_incident(vec!["link-A"], Utc::now());

        let result = run_incident(&store, &collaborators, &fast_config(), &cancel, incident).await.unwrap();

        assert_eq!(result.status, IncidentStatus::Closed);
        assert_eq!(result.close_reason, Some(CloseReason::Escalated));
        assert_eq!(result.escalation_reason, Some(EscalationReason::NoAlternatePath));
    }

    #[tokio::test]
    async fn provisioning_failure_three_times_escalates_tunnel_provision_failed() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let service_health = FakeServiceHealth { services: vec![one_service(SlaTier::Silver, &["link-A"])] };
        let path_query = FakePathQuery { path: Some(a_path()) };
        let tunnel_controller = FakeTunnelController::always_fails();
        let sla_probe = FakeSlaProbe::always_good();
        let weights = NoopWeights;
        let sinks = RecordingSinks::new();
        let collaborators = Collaborators {
            service_health: &service_health,
            path_query: &path_query,
            tunnel_controller: &tunnel_controller,
            sla_probe: &sla_probe,
            traffic_weights: &weights,
            notifications: &sinks,
            audit: &sinks,
        };
        let cancel = CancellationToken::new();
        let incident = sample_incident(vec!["link-A"], Utc::now());

        let result = run_incident(&store, &collaborators, &fast_config(), &cancel, incident).await.unwrap();

        assert_eq!(result.status, IncidentStatus::Closed);
        assert_eq!(result.escalation_reason, Some(EscalationReason::TunnelProvisionFailed3x));
        assert_eq!(result.retry_count, 3);
    }

    // Paused time: the hold timer and stability checks below are driven by
    // real per-tier durations (minutes), and only `tokio::time::sleep` stands
    // between them, so a paused clock auto-advances instead of the test
    // actually waiting out the tier's hold timer.
    #[tokio::test(start_paused = true)]
    async fn full_happy_path_restores_and_closes_with_cutover_complete() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let service_health = FakeServiceHealth { services: vec![one_service(SlaTier::Silver, &["link-A"])] };
        let path_query = FakePathQuery { path: Some(a_path()) };
        let tunnel_controller = FakeTunnelController::always_succeeds();
        let sla_probe = FakeSlaProbe::always_good();
        let weights = NoopWeights;
        let sinks = RecordingSinks::new();
        let collaborators = Collaborators {
            service_health: &service_health,
            path_query: &path_query,
            tunnel_controller: &tunnel_controller,
            sla_probe: &sla_probe,
            traffic_weights: &weights,
            notifications: &sinks,
            audit: &sinks,
        };
        let cancel = CancellationToken::new();
        let incident = sample_incident(vec!["link-A"], Utc::now());
        let incident_id = incident.id.to_string();

        let result = run_incident(&store, &collaborators, &fast_config(), &cancel, incident).await.unwrap();

        assert_eq!(result.status, IncidentStatus::Closed);
        assert_eq!(result.close_reason, Some(CloseReason::CutoverComplete));
        assert!(result.nodes_visited.contains(&"provision".to_string()));
        assert!(result.nodes_visited.contains(&"steer".to_string()));
        assert!(result.nodes_visited.contains(&"monitor".to_string()));
        assert!(result.nodes_visited.contains(&"restore".to_string()));
        // Immediate cutover for a Silver-tier service (spec-derived policy).
        assert_eq!(result.cutover_mode, Some(CutoverMode::Immediate));
        // Exactly one notification/audit pair for the terminal close, plus
        // the non-terminal `ProtectionActivated` notification from steering.
        assert_eq!(sinks.notifications.get(&incident_id).unwrap().len(), 2);
        assert_eq!(sinks.audit.get(&incident_id).unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gold_tier_service_selects_gradual_cutover() {
        let store = SqliteIncidentStore::in_memory().await.unwrap();
        let service_health = FakeServiceHealth { services: vec![one_service(SlaTier::Gold, &["link-A"])] };
        let path_query = FakePathQuery { path: Some(a_path()) };
        let tunnel_controller = FakeTunnelController::always_succeeds();
        let sla_probe = FakeSlaProbe::always_good();
        let weights = NoopWeights;
        let sinks = RecordingSinks::new();
        let collaborators = Collaborators {
            service_health: &service_health,
            path_query: &path_query,
            tunnel_controller: &tunnel_controller,
            sla_probe: &sla_probe,
            traffic_weights: &weights,
            notifications: &sinks,
            audit: &sinks,
        };
        let cancel = CancellationToken::new();
        let incident = sample_incident(vec!["link-A"], Utc::now());

        let result = run_incident(&store, &collaborators, &fast_config(), &cancel, incident).await.unwrap();

        assert_eq!(result.cutover_mode, Some(CutoverMode::Gradual));
        assert_eq!(result.close_reason, Some(CloseReason::CutoverComplete));
    }
}
