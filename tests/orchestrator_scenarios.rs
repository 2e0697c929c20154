//! End-to-end orchestrator scenarios driven entirely through the crate's
//! public API against an in-memory store, matching the concrete scenarios
//! named alongside the testable properties: no-impact close, provision
//! retry then escalate, and gradual cutover with mid-stage SLA regression.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use netprotect::domain_types::{AlertId, AlertType, CorrelationId, CutoverMode, EscalationReason, IncidentId, LinkId, NodeId, Severity, SlaTier, TeType, TunnelId, Weight};
use netprotect::error::A2aError;
use netprotect::incident::{CloseReason, Incident, IncidentStatus};
use netprotect::notification::{AuditEntry, AuditSink, Notification, NotificationSink};
use netprotect::orchestrator::{run_incident, Collaborators, OrchestratorConfig};
use netprotect::path_computer::{ComputedPath, PathConstraints, PathQuerySource};
use netprotect::restoration::{PathEndpoints, SlaProbe, SlaSample, TrafficWeightController};
use netprotect::service_impact::{ServiceDetails, ServiceEndpoint, ServiceHealthSource, ServiceType};
use netprotect::store::SqliteIncidentStore;
use netprotect::tunnel::{OperationalStatus, TunnelConfig, TunnelControllerSource};

fn node(name: &str) -> NodeId {
    NodeId::try_new(name.to_string()).unwrap()
}

fn link(name: &str) -> LinkId {
    LinkId::try_new(name.to_string()).unwrap()
}

fn sample_incident(degraded_links: &[&str]) -> Incident {
    let now = Utc::now();
    Incident::new(
        IncidentId::generate(now),
        degraded_links.iter().map(|l| link(l)).collect(),
        Severity::Major,
        AlertType::ReactiveSla,
        vec![AlertId::try_new("alert-1".to_string()).unwrap()],
        CorrelationId::generate(),
        now,
    )
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
        current_path: path.iter().map(|l| link(l)).collect(),
        redundancy_available: false,
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
        relaxation_level: netprotect::domain_types::RelaxationLevel::strict(),
    }
}

struct FixedServiceHealth {
    services: Vec<ServiceDetails>,
}

#[async_trait]
impl ServiceHealthSource for FixedServiceHealth {
    async fn services_by_link(&self, _link_id: &LinkId) -> Result<Vec<ServiceDetails>, A2aError> {
        Ok(self.services.clone())
    }
}

struct FixedPathQuery {
    path: Option<ComputedPath>,
}

#[async_trait]
impl PathQuerySource for FixedPathQuery {
    async fn compute_path(&self, _source: &NodeId, _destination: &NodeId, _constraints: &PathConstraints) -> Result<Option<ComputedPath>, A2aError> {
        Ok(self.path.clone())
    }
}

/// A controller whose `create_tunnel` can be scripted to fail a fixed
/// number of times before succeeding, or always succeed/fail.
struct ScriptedController {
    create_results: Mutex<Vec<Result<TunnelId, String>>>,
}

impl ScriptedController {
    fn always_succeeds() -> Self {
        Self { create_results: Mutex::new(vec![Ok(TunnelId::generate())]) }
    }

    fn always_fails() -> Self {
        Self { create_results: Mutex::new(vec![Err("create failed".to_string()); 10]) }
    }
}

#[async_trait]
impl TunnelControllerSource for ScriptedController {
    async fn create_tunnel(&self, _config: &TunnelConfig) -> Result<TunnelId, A2aError> {
        let mut results = self.create_results.lock().unwrap();
        let next = if results.len() > 1 { results.remove(0) } else { results.first().cloned().unwrap_or_else(|| Ok(TunnelId::generate())) };
        next.map_err(|message| A2aError::Downstream { agent: "tunnel-controller".to_string(), message })
    }

    async fn verify_tunnel(&self, _tunnel_id: TunnelId) -> Result<OperationalStatus, A2aError> {
        Ok(OperationalStatus::Up)
    }

    async fn delete_tunnel(&self, _tunnel_id: TunnelId) -> Result<(), A2aError> {
        Ok(())
    }

    async fn device_capabilities(&self, _head_end: &NodeId) -> Result<Vec<TeType>, A2aError> {
        Ok(vec![TeType::SrMpls])
    }
}

/// An SLA probe that reports good samples until a configured call index,
/// then reports a regression for exactly one call before recovering,
/// modeling scenario (e)'s mid-cutover SLA dip.
struct RegressingProbe {
    call_count: Mutex<u32>,
    regress_on_call: u32,
}

fn good_sample() -> SlaSample {
    SlaSample { within_thresholds: true, latency_ms: Some(5.0), jitter_ms: Some(1.0), loss_ratio: Some(0.0) }
}

fn bad_sample() -> SlaSample {
    SlaSample { within_thresholds: false, latency_ms: Some(500.0), jitter_ms: Some(50.0), loss_ratio: Some(0.1) }
}

#[async_trait]
impl SlaProbe for RegressingProbe {
    async fn sample(&self, _endpoints: &PathEndpoints, _sla_tier: SlaTier) -> Result<SlaSample, A2aError> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;
        Ok(if *count == self.regress_on_call { bad_sample() } else { good_sample() })
    }
}

struct RecordingWeights {
    applied: Mutex<Vec<(Weight, Weight)>>,
}

impl RecordingWeights {
    fn new() -> Self {
        Self { applied: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl TrafficWeightController for RecordingWeights {
    async fn set_weights(&self, _tunnel_id: TunnelId, protection_weight: Weight, original_weight: Weight) -> Result<(), A2aError> {
        self.applied.lock().unwrap().push((protection_weight, original_weight));
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
    async fn notify(&self, notification: Notification) -> Result<(), A2aError> {
        self.notifications.entry(notification.incident_id.to_string()).or_default().push(notification);
        Ok(())
    }
}

#[async_trait]
impl AuditSink for RecordingSinks {
    async fn log(&self, entry: AuditEntry) -> Result<(), A2aError> {
        self.audit.entry(entry.incident_id.to_string()).or_default().push(entry);
        Ok(())
    }
}

/// Scenario (b): Service Impact reports zero affected services, so the
/// incident closes immediately with no tunnel provisioned and exactly one
/// notification.
#[tokio::test]
async fn no_impact_closes_without_provisioning() {
    let store = SqliteIncidentStore::in_memory().await.unwrap();
    let service_health = FixedServiceHealth { services: vec![] };
    let path_query = FixedPathQuery { path: None };
    let tunnel_controller = ScriptedController::always_succeeds();
    let sla_probe = RegressingProbe { call_count: Mutex::new(0), regress_on_call: u32::MAX };
    let weights = RecordingWeights::new();
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

    let incident = sample_incident(&["link-B"]);
    let incident_id = incident.id.to_string();
    let cancel = CancellationToken::new();

    let result = run_incident(&store, &collaborators, &fast_config(), &cancel, incident).await.unwrap();

    assert_eq!(result.status, IncidentStatus::Closed);
    assert_eq!(result.close_reason, Some(CloseReason::NoServicesAffected));
    assert!(result.protection_tunnel_id.is_none());
    assert_eq!(sinks.notifications.get(&incident_id).unwrap().len(), 1);
    assert_eq!(sinks.audit.get(&incident_id).unwrap().len(), 1);
}

/// Scenario (d): the tunnel controller fails three consecutive times, so
/// the incident escalates with `tunnel_provision_failed_3x` and emits
/// exactly one closure notification and audit event.
#[tokio::test]
async fn repeated_provisioning_failure_escalates_after_three_attempts() {
    let store = SqliteIncidentStore::in_memory().await.unwrap();
    let service_health = FixedServiceHealth { services: vec![one_service(SlaTier::Silver, &["link-A"])] };
    let path_query = FixedPathQuery { path: Some(a_path()) };
    let tunnel_controller = ScriptedController::always_fails();
    let sla_probe = RegressingProbe { call_count: Mutex::new(0), regress_on_call: u32::MAX };
    let weights = RecordingWeights::new();
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

    let incident = sample_incident(&["link-A"]);
    let incident_id = incident.id.to_string();
    let cancel = CancellationToken::new();

    let result = run_incident(&store, &collaborators, &fast_config(), &cancel, incident).await.unwrap();

    assert_eq!(result.status, IncidentStatus::Closed);
    assert_eq!(result.close_reason, Some(CloseReason::Escalated));
    assert_eq!(result.escalation_reason, Some(EscalationReason::TunnelProvisionFailed3x));
    assert_eq!(result.retry_count, 3);
    assert_eq!(sinks.notifications.get(&incident_id).unwrap().len(), 1);
    assert_eq!(sinks.audit.get(&incident_id).unwrap().len(), 1);
}

/// Scenario (e): a Gold-tier service selects gradual cutover; a regression
/// on the first stage transition rolls the weights back and restarts
/// monitoring from POLL rather than aborting the whole restoration, and the
/// run still reaches a successful close once the regression is a one-off.
///
/// Call order for one full (unregressed) pass through `monitor_restoration`
/// is fixed regardless of poll interval: 1 POLL sample, 1 WAIT sample (a
/// large poll interval collapses the hold timer to a single step), 3 VERIFY
/// samples, then 3 gradual-stage-transition samples — 8 total. Call #6 is
/// the first stage transition, so regressing there exercises the rollback
/// without having to simulate thousands of 1ms poll ticks against a real
/// per-tier hold timer.
#[tokio::test(start_paused = true)]
async fn gold_tier_gradual_cutover_survives_a_one_off_regression() {
    let store = SqliteIncidentStore::in_memory().await.unwrap();
    let service_health = FixedServiceHealth { services: vec![one_service(SlaTier::Gold, &["link-A"])] };
    let path_query = FixedPathQuery { path: Some(a_path()) };
    let tunnel_controller = ScriptedController::always_succeeds();
    let sla_probe = RegressingProbe { call_count: Mutex::new(0), regress_on_call: 6 };
    let weights = RecordingWeights::new();
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

    let incident = sample_incident(&["link-A"]);
    let cancel = CancellationToken::new();
    let config = OrchestratorConfig { restoration_poll_interval: Duration::from_secs(1_000_000), ..fast_config() };

    let result = run_incident(&store, &collaborators, &config, &cancel, incident).await.unwrap();

    assert_eq!(result.cutover_mode, Some(CutoverMode::Gradual));
    assert_eq!(result.status, IncidentStatus::Closed);
    assert_eq!(result.close_reason, Some(CloseReason::CutoverComplete));
    // The first stage's (75, 25) split is applied once on the initial pass
    // and a second time as the rollback after the regression; a run with no
    // regression would only ever apply it once.
    let applied = weights.applied.lock().unwrap();
    let first_stage_applications = applied.iter().filter(|(protection, original)| u8::from(*protection) == 75 && u8::from(*original) == 25).count();
    assert_eq!(first_stage_applications, 2);
    // The run still finishes at full cutover.
    assert_eq!(applied.last(), Some(&(Weight::zero(), Weight::full())));
}
