//! Traffic Analytics agent process (spec §4.3 "Proactive" branch): predicts
//! imminent congestion from traffic telemetry and feeds it into the same
//! correlation pipeline the Event Correlator's reactive branch uses, so a
//! predicted hotspot and a reactive alert about the same link converge on
//! one incident.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use netprotect::a2a::{build_router, serve_with_graceful_shutdown, A2aClient, AgentRegistry, ServerConfig, TaskHandler, TaskRequest};
use netprotect::config::AgentConfig;
use netprotect::correlator::{correlate_alert, CorrelationOutcome};
use netprotect::domain_types::{AlertId, CorrelationId, IncidentId, Priority, TaskId};
use netprotect::incident::Incident;
use netprotect::observability::init_tracing;
use netprotect::store::{DegradedModeStore, IncidentStore, SqliteIncidentStore};
use serde_json::{json, Value};
use tracing::warn;

/// The source tag `correlate_alert` records for predictions raised here,
/// distinguishing them from reactively-reported alerts in the correlation
/// trail while still sharing the same dedup/flap machinery.
const PREDICTION_SOURCE: &str = "proactive";

struct Handler {
    store: Arc<dyn IncidentStore>,
    a2a: A2aClient,
}

#[async_trait]
impl TaskHandler for Handler {
    async fn handle(
        &self,
        task_type: &str,
        _incident_id: Option<IncidentId>,
        _correlation_id: Option<CorrelationId>,
        payload: Value,
    ) -> Result<Value, String> {
        if task_type != "submit_prediction" {
            return Err(format!("unsupported task type: {task_type}"));
        }
        let predicted_alert = payload.get("predicted_alert").ok_or("payload missing \"predicted_alert\"")?;

        let outcome = correlate_alert(self.store.as_ref(), PREDICTION_SOURCE, predicted_alert).await.map_err(|e| e.to_string())?;
        self.forward_to_orchestrator(&outcome).await;
        Ok(outcome_to_json(&outcome))
    }
}

impl Handler {
    async fn forward_to_orchestrator(&self, outcome: &CorrelationOutcome) {
        let CorrelationOutcome::Correlated { incident_id, degraded_links, severity, alert_type, correlated_alerts, .. } = outcome
        else {
            return;
        };

        let incident = Incident::new(
            incident_id.clone(),
            degraded_links.clone(),
            *severity,
            *alert_type,
            correlated_alerts.iter().filter_map(|a| AlertId::try_new(a.clone()).ok()).collect(),
            CorrelationId::generate(),
            chrono::Utc::now(),
        );

        let request = TaskRequest {
            task_id: TaskId::generate(),
            task_type: "run_incident".to_string(),
            incident_id: Some(incident.id.clone()),
            correlation_id: Some(incident.correlation_id),
            payload: match serde_json::to_value(&incident) {
                Ok(value) => value,
                Err(err) => {
                    warn!(error = %err, "failed to serialize incident for orchestrator handoff");
                    return;
                }
            },
            priority: Priority::default(),
            timeout_seconds: 3600,
            callback_url: None,
        };

        if let Err(err) = self.a2a.send_task_async("orchestrator", &request).await {
            warn!(incident_id = %incident.id, error = %err, "failed to hand predicted incident off to orchestrator");
        }
    }
}

fn outcome_to_json(outcome: &CorrelationOutcome) -> Value {
    match outcome {
        CorrelationOutcome::Discarded { duplicate_of } => json!({"outcome": "discarded", "duplicate_of": duplicate_of}),
        CorrelationOutcome::Suppressed { link_id, dampen_seconds, incident_id } => {
            json!({"outcome": "suppressed", "link_id": link_id, "dampen_seconds": dampen_seconds, "incident_id": incident_id})
        }
        CorrelationOutcome::Correlated {
            incident_id,
            degraded_links,
            severity,
            alert_type,
            alert_count,
            correlated_alerts,
            correlation_rule,
            correlation_reason,
        } => json!({
            "outcome": "correlated",
            "incident_id": incident_id,
            "degraded_links": degraded_links,
            "severity": severity,
            "alert_type": alert_type,
            "alert_count": alert_count,
            "correlated_alerts": correlated_alerts,
            "correlation_rule": correlation_rule,
            "correlation_reason": correlation_reason,
        }),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AgentConfig::parse();
    init_tracing("traffic_analytics");

    let store: Arc<dyn IncidentStore> =
        Arc::new(DegradedModeStore::new(SqliteIncidentStore::connect(&config.store_path.to_string_lossy()).await?));
    let registry = match &config.agent_registry {
        Some(path) => AgentRegistry::load_from_file(path)?,
        None => AgentRegistry::new(),
    };
    let a2a = A2aClient::new(registry, std::time::Duration::from_secs(config.default_timeout_secs));

    let handler = Arc::new(Handler { store, a2a });
    let server_config = ServerConfig {
        agent_name: "traffic_analytics".to_string(),
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Predicts imminent congestion and feeds it into incident correlation".to_string(),
        supported_task_types: vec!["submit_prediction".to_string()],
        capabilities: vec![],
        tags: vec!["prediction".to_string()],
    };

    let router = build_router(server_config, handler);
    let shutdown = netprotect::runtime::shutdown_token();
    serve_with_graceful_shutdown(config.socket_addr()?, router, shutdown, std::time::Duration::from_secs(config.shutdown_grace_secs))
        .await?;
    Ok(())
}
