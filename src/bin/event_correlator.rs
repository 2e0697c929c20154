//! Event Correlator agent process (spec §4.3): normalizes, dedupes,
//! correlates, and flap-detects inbound alerts, then hands a freshly
//! correlated incident off to the Orchestrator over A2A.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use netprotect::a2a::{build_router, serve_with_graceful_shutdown, A2aClient, AgentRegistry, ServerConfig, TaskHandler, TaskRequest};
use netprotect::config::AgentConfig;
use netprotect::correlator::{correlate_alert, CorrelationOutcome};
use netprotect::domain_types::{CorrelationId, IncidentId, Priority, TaskId};
use netprotect::incident::Incident;
use netprotect::observability::init_tracing;
use netprotect::store::{DegradedModeStore, IncidentStore, SqliteIncidentStore};
use serde_json::{json, Value};
use tracing::warn;

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
        if task_type != "correlate_alert" {
            return Err(format!("unsupported task type: {task_type}"));
        }

        let source = payload.get("source").and_then(Value::as_str).ok_or("payload missing \"source\"")?;
        let raw_alert = payload.get("raw_alert").ok_or("payload missing \"raw_alert\"")?;

        let outcome = correlate_alert(self.store.as_ref(), source, raw_alert).await.map_err(|e| e.to_string())?;
        self.forward_to_orchestrator(&outcome).await;
        Ok(outcome_to_json(&outcome))
    }
}

impl Handler {
    /// Mints a fresh incident and fires it to the Orchestrator's
    /// `run_incident` task, fire-and-forget (spec §2 "emits an Incident to
    /// the Orchestrator"). A suppressed or discarded outcome never reaches
    /// the orchestrator.
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
            correlated_alerts
                .iter()
                .filter_map(|a| netprotect::domain_types::AlertId::try_new(a.clone()).ok())
                .collect(),
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
            warn!(incident_id = %incident.id, error = %err, "failed to hand incident off to orchestrator");
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
    init_tracing("event_correlator");

    let store: Arc<dyn IncidentStore> =
        Arc::new(DegradedModeStore::new(SqliteIncidentStore::connect(&config.store_path.to_string_lossy()).await?));
    let registry = match &config.agent_registry {
        Some(path) => AgentRegistry::load_from_file(path)?,
        None => AgentRegistry::new(),
    };
    let a2a = A2aClient::new(registry, std::time::Duration::from_secs(config.default_timeout_secs));

    let handler = Arc::new(Handler { store, a2a });
    let server_config = ServerConfig {
        agent_name: "event_correlator".to_string(),
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Normalizes, dedupes, correlates, and flap-detects inbound alerts".to_string(),
        supported_task_types: vec!["correlate_alert".to_string()],
        capabilities: vec![],
        tags: vec!["correlation".to_string()],
    };

    let router = build_router(server_config, handler);
    let shutdown = netprotect::runtime::shutdown_token();
    serve_with_graceful_shutdown(config.socket_addr()?, router, shutdown, std::time::Duration::from_secs(config.shutdown_grace_secs))
        .await?;
    Ok(())
}
