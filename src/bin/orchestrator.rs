//! Orchestrator agent process (spec §4.8): receives a freshly correlated
//! incident from the Event Correlator or Traffic Analytics and drives it
//! through the full protection lifecycle, calling out to every other
//! agent via HTTP collaborator adapters and A2A notification/audit sinks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use netprotect::a2a::{build_router, serve_with_graceful_shutdown, A2aClient, A2aAuditSink, A2aNotificationSink, AgentRegistry, ServerConfig, TaskHandler};
use netprotect::collaborators::{HttpPathQuerySource, HttpServiceHealthSource, HttpSlaProbe, HttpTunnelController};
use netprotect::config::{AgentConfig, CollaboratorConfig};
use netprotect::domain_types::{CorrelationId, IncidentId};
use netprotect::incident::Incident;
use netprotect::observability::init_tracing;
use netprotect::orchestrator::{run_incident, Collaborators, OrchestratorConfig};
use netprotect::path_computer::PathQuerySource;
use netprotect::restoration::{SlaProbe, TrafficWeightController};
use netprotect::service_impact::ServiceHealthSource;
use netprotect::store::{DegradedModeStore, IncidentStore, SqliteIncidentStore};
use netprotect::tunnel::TunnelControllerSource;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
struct Cli {
    #[command(flatten)]
    agent: AgentConfig,
    #[command(flatten)]
    collaborators: CollaboratorConfig,
}

struct Handler {
    store: Arc<dyn IncidentStore>,
    service_health: Arc<dyn ServiceHealthSource>,
    path_query: Arc<dyn PathQuerySource>,
    tunnel_controller: Arc<dyn TunnelControllerSource>,
    sla_probe: Arc<dyn SlaProbe>,
    traffic_weights: Arc<dyn TrafficWeightController>,
    notifications: A2aNotificationSink,
    audit: A2aAuditSink,
    config: OrchestratorConfig,
    cancel: CancellationToken,
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
        if task_type != "run_incident" {
            return Err(format!("unsupported task type: {task_type}"));
        }
        let incident: Incident = serde_json::from_value(payload).map_err(|e| e.to_string())?;

        let collaborators = Collaborators {
            service_health: self.service_health.as_ref(),
            path_query: self.path_query.as_ref(),
            tunnel_controller: self.tunnel_controller.as_ref(),
            sla_probe: self.sla_probe.as_ref(),
            traffic_weights: self.traffic_weights.as_ref(),
            notifications: &self.notifications,
            audit: &self.audit,
        };

        let finished = run_incident(self.store.as_ref(), &collaborators, &self.config, &self.cancel, incident)
            .await
            .map_err(|e| e.to_string())?;

        serde_json::to_value(finished).map_err(|e| e.to_string())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("orchestrator");

    let store: Arc<dyn IncidentStore> =
        Arc::new(DegradedModeStore::new(SqliteIncidentStore::connect(&cli.agent.store_path.to_string_lossy()).await?));

    let service_health: Arc<dyn ServiceHealthSource> = Arc::new(HttpServiceHealthSource::new(cli.collaborators.topology_url.clone()));
    let path_query: Arc<dyn PathQuerySource> = Arc::new(HttpPathQuerySource::new(cli.collaborators.topology_url.clone()));
    let tunnel_controller_impl = Arc::new(HttpTunnelController::new(cli.collaborators.controller_url.clone()));
    let traffic_weights: Arc<dyn TrafficWeightController> = tunnel_controller_impl.clone();
    let tunnel_controller: Arc<dyn TunnelControllerSource> = tunnel_controller_impl;
    let sla_probe: Arc<dyn SlaProbe> = Arc::new(HttpSlaProbe::new(cli.collaborators.measurement_url.clone()));

    let registry = match &cli.agent.agent_registry {
        Some(path) => AgentRegistry::load_from_file(path)?,
        None => AgentRegistry::new(),
    };
    let a2a = A2aClient::new(registry, Duration::from_secs(cli.agent.default_timeout_secs));
    let notifications = A2aNotificationSink::new(a2a.clone(), cli.agent.default_timeout_secs);
    let audit = A2aAuditSink::new(a2a, cli.agent.default_timeout_secs);

    let shutdown = netprotect::runtime::shutdown_token();

    let handler = Arc::new(Handler {
        store,
        service_health,
        path_query,
        tunnel_controller,
        sla_probe,
        traffic_weights,
        notifications,
        audit,
        config: OrchestratorConfig::default(),
        cancel: shutdown.clone(),
    });

    let server_config = ServerConfig {
        agent_name: "orchestrator".to_string(),
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Drives one incident through its full protection lifecycle".to_string(),
        supported_task_types: vec!["run_incident".to_string()],
        capabilities: vec![],
        tags: vec!["orchestration".to_string()],
    };

    let router = build_router(server_config, handler);
    serve_with_graceful_shutdown(
        cli.agent.socket_addr()?,
        router,
        shutdown,
        Duration::from_secs(cli.agent.shutdown_grace_secs),
    )
    .await?;
    Ok(())
}
