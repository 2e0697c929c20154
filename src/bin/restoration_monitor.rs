//! Restoration Monitor agent process (spec §4.6, §4.7): polls the original
//! path's SLA, runs the hold timer, and executes the cutover back off the
//! protection tunnel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use netprotect::a2a::{build_router, serve_with_graceful_shutdown, ServerConfig, TaskHandler};
use netprotect::collaborators::{HttpSlaProbe, HttpTunnelController};
use netprotect::config::{AgentConfig, CollaboratorConfig};
use netprotect::domain_types::{BindingIdentifier, CorrelationId, CutoverMode, IncidentId, NodeId, SlaTier, TunnelId};
use netprotect::observability::init_tracing;
use netprotect::restoration::{monitor_restoration, PathEndpoints, SlaProbe, TrafficWeightController};
use netprotect::store::{DegradedModeStore, IncidentStore, SqliteIncidentStore};
use netprotect::tunnel::TunnelControllerSource;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
struct Cli {
    #[command(flatten)]
    agent: AgentConfig,
    #[command(flatten)]
    collaborators: CollaboratorConfig,

    /// Spacing between SLA polls while waiting for recovery.
    #[arg(long, env = "NETPROTECT_RESTORATION_POLL_INTERVAL_SECS", default_value = "30")]
    poll_interval_secs: u64,

    /// Maximum polls before giving up on restoration.
    #[arg(long, env = "NETPROTECT_RESTORATION_MAX_POLL_ATTEMPTS", default_value = "100")]
    max_poll_attempts: u32,
}

#[derive(Deserialize)]
struct MonitorPayload {
    incident_id: String,
    protection_tunnel_id: TunnelId,
    original_path: PathEndpoints,
    sla_tier: SlaTier,
    cutover_mode: CutoverMode,
    protection_head_end: NodeId,
    protection_binding_sid: BindingIdentifier,
    tunnel_provisioned_at: chrono::DateTime<chrono::Utc>,
}

struct Handler {
    probe: Arc<dyn SlaProbe>,
    weights: Arc<dyn TrafficWeightController>,
    controller: Arc<dyn TunnelControllerSource>,
    store: Arc<dyn IncidentStore>,
    cancel: CancellationToken,
    poll_interval: Duration,
    max_poll_attempts: u32,
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
        if task_type != "monitor_restoration" {
            return Err(format!("unsupported task type: {task_type}"));
        }
        let request: MonitorPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;

        let outcome = monitor_restoration(
            self.probe.as_ref(),
            self.weights.as_ref(),
            self.controller.as_ref(),
            self.store.as_ref(),
            &self.cancel,
            &request.incident_id,
            request.original_path,
            request.sla_tier,
            request.cutover_mode,
            request.protection_head_end,
            request.protection_tunnel_id,
            request.protection_binding_sid,
            request.tunnel_provisioned_at,
            self.poll_interval,
            self.max_poll_attempts,
        )
        .await
        .map_err(|e| e.to_string())?;

        serde_json::to_value(outcome).map_err(|e| e.to_string())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("restoration_monitor");

    let probe: Arc<dyn SlaProbe> = Arc::new(HttpSlaProbe::new(cli.collaborators.measurement_url.clone()));
    let controller = Arc::new(HttpTunnelController::new(cli.collaborators.controller_url));
    let weights: Arc<dyn TrafficWeightController> = controller.clone();
    let controller: Arc<dyn TunnelControllerSource> = controller;
    let store: Arc<dyn IncidentStore> =
        Arc::new(DegradedModeStore::new(SqliteIncidentStore::connect(&cli.agent.store_path.to_string_lossy()).await?));
    let shutdown = netprotect::runtime::shutdown_token();

    let handler = Arc::new(Handler {
        probe,
        weights,
        controller,
        store,
        cancel: shutdown.clone(),
        poll_interval: Duration::from_secs(cli.poll_interval_secs),
        max_poll_attempts: cli.max_poll_attempts,
    });

    let server_config = ServerConfig {
        agent_name: "restoration_monitor".to_string(),
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Monitors SLA recovery on the original path and executes cutover".to_string(),
        supported_task_types: vec!["monitor_restoration".to_string()],
        capabilities: vec![],
        tags: vec!["restoration".to_string()],
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
