//! Tunnel Provisioner agent process (spec §4.5): DETECT → BUILD → CREATE →
//! VERIFY → STEER, plus the deletion path the Restoration Monitor drives.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use netprotect::a2a::{build_router, serve_with_graceful_shutdown, ServerConfig, TaskHandler};
use netprotect::collaborators::HttpTunnelController;
use netprotect::config::{AgentConfig, CollaboratorConfig};
use netprotect::domain_types::{BindingIdentifier, CorrelationId, IncidentId, NodeId, PathType, TeType, TunnelId};
use netprotect::observability::init_tracing;
use netprotect::store::{DegradedModeStore, IncidentStore, SqliteIncidentStore};
use netprotect::tunnel::{delete_protection_tunnel, provision_tunnel, TunnelControllerSource};
use serde::Deserialize;
use serde_json::Value;

#[derive(Parser)]
struct Cli {
    #[command(flatten)]
    agent: AgentConfig,
    #[command(flatten)]
    collaborators: CollaboratorConfig,

    /// Spacing between operational-status polls during VERIFY.
    #[arg(long, env = "NETPROTECT_VERIFY_POLL_INTERVAL_SECS", default_value = "5")]
    verify_poll_interval_secs: u64,

    /// Maximum VERIFY polls before treating the tunnel as failed.
    #[arg(long, env = "NETPROTECT_VERIFY_MAX_ATTEMPTS", default_value = "12")]
    verify_max_attempts: u32,
}

#[derive(Deserialize)]
struct ProvisionPayload {
    incident_id: String,
    #[serde(default)]
    requested_te_type: Option<TeType>,
    head_end: NodeId,
    end_point: NodeId,
    #[serde(default)]
    explicit_hops: Option<Vec<NodeId>>,
    #[serde(default = "default_path_type")]
    path_type: PathType,
}

fn default_path_type() -> PathType {
    PathType::Loose
}

#[derive(Deserialize)]
struct DeletePayload {
    incident_id: String,
    head_end: NodeId,
    tunnel_id: TunnelId,
    binding: BindingIdentifier,
}

struct Handler {
    controller: Arc<dyn TunnelControllerSource>,
    store: Arc<dyn IncidentStore>,
    verify_poll_interval: Duration,
    verify_max_attempts: u32,
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
        match task_type {
            "provision_tunnel" => {
                let request: ProvisionPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
                let result = provision_tunnel(
                    self.controller.as_ref(),
                    self.store.as_ref(),
                    &request.incident_id,
                    request.requested_te_type,
                    request.head_end,
                    request.end_point,
                    request.explicit_hops,
                    request.path_type,
                    self.verify_poll_interval,
                    self.verify_max_attempts,
                )
                .await
                .map_err(|e| e.to_string())?;
                serde_json::to_value(result).map_err(|e| e.to_string())
            }
            "delete_tunnel" => {
                let request: DeletePayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;
                delete_protection_tunnel(
                    self.controller.as_ref(),
                    self.store.as_ref(),
                    &request.incident_id,
                    &request.head_end,
                    request.tunnel_id,
                    request.binding,
                )
                .await
                .map_err(|e| e.to_string())?;
                Ok(serde_json::json!({"deleted": true}))
            }
            other => Err(format!("unsupported task type: {other}")),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("tunnel_provisioner");

    let controller: Arc<dyn TunnelControllerSource> = Arc::new(HttpTunnelController::new(cli.collaborators.controller_url));
    let store: Arc<dyn IncidentStore> =
        Arc::new(DegradedModeStore::new(SqliteIncidentStore::connect(&cli.agent.store_path.to_string_lossy()).await?));
    let handler = Arc::new(Handler {
        controller,
        store,
        verify_poll_interval: Duration::from_secs(cli.verify_poll_interval_secs),
        verify_max_attempts: cli.verify_max_attempts,
    });

    let server_config = ServerConfig {
        agent_name: "tunnel_provisioner".to_string(),
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Allocates binding-SIDs and provisions/tears down protection tunnels".to_string(),
        supported_task_types: vec!["provision_tunnel".to_string(), "delete_tunnel".to_string()],
        capabilities: vec![],
        tags: vec!["provisioning".to_string()],
    };

    let router = build_router(server_config, handler);
    let shutdown = netprotect::runtime::shutdown_token();
    serve_with_graceful_shutdown(
        cli.agent.socket_addr()?,
        router,
        shutdown,
        Duration::from_secs(cli.agent.shutdown_grace_secs),
    )
    .await?;
    Ok(())
}
