//! Path Computer agent process (spec §4.4): the BUILD_CONSTRAINTS → QUERY →
//! VALIDATE → (RETURN | RELAX) loop for protection-path requests.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use netprotect::a2a::{build_router, serve_with_graceful_shutdown, ServerConfig, TaskHandler};
use netprotect::collaborators::HttpPathQuerySource;
use netprotect::config::{AgentConfig, CollaboratorConfig};
use netprotect::domain_types::{CorrelationId, IncidentId, LinkId, NodeId, TeType};
use netprotect::observability::init_tracing;
use netprotect::path_computer::{compute_protected_path, PathQuerySource};
use serde::Deserialize;
use serde_json::Value;

#[derive(Parser)]
struct Cli {
    #[command(flatten)]
    agent: AgentConfig,
    #[command(flatten)]
    collaborators: CollaboratorConfig,
}

#[derive(Deserialize)]
struct ComputePathPayload {
    source: NodeId,
    destination: NodeId,
    #[serde(default)]
    avoid_links: Vec<LinkId>,
    current_te_type: TeType,
    #[serde(default)]
    required_max_delay_ms: Option<f64>,
    #[serde(default)]
    required_min_bandwidth_gbps: Option<f64>,
}

struct Handler {
    source: Arc<dyn PathQuerySource>,
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
        if task_type != "compute_path" {
            return Err(format!("unsupported task type: {task_type}"));
        }
        let request: ComputePathPayload = serde_json::from_value(payload).map_err(|e| e.to_string())?;

        let path = compute_protected_path(
            self.source.as_ref(),
            &request.source,
            &request.destination,
            request.avoid_links,
            request.current_te_type,
            request.required_max_delay_ms,
            request.required_min_bandwidth_gbps,
        )
        .await
        .map_err(|e| e.to_string())?;

        Ok(serde_json::json!({"path_found": path.is_some(), "path": path}))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("path_computer");

    let source: Arc<dyn PathQuerySource> = Arc::new(HttpPathQuerySource::new(cli.collaborators.topology_url));
    let handler = Arc::new(Handler { source });

    let server_config = ServerConfig {
        agent_name: "path_computer".to_string(),
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Computes a compliant alternate path with progressive constraint relaxation".to_string(),
        supported_task_types: vec!["compute_path".to_string()],
        capabilities: vec![],
        tags: vec!["routing".to_string()],
    };

    let router = build_router(server_config, handler);
    let shutdown = netprotect::runtime::shutdown_token();
    serve_with_graceful_shutdown(
        cli.agent.socket_addr()?,
        router,
        shutdown,
        std::time::Duration::from_secs(cli.agent.shutdown_grace_secs),
    )
    .await?;
    Ok(())
}
