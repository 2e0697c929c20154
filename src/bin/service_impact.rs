//! Service Impact agent process (spec §4.4): given an incident's degraded
//! links, ranks the customer services riding them by SLA tier.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use netprotect::a2a::{build_router, serve_with_graceful_shutdown, ServerConfig, TaskHandler};
use netprotect::collaborators::HttpServiceHealthSource;
use netprotect::config::{AgentConfig, CollaboratorConfig};
use netprotect::domain_types::{CorrelationId, IncidentId, LinkId};
use netprotect::observability::init_tracing;
use netprotect::service_impact::{assess_impact, ServiceHealthSource};
use serde_json::Value;

#[derive(Parser)]
struct Cli {
    #[command(flatten)]
    agent: AgentConfig,
    #[command(flatten)]
    collaborators: CollaboratorConfig,
}

struct Handler {
    source: Arc<dyn ServiceHealthSource>,
}

#[async_trait]
impl TaskHandler for Handler {
    async fn handle(
        &self,
        task_type: &str,
        incident_id: Option<IncidentId>,
        _correlation_id: Option<CorrelationId>,
        payload: Value,
    ) -> Result<Value, String> {
        if task_type != "assess_impact" {
            return Err(format!("unsupported task type: {task_type}"));
        }
        let incident_id = incident_id.ok_or("payload requires an incident_id")?;
        let degraded_links: Vec<LinkId> = serde_json::from_value(
            payload.get("degraded_links").cloned().ok_or("payload missing \"degraded_links\"")?,
        )
        .map_err(|e| e.to_string())?;

        let response = assess_impact(self.source.as_ref(), incident_id, &degraded_links).await.map_err(|e| e.to_string())?;
        serde_json::to_value(response).map_err(|e| e.to_string())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("service_impact");

    let source: Arc<dyn ServiceHealthSource> = Arc::new(HttpServiceHealthSource::new(cli.collaborators.topology_url));
    let handler = Arc::new(Handler { source });

    let server_config = ServerConfig {
        agent_name: "service_impact".to_string(),
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Ranks services affected by a set of degraded links by SLA tier".to_string(),
        supported_task_types: vec!["assess_impact".to_string()],
        capabilities: vec![],
        tags: vec!["impact".to_string()],
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
