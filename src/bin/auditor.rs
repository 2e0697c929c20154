//! Auditor agent process (spec §6 `log_event`): appends each terminal-state
//! event to the incident's durable, append-only audit trail.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use netprotect::a2a::{build_router, serve_with_graceful_shutdown, ServerConfig, TaskHandler};
use netprotect::config::AgentConfig;
use netprotect::domain_types::{CorrelationId, IncidentId};
use netprotect::notification::AuditEntry;
use netprotect::observability::init_tracing;
use netprotect::store::{keys, DegradedModeStore, IncidentStore, SqliteIncidentStore};
use serde_json::Value;

struct Handler {
    store: Arc<dyn IncidentStore>,
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
        if task_type != "log_event" {
            return Err(format!("unsupported task type: {task_type}"));
        }
        let entry: AuditEntry = serde_json::from_value(payload).map_err(|e| e.to_string())?;
        let key = keys::audit_log(&entry.incident_id.to_string());
        let value = serde_json::to_value(&entry).map_err(|e| e.to_string())?;
        self.store.list_push_front(&key, &value).await.map_err(|e| e.to_string())?;
        Ok(serde_json::json!({"logged": true}))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AgentConfig::parse();
    init_tracing("auditor");

    let store: Arc<dyn IncidentStore> =
        Arc::new(DegradedModeStore::new(SqliteIncidentStore::connect(&config.store_path.to_string_lossy()).await?));
    let handler = Arc::new(Handler { store });

    let server_config = ServerConfig {
        agent_name: "auditor".to_string(),
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Appends terminal-state events to each incident's audit trail".to_string(),
        supported_task_types: vec!["log_event".to_string()],
        capabilities: vec![],
        tags: vec!["audit".to_string()],
    };

    let router = build_router(server_config, handler);
    let shutdown = netprotect::runtime::shutdown_token();
    serve_with_graceful_shutdown(config.socket_addr()?, router, shutdown, std::time::Duration::from_secs(config.shutdown_grace_secs))
        .await?;
    Ok(())
}
