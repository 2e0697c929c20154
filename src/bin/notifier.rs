//! Notifier agent process (spec §6 `send_notification`): the human/operator-
//! facing half of the terminal-state fan-out. Specific channel bindings
//! (email, chat, ticketing) are out of scope (spec §1 non-goals analog for
//! side-channel delivery); this agent logs the event at `info` level as the
//! channel of record, the same way the teacher's agents log everything they
//! can't otherwise act on.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use netprotect::a2a::{build_router, serve_with_graceful_shutdown, ServerConfig, TaskHandler};
use netprotect::config::AgentConfig;
use netprotect::domain_types::{CorrelationId, IncidentId};
use netprotect::notification::Notification;
use netprotect::observability::init_tracing;
use serde_json::Value;
use tracing::info;

struct Handler;

#[async_trait]
impl TaskHandler for Handler {
    async fn handle(
        &self,
        task_type: &str,
        _incident_id: Option<IncidentId>,
        _correlation_id: Option<CorrelationId>,
        payload: Value,
    ) -> Result<Value, String> {
        if task_type != "send_notification" {
            return Err(format!("unsupported task type: {task_type}"));
        }
        let notification: Notification = serde_json::from_value(payload).map_err(|e| e.to_string())?;
        info!(
            incident_id = %notification.incident_id,
            event_type = ?notification.event_type,
            summary = %notification.summary,
            "notification delivered"
        );
        Ok(serde_json::json!({"delivered": true}))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AgentConfig::parse();
    init_tracing("notifier");

    let handler = Arc::new(Handler);
    let server_config = ServerConfig {
        agent_name: "notifier".to_string(),
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Delivers operator-facing notifications for terminal incident states".to_string(),
        supported_task_types: vec!["send_notification".to_string()],
        capabilities: vec![],
        tags: vec!["notification".to_string()],
    };

    let router = build_router(server_config, handler);
    let shutdown = netprotect::runtime::shutdown_token();
    serve_with_graceful_shutdown(config.socket_addr()?, router, shutdown, std::time::Duration::from_secs(config.shutdown_grace_secs))
        .await?;
    Ok(())
}
