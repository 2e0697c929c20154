//! Notification/audit sinks that relay over A2A to the `notifier` and
//! `auditor` agents (spec §6 task catalogue: `send_notification`,
//! `log_event`), the production backing for [`crate::notification`]'s
//! sink traits in every binary besides the notifier/auditor processes
//! themselves.

use async_trait::async_trait;

use super::client::A2aClient;
use super::types::TaskRequest;
use crate::domain_types::{Priority, TaskId};
use crate::error::A2aError;
use crate::notification::{AuditEntry, AuditSink, Notification, NotificationSink};

/// Delivers notifications to the `notifier` agent's `send_notification`
/// task type.
pub struct A2aNotificationSink {
    client: A2aClient,
    timeout_seconds: u64,
}

impl A2aNotificationSink {
    /// Builds a sink that calls the `notifier` entry in `client`'s registry.
    pub fn new(client: A2aClient, timeout_seconds: u64) -> Self {
        Self { client, timeout_seconds }
    }
}

#[async_trait]
impl NotificationSink for A2aNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), A2aError> {
        let request = TaskRequest {
            task_id: TaskId::generate(),
            task_type: "send_notification".to_string(),
            incident_id: Some(notification.incident_id),
            correlation_id: None,
            payload: serde_json::to_value(&notification).map_err(|e| A2aError::ContractViolation {
                agent: "notifier".to_string(),
                message: e.to_string(),
            })?,
            priority: Priority::default(),
            timeout_seconds: self.timeout_seconds,
            callback_url: None,
        };
        self.client.send_task("notifier", &request).await?;
        Ok(())
    }
}

/// Appends entries via the `auditor` agent's `log_event` task type.
pub struct A2aAuditSink {
    client: A2aClient,
    timeout_seconds: u64,
}

impl A2aAuditSink {
    /// Builds a sink that calls the `auditor` entry in `client`'s registry.
    pub fn new(client: A2aClient, timeout_seconds: u64) -> Self {
        Self { client, timeout_seconds }
    }
}

#[async_trait]
impl AuditSink for A2aAuditSink {
    async fn log(&self, entry: AuditEntry) -> Result<(), A2aError> {
        let request = TaskRequest {
            task_id: TaskId::generate(),
            task_type: "log_event".to_string(),
            incident_id: Some(entry.incident_id),
            correlation_id: None,
            payload: serde_json::to_value(&entry)
                .map_err(|e| A2aError::ContractViolation { agent: "auditor".to_string(), message: e.to_string() })?,
            priority: Priority::default(),
            timeout_seconds: self.timeout_seconds,
            callback_url: None,
        };
        self.client.send_task("auditor", &request).await?;
        Ok(())
    }
}
