//! Terminal-state side effects: exactly one notification and one audit
//! log entry per terminal transition (spec §2, §6, §7). Specific channel
//! bindings (email, chat, ticketing, telemetry collectors) are out of
//! scope; this module only defines the event shapes and the sink seam the
//! Orchestrator calls through, grounded in
//! `original_source/agents/orchestrator/tools/{notifier,audit_logger}.py`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain_types::IncidentId;
use crate::error::A2aError;

/// The kind of terminal-state event a notification/audit pair reports
/// (spec §6 task type `send_notification`/`log_event` payload
/// `event_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Traffic was steered onto a protection tunnel (spec §4.8 "steering").
    ProtectionActivated,
    /// The original path recovered and the protection tunnel was removed.
    RestorationComplete,
    /// The incident closed with zero affected services.
    NoImpactClose,
    /// The incident escalated to a hard failure.
    Escalated,
    /// Generic incident closure, emitted by `close` regardless of how the
    /// incident got there.
    IncidentClosed,
}

/// A human/operator-facing notification (spec §6 `send_notification`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// The incident this notification concerns.
    pub incident_id: IncidentId,
    /// What happened.
    pub event_type: EventType,
    /// Short human-readable summary.
    pub summary: String,
    /// Structured detail, opaque to this module.
    pub detail: Value,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
}

/// An append-only audit log entry (spec §6 `log_event`, spec §2 "Fan-out
/// side effects; append-only event log").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// The incident this entry concerns.
    pub incident_id: IncidentId,
    /// What happened.
    pub event_type: EventType,
    /// Structured detail, opaque to this module.
    pub detail: Value,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
}

/// Destination for operator-facing notifications. Real channel bindings
/// (email, chat, ticketing) live outside this crate.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers `notification`. Delivery failure here never blocks the
    /// orchestrator's own state transition (spec §7 does not list
    /// notification failure among the transition-halting error kinds).
    async fn notify(&self, notification: Notification) -> Result<(), A2aError>;
}

/// Destination for the append-only audit trail.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends `entry`.
    async fn log(&self, entry: AuditEntry) -> Result<(), A2aError>;
}

/// Sends one notification for a terminal-state event (spec §7 "every
/// terminal state emits exactly one `send_notification`").
///
/// # Errors
///
/// Propagates a sink failure; callers that want best-effort delivery
/// should log and discard rather than let this abort the transition,
/// since notification delivery is not one of spec §7's
/// transition-halting error kinds.
pub async fn send_notification(
    sink: &dyn NotificationSink,
    incident_id: IncidentId,
    event_type: EventType,
    summary: impl Into<String>,
    detail: Value,
    now: DateTime<Utc>,
) -> Result<(), A2aError> {
    sink.notify(Notification { incident_id, event_type, summary: summary.into(), detail, occurred_at: now }).await
}

/// Appends one audit log entry for a terminal-state event (spec §7 "...and
/// one `log_event` before closing").
///
/// # Errors
///
/// Propagates a sink failure.
pub async fn log_event(sink: &dyn AuditSink, incident_id: IncidentId, event_type: EventType, detail: Value, now: DateTime<Utc>) -> Result<(), A2aError> {
    sink.log(AuditEntry { incident_id, event_type, detail, occurred_at: now }).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use serde_json::json;

    struct FakeNotificationSink {
        sent: DashMap<String, Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationSink for FakeNotificationSink {
        async fn notify(&self, notification: Notification) -> Result<(), A2aError> {
            self.sent.entry(notification.incident_id.to_string()).or_default().push(notification);
            Ok(())
        }
    }

    struct FakeAuditSink {
        logged: DashMap<String, Vec<AuditEntry>>,
    }

    #[async_trait]
    impl AuditSink for FakeAuditSink {
        async fn log(&self, entry: AuditEntry) -> Result<(), A2aError> {
            self.logged.entry(entry.incident_id.to_string()).or_default().push(entry);
            Ok(())
        }
    }

    #[tokio::test]
    async fn send_notification_delivers_exactly_one_event() {
        let sink = FakeNotificationSink { sent: DashMap::new() };
        let incident_id = IncidentId::generate(Utc::now());

        send_notification(&sink, incident_id.clone(), EventType::NoImpactClose, "no services affected", json!({}), Utc::now())
            .await
            .unwrap();

        assert_eq!(sink.sent.get(&incident_id.to_string()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn log_event_appends_to_the_audit_trail() {
        let sink = FakeAuditSink { logged: DashMap::new() };
        let incident_id = IncidentId::generate(Utc::now());

        log_event(&sink, incident_id.clone(), EventType::IncidentClosed, json!({"reason": "closed"}), Utc::now()).await.unwrap();
        log_event(&sink, incident_id.clone(), EventType::IncidentClosed, json!({"reason": "closed again"}), Utc::now()).await.unwrap();

        assert_eq!(sink.logged.get(&incident_id.to_string()).unwrap().len(), 2);
    }
}
