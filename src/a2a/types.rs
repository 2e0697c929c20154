//! Wire types for the A2A inter-agent task protocol (spec §4.2), grounded
//! in `original_source/agent_template/schemas/tasks.py`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain_types::{CorrelationId, IncidentId, Priority, TaskId};

/// A task sent to another agent over `POST /a2a/tasks` or
/// `POST /a2a/tasks/async`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Client-generated idempotency key.
    pub task_id: TaskId,
    /// Which capability to invoke (spec §6 task-type catalogue).
    pub task_type: String,
    /// The incident this task is acting on behalf of, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_id: Option<IncidentId>,
    /// Distributed-tracing correlation ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Task-type-specific input.
    pub payload: Value,
    /// 1 (lowest) to 10 (highest).
    #[serde(default)]
    pub priority: Priority,
    /// How long the callee may run before returning a timeout.
    pub timeout_seconds: u64,
    /// Where to `POST` the result if submitted via `/a2a/tasks/async`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// Execution state of a task (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Accepted but not yet started.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully; `result` is populated.
    Completed,
    /// Finished with an error; `error` is populated.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

/// The response to a task request, or the current record for a task ID
/// (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    /// Echoes the request's task ID.
    pub task_id: TaskId,
    /// Echoes the request's task type.
    pub task_type: String,
    /// Current state.
    pub status: TaskState,
    /// 0..100, when the callee reports incremental progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// The task's output, present only when `status == Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Opaque error string, present only when `status == Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Name of the agent that produced this response.
    pub agent_name: String,
    /// Version of the agent that produced this response.
    pub agent_version: String,
    /// When execution started.
    pub started_at: DateTime<Utc>,
    /// When execution finished (or now, if still running).
    pub completed_at: DateTime<Utc>,
}

impl TaskResponse {
    /// Whether this response represents a terminal, non-retryable agent
    /// decision (spec §7 "Downstream failure" is never retried by the
    /// transport layer itself — only by the calling node's own policy).
    pub fn is_failed(&self) -> bool {
        self.status == TaskState::Failed
    }
}

/// Describes a single capability an agent exposes (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapability {
    /// Capability name, matching a `task_type` value.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema describing the expected payload.
    pub input_schema: Value,
    /// JSON Schema describing the result shape.
    pub output_schema: Value,
}

/// The capability card served at `GET /.well-known/agent.json` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    /// Agent name, as used in the static registry.
    pub name: String,
    /// Semantic version of the running agent.
    pub version: String,
    /// Human-readable description of the agent's role.
    pub description: String,
    /// Base URL at which the agent is reachable.
    pub url: String,
    /// Always `"a2a"` for this protocol.
    pub protocol: String,
    /// Full capability descriptions.
    pub capabilities: Vec<AgentCapability>,
    /// Task-type strings this agent accepts at `/a2a/tasks`.
    pub supported_task_types: Vec<String>,
    /// Free-form discovery tags.
    pub tags: Vec<String>,
}

/// Body returned by `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"healthy"` when this endpoint responds at all.
    pub status: String,
    /// Name of the responding agent.
    pub agent_name: String,
    /// Version of the responding agent.
    pub version: String,
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,
}
