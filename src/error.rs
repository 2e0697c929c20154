//! Error taxonomy for the control plane (spec §7).
//!
//! Each kind of failure the spec names gets its own variant family so
//! callers match on kind, not on string content. `CoreError` is the
//! top-level enum every node-level operation returns; subsystem errors
//! (`StoreError`, `A2aError`, ...) convert into it via `#[from]`.

use crate::domain_types::EscalationReason;
use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by the A2A transport layer.
#[derive(Error, Debug, Clone)]
pub enum A2aError {
    /// Unreachable peer, connection reset, or DNS failure. Retried by the
    /// client with backoff; surfaced after exhaustion.
    #[error("transport error calling {agent}: {message}")]
    Transport {
        /// Target agent name.
        agent: String,
        /// Underlying transport error description.
        message: String,
    },

    /// Deadline exceeded at either end. Never retried by the client.
    #[error("task {task_id} against {agent} timed out after {timeout_seconds}s")]
    TaskTimeout {
        /// The task that timed out.
        task_id: String,
        /// Target agent name.
        agent: String,
        /// Configured timeout.
        timeout_seconds: u64,
    },

    /// Unsupported task-type or malformed payload. Never retried.
    #[error("contract violation calling {agent}: {message}")]
    ContractViolation {
        /// Target agent name.
        agent: String,
        /// Description of the violation.
        message: String,
    },

    /// The called agent returned `status.state = failed`.
    #[error("{agent} reported task failure: {message}")]
    Downstream {
        /// Target agent name.
        agent: String,
        /// Opaque error string from the downstream agent.
        message: String,
    },

    /// No URL is registered for the named agent.
    #[error("no registry entry for agent {0}")]
    UnknownAgent(String),

    /// The task ID was not found when querying status/result.
    #[error("unknown task id {0}")]
    UnknownTask(String),
}

/// Errors surfaced while normalizing or correlating alerts (spec §4.3).
#[derive(Error, Debug, Clone)]
pub enum CorrelationError {
    /// The raw payload was missing a field its declared source requires.
    #[error("malformed alert: {message}")]
    MalformedAlert {
        /// Description of what was missing or invalid.
        message: String,
    },
}

/// Errors surfaced by the Orchestrator state machine.
#[derive(Error, Debug, Clone)]
pub enum OrchestratorError {
    /// A subsystem failure the orchestrator could not recover from inline.
    #[error("node {node} failed: {source}")]
    NodeFailed {
        /// The orchestrator node (state) that failed.
        node: String,
        /// The underlying error.
        #[source]
        source: Box<CoreError>,
    },

    /// The incident has no record in the store (expected one to exist).
    #[error("incident {0} not found")]
    IncidentNotFound(String),
}

/// Top-level error type threaded through every node-level operation.
///
/// Nodes never panic across the state-machine boundary: an error here is
/// captured, written to the incident's `error_message`, and the
/// orchestrator decides retry vs. escalate per spec §4.8.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Transport-layer failure talking to a collaborator agent.
    #[error(transparent)]
    A2a(#[from] A2aError),

    /// Incident Store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Orchestrator-internal failure.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// Alert normalization or correlation failure.
    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    /// BSID pool exhausted at a head-end.
    #[error("binding-SID pool exhausted at head-end {head_end}")]
    ResourceExhausted {
        /// The head-end whose pool is empty.
        head_end: String,
    },

    /// No path after max relaxation, max retries, or max poll attempts
    /// reached. Always carries the specific escalation reason it maps to.
    #[error("logic exhausted: {reason:?}")]
    LogicExhaustion {
        /// The specific cause, used directly as the incident's
        /// `escalation_reason`.
        reason: EscalationReason,
    },
}

impl CoreError {
    /// The escalation reason this error maps to (spec §7's error
    /// taxonomy, each kind mapped to the specific cause the Orchestrator
    /// records). Every variant resolves to a reason: a node-level error
    /// that reaches the Orchestrator always halts the incident's
    /// transition, so it always needs somewhere to escalate to.
    pub fn escalation_reason(&self) -> EscalationReason {
        match self {
            Self::Store(StoreError::Unavailable { .. }) => EscalationReason::StoreUnavailable,
            Self::ResourceExhausted { .. } => EscalationReason::TunnelProvisionFailed3x,
            Self::LogicExhaustion { reason } => *reason,
            Self::A2a(A2aError::Downstream { .. }) => EscalationReason::CascadingFailure,
            Self::A2a(
                A2aError::Transport { .. }
                | A2aError::TaskTimeout { .. }
                | A2aError::ContractViolation { .. }
                | A2aError::UnknownAgent(_)
                | A2aError::UnknownTask(_),
            ) => EscalationReason::CollaboratorUnavailable,
            Self::Orchestrator(OrchestratorError::NodeFailed { source, .. }) => source.escalation_reason(),
            Self::Orchestrator(OrchestratorError::IncidentNotFound(_)) => EscalationReason::CollaboratorUnavailable,
            Self::Correlation(_) => EscalationReason::CollaboratorUnavailable,
        }
    }
}
