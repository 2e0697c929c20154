//! A2A client: transport-typed task delivery with retry/backoff, capability
//! discovery, and a per-process agent-card cache (spec §4.2), grounded in
//! `original_source/agent_template/tools/a2a_client/client.py`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tracing::{info, instrument, warn};

use super::registry::AgentRegistry;
use super::types::{AgentCard, TaskRequest, TaskResponse, TaskState};
use crate::error::A2aError;

/// Maximum number of attempts (1 initial + 2 retries) for transport errors.
const MAX_ATTEMPTS: u32 = 3;

/// Client for calling other agents over the A2A protocol.
///
/// Retries only transport errors (connection refused, TCP timeout) with
/// exponential backoff and jitter, up to [`MAX_ATTEMPTS`]. A
/// completed-but-failed response from the callee is never retried here —
/// that decision belongs to the calling node's own policy (spec §4.2).
#[derive(Clone)]
pub struct A2aClient {
    http: reqwest::Client,
    registry: Arc<AgentRegistry>,
    card_cache: Arc<DashMap<String, AgentCard>>,
    default_timeout: Duration,
}

impl A2aClient {
    /// Builds a client over the given static registry.
    pub fn new(registry: AgentRegistry, default_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            registry: Arc::new(registry),
            card_cache: Arc::new(DashMap::new()),
            default_timeout,
        }
    }

    /// Sends a task synchronously and waits for the result (`POST
    /// /a2a/tasks`).
    ///
    /// # Errors
    ///
    /// Returns [`A2aError::UnknownAgent`] if `agent_name` is not registered,
    /// [`A2aError::Transport`] after exhausting retries on connection
    /// failures, [`A2aError::TaskTimeout`] on HTTP 504, or
    /// [`A2aError::Downstream`] if the callee returned a completed-but-
    /// failed task.
    #[instrument(skip(self, request), fields(task_id = %request.task_id, task_type = %request.task_type))]
    pub async fn send_task(&self, agent_name: &str, request: &TaskRequest) -> Result<TaskResponse, A2aError> {
        let base_url = self.registry.resolve(agent_name)?;
        let url = format!("{base_url}/a2a/tasks");
        let timeout = Duration::from_secs(request.timeout_seconds).max(self.default_timeout);

        let response = self.send_with_retry(agent_name, &url, request, timeout).await?;

        if response.status() == reqwest::StatusCode::GATEWAY_TIMEOUT {
            return Err(A2aError::TaskTimeout {
                task_id: request.task_id.to_string(),
                agent: agent_name.to_string(),
                timeout_seconds: request.timeout_seconds,
            });
        }
        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(A2aError::ContractViolation { agent: agent_name.to_string(), message: body });
        }

        let body: TaskResponse = response
            .json()
            .await
            .map_err(|e| A2aError::Transport { agent: agent_name.to_string(), message: e.to_string() })?;

        if body.status == TaskState::Failed {
            return Err(A2aError::Downstream {
                agent: agent_name.to_string(),
                message: body.error.clone().unwrap_or_else(|| "unknown failure".to_string()),
            });
        }

        Ok(body)
    }

    /// Sends a task fire-and-forget (`POST /a2a/tasks/async`); returns
    /// immediately once the callee has accepted it.
    ///
    /// # Errors
    ///
    /// Same transport-level errors as [`Self::send_task`].
    #[instrument(skip(self, request), fields(task_id = %request.task_id, task_type = %request.task_type))]
    pub async fn send_task_async(&self, agent_name: &str, request: &TaskRequest) -> Result<(), A2aError> {
        let base_url = self.registry.resolve(agent_name)?;
        let url = format!("{base_url}/a2a/tasks/async");
        self.send_with_retry(agent_name, &url, request, self.default_timeout).await?;
        Ok(())
    }

    /// Fetches `GET /a2a/tasks/{id}/status` for a previously submitted task.
    ///
    /// # Errors
    ///
    /// Returns [`A2aError::UnknownTask`] on HTTP 404, or a transport error.
    pub async fn task_status(&self, agent_name: &str, task_id: &str) -> Result<TaskState, A2aError> {
        let base_url = self.registry.resolve(agent_name)?;
        let url = format!("{base_url}/a2a/tasks/{task_id}/status");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| A2aError::Transport { agent: agent_name.to_string(), message: e.to_string() })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(A2aError::UnknownTask(task_id.to_string()));
        }
        #[derive(serde::Deserialize)]
        struct StatusBody {
            state: TaskState,
        }
        let body: StatusBody = response
            .json()
            .await
            .map_err(|e| A2aError::Transport { agent: agent_name.to_string(), message: e.to_string() })?;
        Ok(body.state)
    }

    /// Retrieves (and caches for the process lifetime) an agent's
    /// capability card (spec §4.2 "Cache capability cards per agent for
    /// the process lifetime").
    ///
    /// # Errors
    ///
    /// Returns a transport error if the peer is unreachable.
    pub async fn agent_card(&self, agent_name: &str) -> Result<AgentCard, A2aError> {
        if let Some(card) = self.card_cache.get(agent_name) {
            return Ok(card.clone());
        }
        let base_url = self.registry.resolve(agent_name)?;
        let url = format!("{base_url}/.well-known/agent.json");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| A2aError::Transport { agent: agent_name.to_string(), message: e.to_string() })?;
        let card: AgentCard = response
            .json()
            .await
            .map_err(|e| A2aError::Transport { agent: agent_name.to_string(), message: e.to_string() })?;
        self.card_cache.insert(agent_name.to_string(), card.clone());
        Ok(card)
    }

    async fn send_with_retry(
        &self,
        agent_name: &str,
        url: &str,
        request: &TaskRequest,
        timeout: Duration,
    ) -> Result<reqwest::Response, A2aError> {
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let backoff = backoff_with_jitter(attempt);
                warn!(agent = agent_name, attempt, backoff_ms = backoff.as_millis() as u64, "retrying A2A transport error");
                tokio::time::sleep(backoff).await;
            }
            match self.http.post(url).timeout(timeout).json(request).send().await {
                Ok(response) => {
                    info!(agent = agent_name, attempt, status = response.status().as_u16(), "A2A call completed");
                    return Ok(response);
                }
                Err(err) if err.is_connect() || err.is_timeout() => {
                    last_err = Some(A2aError::Transport { agent: agent_name.to_string(), message: err.to_string() });
                }
                Err(err) => {
                    return Err(A2aError::Transport { agent: agent_name.to_string(), message: err.to_string() });
                }
            }
        }
        Err(last_err.expect("loop always runs at least once"))
    }
}

/// Exponential backoff with full jitter: `rand(0, base * 2^(attempt-1))`,
/// capped at 10s (spec §4.2 "exponential backoff, max 3 attempts, jitter").
fn backoff_with_jitter(attempt: u32) -> Duration {
    let base_ms = 200u64 * 2u64.pow(attempt.saturating_sub(1));
    let capped_ms = base_ms.min(10_000);
    let jittered = rand::thread_rng().gen_range(0..=capped_ms);
    Duration::from_millis(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_bounded_and_grows_with_attempt() {
        for attempt in 1..=3 {
            let d = backoff_with_jitter(attempt);
            assert!(d <= Duration::from_secs(10));
        }
    }
}
