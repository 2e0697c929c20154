//! A2A task server: the axum router every agent binary serves (spec §4.2,
//! §6), grounded in `original_source/agent_template/api/server.py` and the
//! teacher's `server.rs` (`create_router` / `serve_with_graceful_shutdown`).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{error, info, instrument, warn};

use super::types::{AgentCapability, AgentCard, HealthResponse, TaskRequest, TaskResponse, TaskState};
use crate::domain_types::{CorrelationId, IncidentId, TaskId};

/// The business logic an agent plugs into the shared A2A server. One
/// implementation per agent binary (correlator, path computer, ...);
/// `task_type` has already been validated against
/// [`ServerConfig::supported_task_types`] by the time this is called.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Executes one task. `Err` is an application-level failure (the
    /// callee completed, but the result is an error) — it is carried as
    /// `status.state = failed`, HTTP 200 (spec §4.2, §6); it is distinct
    /// from a timeout or a transport error, which the server maps itself.
    async fn handle(
        &self,
        task_type: &str,
        incident_id: Option<IncidentId>,
        correlation_id: Option<CorrelationId>,
        payload: Value,
    ) -> Result<Value, String>;
}

/// Static identity fields for an agent's capability card.
pub struct ServerConfig {
    /// Agent name, as registered in [`crate::a2a::AgentRegistry`].
    pub agent_name: String,
    /// Semantic version string.
    pub agent_version: String,
    /// Human-readable role description.
    pub description: String,
    /// Task types accepted at `/a2a/tasks`.
    pub supported_task_types: Vec<String>,
    /// Full capability descriptions for the agent card.
    pub capabilities: Vec<AgentCapability>,
    /// Discovery tags.
    pub tags: Vec<String>,
}

struct ServerState {
    config: ServerConfig,
    handler: Arc<dyn TaskHandler>,
    tasks: DashMap<TaskId, TaskResponse>,
    ready: AtomicBool,
    http: reqwest::Client,
}

/// Builds the axum router shared by every agent process. Marks the server
/// ready immediately; callers that need a warm-up window can flip
/// readiness externally by holding the router construction until ready.
pub fn build_router(config: ServerConfig, handler: Arc<dyn TaskHandler>) -> Router {
    let state = Arc::new(ServerState {
        config,
        handler,
        tasks: DashMap::new(),
        ready: AtomicBool::new(true),
        http: reqwest::Client::new(),
    });

    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/.well-known/agent.json", get(agent_card))
        .route("/a2a/tasks", post(execute_task_sync))
        .route("/a2a/tasks/async", post(execute_task_async))
        .route("/a2a/tasks/{id}/status", get(task_status))
        .route("/a2a/tasks/{id}", get(task_result))
        .with_state(state)
}

/// Serves `router` on `addr` until `shutdown_token` is cancelled, then
/// drains in-flight connections (spec §6 "Exit codes": SIGTERM completes
/// in-flight tasks up to a grace deadline, then forces exit).
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve_with_graceful_shutdown(
    addr: SocketAddr,
    router: Router,
    shutdown_token: tokio_util::sync::CancellationToken,
    grace: Duration,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "A2A server listening");

    let shutdown_signal = async move {
        shutdown_token.cancelled().await;
        info!("shutdown signal received, draining in-flight tasks");
    };

    tokio::time::timeout(
        grace + Duration::from_secs(1),
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal),
    )
    .await
    .unwrap_or_else(|_| {
        warn!("graceful shutdown grace period exceeded, forcing exit");
        Ok(())
    })
}

async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        agent_name: state.config.agent_name.clone(),
        version: state.config.agent_version.clone(),
        timestamp: Utc::now(),
    })
}

async fn ready(State(state): State<Arc<ServerState>>) -> StatusCode {
    if state.ready.load(Ordering::Acquire) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn agent_card(State(state): State<Arc<ServerState>>) -> Json<AgentCard> {
    Json(AgentCard {
        name: state.config.agent_name.clone(),
        version: state.config.agent_version.clone(),
        description: state.config.description.clone(),
        url: String::new(),
        protocol: "a2a".to_string(),
        capabilities: state.config.capabilities.clone(),
        supported_task_types: state.config.supported_task_types.clone(),
        tags: state.config.tags.clone(),
    })
}

#[instrument(skip(state, request), fields(task_id = %request.task_id, task_type = %request.task_type))]
async fn execute_task_sync(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<TaskRequest>,
) -> impl IntoResponse {
    // Idempotency: a completed record for this task ID is returned as-is
    // (spec §4.2 "A server receiving the same task-ID twice with a
    // completed record must return the cached result").
    if let Some(cached) = state.tasks.get(&request.task_id) {
        if cached.status != TaskState::Pending && cached.status != TaskState::Running {
            return (StatusCode::OK, Json(cached.clone())).into_response();
        }
    }

    if !state.config.supported_task_types.iter().any(|t| t == &request.task_type) {
        return (
            StatusCode::BAD_REQUEST,
            format!(
                "unsupported task type: {}. supported: {:?}",
                request.task_type, state.config.supported_task_types
            ),
        )
            .into_response();
    }

    let started_at = Utc::now();
    let deadline = Duration::from_secs(request.timeout_seconds);
    let handler = state.handler.clone();
    let task_type = request.task_type.clone();
    let incident_id = request.incident_id.clone();
    let correlation_id = request.correlation_id;
    let payload = request.payload.clone();

    // Spawned so a panic inside the handler surfaces as a `JoinError`
    // instead of taking the whole server down, giving us a 500 path
    // distinct from both a timeout and a business-logic `Err` (spec §6).
    let outcome = tokio::time::timeout(deadline, tokio::spawn(async move { handler.handle(&task_type, incident_id, correlation_id, payload).await })).await;

    let (status, response) = match outcome {
        Err(_elapsed) => {
            error!(task_id = %request.task_id, "task timed out");
            (
                StatusCode::GATEWAY_TIMEOUT,
                TaskResponse {
                    task_id: request.task_id,
                    task_type: request.task_type.clone(),
                    status: TaskState::Failed,
                    progress: None,
                    result: None,
                    error: Some(format!("timeout after {}s", request.timeout_seconds)),
                    agent_name: state.config.agent_name.clone(),
                    agent_version: state.config.agent_version.clone(),
                    started_at,
                    completed_at: Utc::now(),
                },
            )
        }
        Ok(Err(join_err)) => {
            error!(task_id = %request.task_id, error = %join_err, "task handler panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                TaskResponse {
                    task_id: request.task_id,
                    task_type: request.task_type.clone(),
                    status: TaskState::Failed,
                    progress: None,
                    result: None,
                    error: Some(format!("internal failure: {join_err}")),
                    agent_name: state.config.agent_name.clone(),
                    agent_version: state.config.agent_version.clone(),
                    started_at,
                    completed_at: Utc::now(),
                },
            )
        }
        Ok(Ok(Ok(result))) => (
            StatusCode::OK,
            TaskResponse {
                task_id: request.task_id,
                task_type: request.task_type.clone(),
                status: TaskState::Completed,
                progress: Some(100),
                result: Some(result),
                error: None,
                agent_name: state.config.agent_name.clone(),
                agent_version: state.config.agent_version.clone(),
                started_at,
                completed_at: Utc::now(),
            },
        ),
        Ok(Ok(Err(message))) => (
            StatusCode::OK,
            TaskResponse {
                task_id: request.task_id,
                task_type: request.task_type.clone(),
                status: TaskState::Failed,
                progress: None,
                result: None,
                error: Some(message),
                agent_name: state.config.agent_name.clone(),
                agent_version: state.config.agent_version.clone(),
                started_at,
                completed_at: Utc::now(),
            },
        ),
    };

    // A 500 is not cached as a completed task record: the panic may be
    // transient, and idempotency (spec §4.2) only covers results the
    // handler itself produced.
    if status != StatusCode::INTERNAL_SERVER_ERROR {
        state.tasks.insert(request.task_id, response.clone());
    }

    (status, Json(response)).into_response()
}

#[instrument(skip(state, request), fields(task_id = %request.task_id, task_type = %request.task_type))]
async fn execute_task_async(State(state): State<Arc<ServerState>>, Json(request): Json<TaskRequest>) -> impl IntoResponse {
    if !state.config.supported_task_types.iter().any(|t| t == &request.task_type) {
        return (
            StatusCode::BAD_REQUEST,
            format!("unsupported task type: {}", request.task_type),
        )
            .into_response();
    }

    let started_at = Utc::now();
    state.tasks.insert(
        request.task_id,
        TaskResponse {
            task_id: request.task_id,
            task_type: request.task_type.clone(),
            status: TaskState::Pending,
            progress: None,
            result: None,
            error: None,
            agent_name: state.config.agent_name.clone(),
            agent_version: state.config.agent_version.clone(),
            started_at,
            completed_at: started_at,
        },
    );

    let task_type = request.task_type.clone();
    let callback_url = request.callback_url.clone();
    let task_id = request.task_id;
    let background = state.clone();
    tokio::spawn(async move {
        run_async_task(background, request, started_at).await;
        if let Some(url) = callback_url {
            send_callback(&task_id, &task_type, url).await;
        }
    });

    (StatusCode::ACCEPTED, Json(serde_json::json!({"task_id": task_id, "status": "accepted"}))).into_response()
}

async fn run_async_task(state: Arc<ServerState>, request: TaskRequest, started_at: chrono::DateTime<Utc>) {
    let result = state
        .handler
        .handle(&request.task_type, request.incident_id.clone(), request.correlation_id, request.payload.clone())
        .await;

    let response = match result {
        Ok(value) => TaskResponse {
            task_id: request.task_id,
            task_type: request.task_type.clone(),
            status: TaskState::Completed,
            progress: Some(100),
            result: Some(value),
            error: None,
            agent_name: state.config.agent_name.clone(),
            agent_version: state.config.agent_version.clone(),
            started_at,
            completed_at: Utc::now(),
        },
        Err(message) => TaskResponse {
            task_id: request.task_id,
            task_type: request.task_type.clone(),
            status: TaskState::Failed,
            progress: None,
            result: None,
            error: Some(message),
            agent_name: state.config.agent_name.clone(),
            agent_version: state.config.agent_version.clone(),
            started_at,
            completed_at: Utc::now(),
        },
    };
    state.tasks.insert(request.task_id, response);
}

/// One-shot, unsigned callback POST (spec §9 open question 2: production
/// would need at-least-once delivery with a signed payload; this ships the
/// behavior as specified, not the hardened variant).
async fn send_callback(task_id: &TaskId, _task_type: &str, url: String) {
    let client = reqwest::Client::new();
    match client.post(&url).json(&serde_json::json!({"task_id": task_id})).send().await {
        Ok(_) => info!(%task_id, %url, "sent async task callback"),
        Err(err) => warn!(%task_id, %url, error = %err, "failed to send async task callback"),
    }
}

async fn task_status(State(state): State<Arc<ServerState>>, AxumPath(id): AxumPath<String>) -> impl IntoResponse {
    let Ok(task_id) = id.parse::<uuid::Uuid>().map(TaskId::from) else {
        return (StatusCode::NOT_FOUND, "unknown task id").into_response();
    };
    match state.tasks.get(&task_id) {
        Some(task) => (StatusCode::OK, Json(task.status)).into_response(),
        None => (StatusCode::NOT_FOUND, "unknown task id").into_response(),
    }
}

async fn task_result(State(state): State<Arc<ServerState>>, AxumPath(id): AxumPath<String>) -> impl IntoResponse {
    let Ok(task_id) = id.parse::<uuid::Uuid>().map(TaskId::from) else {
        return (StatusCode::NOT_FOUND, "unknown task id").into_response();
    };
    match state.tasks.get(&task_id) {
        Some(task) => (StatusCode::OK, Json(task.clone())).into_response(),
        None => (StatusCode::NOT_FOUND, "unknown task id").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl TaskHandler for EchoHandler {
        async fn handle(
            &self,
            _task_type: &str,
            _incident_id: Option<IncidentId>,
            _correlation_id: Option<CorrelationId>,
            payload: Value,
        ) -> Result<Value, String> {
            Ok(payload)
        }
    }

    fn test_config() -> ServerConfig {
        ServerConfig {
            agent_name: "test_agent".to_string(),
            agent_version: "0.1.0".to_string(),
            description: "test".to_string(),
            supported_task_types: vec!["echo".to_string()],
            capabilities: vec![],
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn health_and_ready_respond() {
        let router = build_router(test_config(), Arc::new(EchoHandler));
        let (listener, addr) = bind_ephemeral().await;
        let server = tokio::spawn(async move { axum::serve(listener, router).await });

        let client = reqwest::Client::new();
        let health = client.get(format!("http://{addr}/health")).send().await.unwrap();
        assert!(health.status().is_success());
        let ready = client.get(format!("http://{addr}/ready")).send().await.unwrap();
        assert!(ready.status().is_success());

        server.abort();
    }

    #[tokio::test]
    async fn unsupported_task_type_is_rejected_with_400() {
        let router = build_router(test_config(), Arc::new(EchoHandler));
        let (listener, addr) = bind_ephemeral().await;
        let server = tokio::spawn(async move { axum::serve(listener, router).await });

        let request = TaskRequest {
            task_id: TaskId::generate(),
            task_type: "unknown_type".to_string(),
            incident_id: None,
            correlation_id: None,
            payload: serde_json::json!({}),
            priority: Default::default(),
            timeout_seconds: 5,
            callback_url: None,
        };
        let client = reqwest::Client::new();
        let response = client.post(format!("http://{addr}/a2a/tasks")).json(&request).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        server.abort();
    }

    struct PanicHandler;

    #[async_trait]
    impl TaskHandler for PanicHandler {
        async fn handle(
            &self,
            _task_type: &str,
            _incident_id: Option<IncidentId>,
            _correlation_id: Option<CorrelationId>,
            _payload: Value,
        ) -> Result<Value, String> {
            panic!("boom")
        }
    }

    #[tokio::test]
    async fn handler_panic_is_reported_with_500() {
        let router = build_router(test_config(), Arc::new(PanicHandler));
        let (listener, addr) = bind_ephemeral().await;
        let server = tokio::spawn(async move { axum::serve(listener, router).await });

        let request = TaskRequest {
            task_id: TaskId::generate(),
            task_type: "echo".to_string(),
            incident_id: None,
            correlation_id: None,
            payload: serde_json::json!({}),
            priority: Default::default(),
            timeout_seconds: 5,
            callback_url: None,
        };
        let client = reqwest::Client::new();
        let response = client.post(format!("http://{addr}/a2a/tasks")).json(&request).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        server.abort();
    }

    async fn bind_ephemeral() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }
}
