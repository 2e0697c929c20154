//! The A2A inter-agent task protocol (spec §4.2): typed, idempotent
//! synchronous and fire-and-forget task delivery, capability discovery, and
//! the shared server every agent binary runs.

mod client;
mod registry;
mod server;
mod sinks;
mod types;

pub use client::A2aClient;
pub use registry::AgentRegistry;
pub use server::{build_router, serve_with_graceful_shutdown, ServerConfig, TaskHandler};
pub use sinks::{A2aAuditSink, A2aNotificationSink};
pub use types::{AgentCapability, AgentCard, HealthResponse, TaskRequest, TaskResponse, TaskState};
