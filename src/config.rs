//! Per-agent process configuration.
//!
//! spec §1 places "YAML configuration loading" out of scope; no loader is
//! introduced here. Instead every agent binary takes a `clap::Parser`
//! `--flag`/`env` struct, grounded in `groblegark-coop`'s
//! `crates/cli/src/config.rs` (the teacher's own `AppConfig` reference in
//! `server.rs` is a dangling stub with no body to imitate).

use clap::Parser;
use std::path::PathBuf;

/// Configuration shared by every A2A agent binary (spec §6 HTTP surface,
/// §4.1 store backing, §4.2 peer registry).
#[derive(Debug, Parser, Clone)]
#[command(name = "netprotect-agent", version, about)]
pub struct AgentConfig {
    /// Host address to bind the A2A HTTP server to.
    #[arg(long, env = "NETPROTECT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the A2A HTTP server to.
    #[arg(long, env = "NETPROTECT_PORT", default_value = "8080")]
    pub port: u16,

    /// Path to the `SQLite` incident store database file. `:memory:` for an
    /// ephemeral, process-local store.
    #[arg(long, env = "NETPROTECT_STORE_PATH", default_value = "netprotect.db")]
    pub store_path: PathBuf,

    /// Path to a JSON file mapping agent name to base URL (spec §4.2
    /// "static name→URL registry"). Each key/value pair becomes a registry
    /// entry; see [`crate::a2a::AgentRegistry::load_from_file`].
    #[arg(long, env = "NETPROTECT_AGENT_REGISTRY")]
    pub agent_registry: Option<PathBuf>,

    /// Default per-call A2A task timeout in seconds, used when a caller
    /// does not specify one.
    #[arg(long, env = "NETPROTECT_DEFAULT_TIMEOUT_SECS", default_value = "30")]
    pub default_timeout_secs: u64,

    /// Grace period in seconds a process waits for in-flight tasks to
    /// finish after SIGTERM before forcing exit (spec §6 "Exit codes").
    #[arg(long, env = "NETPROTECT_SHUTDOWN_GRACE_SECS", default_value = "30")]
    pub shutdown_grace_secs: u64,
}

/// Base URLs for the external systems the core's collaborator traits relay
/// to (spec §1 non-goals: this crate is not the topology database, the
/// controller, or the measurement collector — it only calls out to them).
/// Flattened into whichever binary needs a subset of these; an agent that
/// doesn't use a given collaborator simply never reads that field.
#[derive(Debug, Parser, Clone)]
pub struct CollaboratorConfig {
    /// Base URL of the service-health / topology query system (Service
    /// Impact, Path Computer).
    #[arg(long, env = "NETPROTECT_TOPOLOGY_URL", default_value = "http://localhost:9001")]
    pub topology_url: String,

    /// Base URL of the northbound SDN controller (Tunnel Provisioner,
    /// Restoration Monitor's cutover weights).
    #[arg(long, env = "NETPROTECT_CONTROLLER_URL", default_value = "http://localhost:9002")]
    pub controller_url: String,

    /// Base URL of the SLA measurement collector (Restoration Monitor).
    #[arg(long, env = "NETPROTECT_MEASUREMENT_URL", default_value = "http://localhost:9003")]
    pub measurement_url: String,
}

impl AgentConfig {
    /// The socket address to bind the HTTP server to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not a valid IP address.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}
