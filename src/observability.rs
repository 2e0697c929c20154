//! Structured logging setup shared by every agent binary.
//!
//! spec §1 places "structured-logging setup" out of scope as plumbing, but
//! every process in this corpus still needs one; this follows the teacher's
//! `tracing` + `tracing-subscriber` initialization in `main.rs`, generalized
//! to take the agent's own name as its default directive.

use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber for an agent process.
///
/// Honors `RUST_LOG` if set; otherwise defaults the named agent module and
/// the rest of `netprotect` to `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
pub fn init_tracing(agent_name: &str) {
    let default_directive = format!("{agent_name}=info,netprotect=info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .init();
}
