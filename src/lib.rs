//! # Network Protection Control Plane
//!
//! A multi-agent control plane for carrier-backbone customer-experience
//! protection: alert correlation, service-impact assessment, constraint-based
//! path computation, tunnel provisioning, restoration monitoring, and
//! orchestration, cooperating over an HTTP-based agent-to-agent (A2A) task
//! protocol.
//!
//! ## Architecture
//!
//! Each concern lives in its own module and is independently runnable as a
//! standalone agent binary (`src/bin/*.rs`), communicating only through
//! [`a2a`] task requests and the shared [`store::IncidentStore`] — no module
//! reaches into another's private state.

pub mod a2a;
pub mod alert;
pub mod collaborators;
pub mod config;
pub mod correlator;
pub mod domain_types;
pub mod error;
pub mod incident;
pub mod notification;
pub mod observability;
pub mod orchestrator;
pub mod path_computer;
pub mod restoration;
pub mod runtime;
pub mod service_impact;
pub mod store;
pub mod tunnel;

pub use error::CoreError;
