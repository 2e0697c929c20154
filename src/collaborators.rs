//! HTTP-backed adapters for the external systems the core's collaborator
//! traits abstract over (topology source, service-health query, northbound
//! controller, measurement collector). Spec §1's non-goals keep this crate
//! from acting as the authoritative topology database or performing raw
//! measurement itself — these adapters only relay to whichever system
//! operates those, over plain JSON-over-HTTP, the same way [`crate::a2a`]
//! relays between agents.
//!
//! Every adapter does the minimum: serialize a request, `POST`/`GET` it,
//! deserialize the response, map transport failures to
//! [`A2aError::Transport`]. None of them retry — that policy lives in
//! [`crate::a2a::client::A2aClient`] for inter-agent calls; a collaborator
//! boundary is a simpler, single-attempt relay.

use async_trait::async_trait;

use crate::domain_types::{LinkId, NodeId, SlaTier, TeType, TunnelId, Weight};
use crate::error::A2aError;
use crate::path_computer::{ComputedPath, PathConstraints, PathQuerySource};
use crate::restoration::{PathEndpoints, SlaSample, SlaProbe, TrafficWeightController};
use crate::service_impact::{ServiceDetails, ServiceHealthSource};
use crate::tunnel::{OperationalStatus, TunnelConfig, TunnelControllerSource};

fn transport(agent: &str, err: reqwest::Error) -> A2aError {
    A2aError::Transport { agent: agent.to_string(), message: err.to_string() }
}

/// Queries a topology/service-health system over HTTP for the services
/// riding a given link (spec §4.4 step 1, `CNCServiceHealthClient`).
pub struct HttpServiceHealthSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpServiceHealthSource {
    /// Builds an adapter targeting `base_url` (no trailing slash expected).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[async_trait]
impl ServiceHealthSource for HttpServiceHealthSource {
    async fn services_by_link(&self, link_id: &LinkId) -> Result<Vec<ServiceDetails>, A2aError> {
        let url = format!("{}/services/by-link/{}", self.base_url, link_id.as_ref());
        let response = self.http.get(&url).send().await.map_err(|e| transport("service_health", e))?;
        response.json().await.map_err(|e| transport("service_health", e))
    }
}

/// Queries a topology source's path engine over HTTP (spec §4.4,
/// `KGDijkstraClient.compute_path`).
pub struct HttpPathQuerySource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPathQuerySource {
    /// Builds an adapter targeting `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[derive(serde::Serialize)]
struct ComputePathRequest<'a> {
    source: &'a NodeId,
    destination: &'a NodeId,
    constraints: &'a PathConstraints,
}

#[async_trait]
impl PathQuerySource for HttpPathQuerySource {
    async fn compute_path(
        &self,
        source: &NodeId,
        destination: &NodeId,
        constraints: &PathConstraints,
    ) -> Result<Option<ComputedPath>, A2aError> {
        let url = format!("{}/path/compute", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&ComputePathRequest { source, destination, constraints })
            .send()
            .await
            .map_err(|e| transport("path_computer_topology", e))?;
        response.json().await.map_err(|e| transport("path_computer_topology", e))
    }
}

/// Drives tunnel lifecycle calls against a northbound SDN controller over
/// HTTP (spec §4.5, `NorthboundControllerClient`).
pub struct HttpTunnelController {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTunnelController {
    /// Builds an adapter targeting `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[async_trait]
impl TunnelControllerSource for HttpTunnelController {
    async fn create_tunnel(&self, config: &TunnelConfig) -> Result<TunnelId, A2aError> {
        let url = format!("{}/tunnels", self.base_url);
        let response = self.http.post(&url).json(config).send().await.map_err(|e| transport("controller", e))?;
        #[derive(serde::Deserialize)]
        struct CreateResponse {
            tunnel_id: TunnelId,
        }
        let body: CreateResponse = response.json().await.map_err(|e| transport("controller", e))?;
        Ok(body.tunnel_id)
    }

    async fn verify_tunnel(&self, tunnel_id: TunnelId) -> Result<OperationalStatus, A2aError> {
        let url = format!("{}/tunnels/{}/status", self.base_url, tunnel_id);
        let response = self.http.get(&url).send().await.map_err(|e| transport("controller", e))?;
        response.json().await.map_err(|e| transport("controller", e))
    }

    async fn delete_tunnel(&self, tunnel_id: TunnelId) -> Result<(), A2aError> {
        let url = format!("{}/tunnels/{}", self.base_url, tunnel_id);
        self.http.delete(&url).send().await.map_err(|e| transport("controller", e))?;
        Ok(())
    }

    async fn device_capabilities(&self, head_end: &NodeId) -> Result<Vec<TeType>, A2aError> {
        let url = format!("{}/devices/{}/capabilities", self.base_url, head_end.as_ref());
        let response = self.http.get(&url).send().await.map_err(|e| transport("controller", e))?;
        response.json().await.map_err(|e| transport("controller", e))
    }
}

#[async_trait]
impl TrafficWeightController for HttpTunnelController {
    async fn set_weights(&self, protection_tunnel_id: TunnelId, protection_weight: Weight, original_weight: Weight) -> Result<(), A2aError> {
        let url = format!("{}/tunnels/{}/weights", self.base_url, protection_tunnel_id);
        self.http
            .post(&url)
            .json(&serde_json::json!({"protection_weight": protection_weight, "original_weight": original_weight}))
            .send()
            .await
            .map_err(|e| transport("controller", e))?;
        Ok(())
    }
}

/// Samples SLA telemetry from a measurement collector over HTTP (spec
/// §4.6, `PCAClient.verify_stability`).
pub struct HttpSlaProbe {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSlaProbe {
    /// Builds an adapter targeting `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[derive(serde::Serialize)]
struct SampleRequest<'a> {
    endpoints: &'a PathEndpoints,
    sla_tier: SlaTier,
}

#[async_trait]
impl SlaProbe for HttpSlaProbe {
    async fn sample(&self, endpoints: &PathEndpoints, sla_tier: SlaTier) -> Result<SlaSample, A2aError> {
        let url = format!("{}/sla/sample", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&SampleRequest { endpoints, sla_tier })
            .send()
            .await
            .map_err(|e| transport("measurement_collector", e))?;
        response.json().await.map_err(|e| transport("measurement_collector", e))
    }
}
