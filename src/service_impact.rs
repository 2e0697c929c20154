//! Service-impact assessment: QUERY_SERVICES → ANALYZE_IMPACT → ENRICH_SLA →
//! RETURN_AFFECTED (spec §4.4), grounded in
//! `original_source/agents/service_impact/{tools,nodes,schemas}/*.py`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain_types::{IncidentId, LinkId, SlaTier, TeType};
use crate::error::A2aError;

/// A service endpoint as reported by the topology/service-health source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// PE router name.
    pub device_name: String,
    /// PE router management IP.
    pub device_ip: String,
    /// Customer-facing interface name.
    pub interface_name: String,
    /// VRF name, for L3VPN services.
    pub vrf_name: Option<String>,
    /// VLAN ID, for L2VPN services.
    pub vlan_id: Option<u16>,
}

/// Service technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// Layer-3 VPN.
    L3vpn,
    /// Layer-2 VPN.
    L2vpn,
    /// Ethernet VPN.
    Evpn,
    /// Point-to-point.
    P2p,
}

/// Raw service record as returned by the service-health query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetails {
    /// Unique service identifier.
    pub service_id: String,
    /// Human-readable service name.
    pub service_name: String,
    /// Service technology.
    pub service_type: ServiceType,
    /// A-side endpoint.
    pub endpoint_a: ServiceEndpoint,
    /// Z-side endpoint.
    pub endpoint_z: ServiceEndpoint,
    /// Owning customer identifier.
    pub customer_id: String,
    /// Owning customer name.
    pub customer_name: String,
    /// Contracted SLA tier.
    pub sla_tier: SlaTier,
    /// Currently active traffic-engineering technology.
    pub current_te_type: TeType,
    /// Ordered link IDs the service's current path traverses.
    pub current_path: Vec<LinkId>,
    /// Whether an alternate path exists independent of `current_path`.
    pub redundancy_available: bool,
}

/// How badly a degraded link set affects a given service (spec §4.4 step
/// 2, `ImpactAnalyzer.IMPACT_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    /// Every link on the service's path is degraded and no redundancy
    /// exists.
    FullOutage,
    /// Some of the service's path is degraded, or redundancy exists.
    Degraded,
    /// None of the degraded links fall on the service's known path.
    AtRisk,
}

/// An affected service enriched with SLA tier and computed priority
/// (spec §4.4 step 3, `AffectedService`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedService {
    /// Unique service identifier.
    pub service_id: String,
    /// Human-readable service name.
    pub service_name: String,
    /// Service technology.
    pub service_type: ServiceType,
    /// A-side PE router name.
    pub endpoint_a: String,
    /// Z-side PE router name.
    pub endpoint_z: String,
    /// Owning customer identifier.
    pub customer_id: String,
    /// Owning customer name.
    pub customer_name: String,
    /// Contracted SLA tier.
    pub sla_tier: SlaTier,
    /// Currently active traffic-engineering technology.
    pub current_te_type: TeType,
    /// Ordered link IDs the service's current path traverses.
    pub current_path: Vec<LinkId>,
    /// Computed impact level.
    pub impact_level: ImpactLevel,
    /// Whether an alternate path exists.
    pub redundancy_available: bool,
    /// The degraded link this service was matched against.
    pub affected_by_link: LinkId,
    /// Lower is higher priority: `tier_weight * 1000 - impact_multiplier`
    /// (spec §4.4 step 3, `SLAEnricher.enrich_service`).
    pub priority_score: i32,
}

/// Response handed back to the Orchestrator (spec §4.4 step 4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceImpactResponse {
    /// The incident this assessment is for.
    pub incident_id: IncidentId,
    /// Total number of services found to be affected.
    pub total_affected: usize,
    /// Count of affected services per SLA tier.
    pub services_by_tier: std::collections::BTreeMap<String, usize>,
    /// Count of affected services per service type.
    pub services_by_type: std::collections::BTreeMap<String, usize>,
    /// Affected services, sorted by ascending `priority_score` (highest
    /// priority first).
    pub affected_services: Vec<AffectedService>,
    /// The highest (numerically lowest-weight) tier among affected
    /// services, if any.
    pub highest_priority_tier: Option<SlaTier>,
    /// Whether any affected service's tier is configured for automatic
    /// protection.
    pub auto_protect_required: bool,
}

/// Source of service-topology data, queried per degraded link (spec §4.4
/// step 1, `CNCServiceHealthClient`).
#[async_trait]
pub trait ServiceHealthSource: Send + Sync {
    /// Returns every service whose current path includes `link_id`.
    async fn services_by_link(&self, link_id: &LinkId) -> Result<Vec<ServiceDetails>, A2aError>;
}

/// Tiers configured for automatic protection without waiting on a human
/// (spec §4.4, `SLA_TIER_CONFIG[...]  ["auto_protect"]`). Bronze is
/// excluded; all others default to `true`.
fn tier_auto_protects(tier: SlaTier) -> bool {
    !matches!(tier, SlaTier::Bronze)
}

fn impact_multiplier(level: ImpactLevel) -> i32 {
    match level {
        ImpactLevel::FullOutage => 100,
        ImpactLevel::Degraded => 50,
        ImpactLevel::AtRisk => 10,
    }
}

fn analyze_service_impact(service: &ServiceDetails, degraded_links: &[LinkId]) -> (ImpactLevel, LinkId) {
    let affected: Vec<&LinkId> = degraded_links.iter().filter(|link| service.current_path.contains(link)).collect();

    let level = if affected.is_empty() {
        ImpactLevel::AtRisk
    } else if affected.len() == service.current_path.len().max(1) && !service.redundancy_available {
        ImpactLevel::FullOutage
    } else {
        ImpactLevel::Degraded
    };

    let affected_by_link = affected.first().copied().cloned().unwrap_or_else(|| {
        degraded_links.first().cloned().expect("caller only analyzes services against a non-empty degraded-link set")
    });

    (level, affected_by_link)
}

fn enrich(service: ServiceDetails, degraded_links: &[LinkId]) -> AffectedService {
    let (impact_level, affected_by_link) = analyze_service_impact(&service, degraded_links);
    let priority_score = i32::from(service.sla_tier.tier_weight()) * 1000 - impact_multiplier(impact_level);

    AffectedService {
        service_id: service.service_id,
        service_name: service.service_name,
        service_type: service.service_type,
        endpoint_a: service.endpoint_a.device_name,
        endpoint_z: service.endpoint_z.device_name,
        customer_id: service.customer_id,
        customer_name: service.customer_name,
        sla_tier: service.sla_tier,
        current_te_type: service.current_te_type,
        current_path: service.current_path,
        impact_level,
        redundancy_available: service.redundancy_available,
        affected_by_link,
        priority_score,
    }
}

/// Runs the full service-impact assessment for an incident's degraded
/// links.
///
/// Queries every degraded link, de-duplicates by `service_id`, scores and
/// sorts by priority (ascending `priority_score` — highest priority
/// first), and aggregates tier/auto-protect summaries (spec §4.4).
///
/// # Errors
///
/// Propagates the first query failure from `source`.
pub async fn assess_impact(
    source: &dyn ServiceHealthSource,
    incident_id: IncidentId,
    degraded_links: &[LinkId],
) -> Result<ServiceImpactResponse, A2aError> {
    let mut seen = std::collections::HashSet::new();
    let mut raw_services = Vec::new();

    for link in degraded_links {
        for service in source.services_by_link(link).await? {
            if seen.insert(service.service_id.clone()) {
                raw_services.push(service);
            }
        }
    }

    let mut affected_services: Vec<AffectedService> =
        raw_services.into_iter().map(|service| enrich(service, degraded_links)).collect();
    affected_services.sort_by_key(|s| s.priority_score);

    let mut services_by_tier: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
    let mut services_by_type: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
    let mut auto_protect_required = false;
    for service in &affected_services {
        *services_by_tier.entry(format!("{:?}", service.sla_tier).to_lowercase()).or_insert(0) += 1;
        *services_by_type.entry(format!("{:?}", service.service_type).to_lowercase()).or_insert(0) += 1;
        if tier_auto_protects(service.sla_tier) {
            auto_protect_required = true;
        }
    }

    let highest_priority_tier = affected_services.first().map(|s| s.sla_tier);

    Ok(ServiceImpactResponse {
        incident_id,
        total_affected: affected_services.len(),
        services_by_tier,
        services_by_type,
        affected_services,
        highest_priority_tier,
        auto_protect_required,
    })
}
