//! Protection tunnel provisioning: DETECT → BUILD → CREATE → VERIFY → STEER
//! → RETURN (spec §4.5), grounded in
//! `original_source/agents/tunnel_provisioning/tools/{bsid_allocator,sr_policy_builder,tunnel_creator}.py`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain_types::{BindingIdentifier, BindingSid, NodeId, PathType, Srv6Locator, TeType, TunnelId};
use crate::error::A2aError;
use crate::store::{keys, IncidentStore};

/// Inclusive SR-MPLS binding-SID allocation range (spec §4.5, §8 invariant 2).
pub const SR_MPLS_BSID_RANGE: std::ops::RangeInclusive<u32> = 24_000..=24_999;

/// Locator prefix for allocated SRv6 binding-SIDs, grounded in
/// `original_source/agents/tunnel_provisioning/tools/bsid_allocator.py`'s
/// `SRV6_BSID_PREFIX`.
pub const SRV6_BSID_PREFIX: &str = "fc00:0:ffff::";

/// TTL for an in-flight BSID assignment record, long enough to outlive a
/// full create-verify-steer attempt and its retries.
const ASSIGNMENT_TTL: Duration = Duration::from_secs(600);

/// Operational status of a tunnel as reported by the controller (spec
/// §4.5 "VERIFY").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalStatus {
    /// Controller confirms the tunnel is forwarding traffic.
    Up,
    /// Controller reports the tunnel is not yet, or no longer, up.
    Down,
    /// Controller has not converged an answer within the poll budget.
    Unknown,
}

/// Desired configuration for a protection tunnel (spec §4.5 "BUILD").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Human-readable name: `protection-{incident_id}`.
    pub name: String,
    /// Technology this tunnel uses.
    pub te_type: TeType,
    /// Head-end node.
    pub head_end: NodeId,
    /// Tail-end node.
    pub end_point: NodeId,
    /// Allocated binding identifier (numeric MPLS label or SRv6 locator,
    /// depending on `te_type`).
    pub binding: BindingIdentifier,
    /// Steering color, minted from a random 100-range (spec §4.5 "BUILD").
    pub color: u32,
    /// Explicit hop list, present only when `path_type` is `Explicit`.
    pub explicit_hops: Option<Vec<NodeId>>,
    /// How the path's hops were requested.
    pub path_type: PathType,
}

/// Result of a provisioning attempt (spec §4.5 "RETURN").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunnelResult {
    /// Whether the tunnel is up and steering traffic.
    pub success: bool,
    /// The provisioned tunnel's identifier, if successful.
    pub tunnel_id: Option<TunnelId>,
    /// The allocated binding identifier, if successful.
    pub binding: Option<BindingIdentifier>,
    /// The technology used.
    pub te_type: TeType,
    /// The tunnel's operational status after VERIFY.
    pub operational_status: OperationalStatus,
    /// Failure description, if any.
    pub error: Option<String>,
}

/// The controller boundary a tunnel is created, verified, and removed
/// through (spec §4.5, `NorthboundControllerClient`).
#[async_trait]
pub trait TunnelControllerSource: Send + Sync {
    /// Requests tunnel creation. Returns the controller-assigned tunnel ID.
    async fn create_tunnel(&self, config: &TunnelConfig) -> Result<TunnelId, A2aError>;

    /// Polls the tunnel's current operational status.
    async fn verify_tunnel(&self, tunnel_id: TunnelId) -> Result<OperationalStatus, A2aError>;

    /// Requests tunnel deletion.
    async fn delete_tunnel(&self, tunnel_id: TunnelId) -> Result<(), A2aError>;

    /// Returns the head-end's reported TE-type capabilities, most-preferred
    /// first, used by DETECT when neither the request nor a supporting
    /// service names one.
    async fn device_capabilities(&self, head_end: &NodeId) -> Result<Vec<TeType>, A2aError>;
}

/// Chooses the TE type for a new protection tunnel (spec §4.5 "DETECT"):
/// the caller's explicit request, else the device's advertised
/// capabilities, else SR-MPLS.
pub async fn detect_te_type(
    controller: &dyn TunnelControllerSource,
    requested: Option<TeType>,
    head_end: &NodeId,
) -> Result<TeType, A2aError> {
    if let Some(te_type) = requested {
        return Ok(te_type);
    }
    let capabilities = controller.device_capabilities(head_end).await?;
    Ok(capabilities.into_iter().next().unwrap_or(TeType::SrMpls))
}

/// Allocates a numeric binding-SID at `head_end` for SR-MPLS/RSVP-TE:
/// prefers the released free-set over minting a new value from the counter
/// (spec §8 idempotence law "re-allocate prefers free-set over counter").
///
/// # Errors
///
/// Returns [`A2aError::Downstream`] if the head-end's counter has
/// exhausted [`SR_MPLS_BSID_RANGE`].
pub async fn allocate_bsid(store: &dyn IncidentStore, head_end: &NodeId) -> Result<BindingSid, A2aError> {
    if let Some(freed) = store.set_pop(&keys::bsid_free(head_end.as_ref())).await.map_err(to_downstream)? {
        let value: u32 = freed.parse().map_err(|_| downstream("corrupt bsid free-set entry"))?;
        return BindingSid::try_new(value).map_err(|_| downstream("corrupt bsid free-set entry"));
    }

    let next = store.incr(&keys::bsid_counter(head_end.as_ref()), None).await.map_err(to_downstream)?;
    let value = u32::try_from(next).unwrap_or(u32::MAX) - 1 + *SR_MPLS_BSID_RANGE.start();
    if !SR_MPLS_BSID_RANGE.contains(&value) {
        return Err(downstream(&format!("bsid pool exhausted at head-end {head_end}")));
    }
    BindingSid::try_new(value).map_err(|_| downstream("bsid counter overflowed its valid range"))
}

/// Allocates a textual SRv6 locator at `head_end`. Grounded in
/// `bsid_allocator.py`'s `allocate_srv6_bsid`: a per-head-end counter with
/// no free-set reuse (SRv6 locators are not returned to a pool on delete,
/// unlike the numeric MPLS range).
///
/// # Errors
///
/// Returns [`A2aError::Downstream`] if the store operation fails.
pub async fn allocate_srv6_locator(store: &dyn IncidentStore, head_end: &NodeId) -> Result<Srv6Locator, A2aError> {
    let next = store.incr(&keys::bsid_srv6_counter(head_end.as_ref()), None).await.map_err(to_downstream)?;
    Srv6Locator::try_new(format!("{SRV6_BSID_PREFIX}{next:x}")).map_err(|_| downstream("srv6 locator counter overflowed its valid length"))
}

/// Allocates whichever binding identifier `te_type` requires: a numeric
/// MPLS label for [`TeType::SrMpls`]/[`TeType::RsvpTe`], or a textual SRv6
/// locator for [`TeType::Srv6`] (spec §3).
pub async fn allocate_binding(store: &dyn IncidentStore, head_end: &NodeId, te_type: TeType) -> Result<BindingIdentifier, A2aError> {
    match te_type {
        TeType::SrMpls | TeType::RsvpTe => Ok(BindingIdentifier::Mpls(allocate_bsid(store, head_end).await?)),
        TeType::Srv6 => Ok(BindingIdentifier::Srv6(allocate_srv6_locator(store, head_end).await?)),
    }
}

/// Returns `bsid` to `head_end`'s free-set (spec §4.5 "deletion ... THEN
/// return BSID to free-set").
pub async fn release_bsid(store: &dyn IncidentStore, head_end: &NodeId, bsid: BindingSid) -> Result<(), A2aError> {
    store.set_add(&keys::bsid_free(head_end.as_ref()), &bsid.to_string()).await.map_err(to_downstream)
}

/// Releases `binding` back to its pool, branching by technology. SRv6
/// locators are counter-allocated with no free-set (see
/// [`allocate_srv6_locator`]), so releasing one is a no-op; only numeric
/// MPLS labels return to a reusable free-set.
pub async fn release_binding(store: &dyn IncidentStore, head_end: &NodeId, binding: &BindingIdentifier) -> Result<(), A2aError> {
    match binding {
        BindingIdentifier::Mpls(bsid) => release_bsid(store, head_end, *bsid).await,
        BindingIdentifier::Srv6(_) => Ok(()),
    }
}

fn to_downstream(err: crate::store::StoreError) -> A2aError {
    downstream(&err.to_string())
}

fn downstream(message: &str) -> A2aError {
    A2aError::Downstream { agent: "incident-store".to_string(), message: message.to_string() }
}

/// Reads back the binding identifier previously assigned to `incident_id`,
/// if a prior attempt reached BUILD before failing (spec §8 idempotence
/// law).
async fn existing_assignment(store: &dyn IncidentStore, incident_id: &str) -> Result<Option<BindingIdentifier>, A2aError> {
    let value = store.get_json(&keys::bsid_assignment(incident_id)).await.map_err(to_downstream)?;
    let Some(value) = value else { return Ok(None) };
    serde_json::from_value(value).map(Some).map_err(|e| downstream(&e.to_string()))
}

async fn record_assignment(store: &dyn IncidentStore, incident_id: &str, binding: &BindingIdentifier) -> Result<(), A2aError> {
    store
        .set_json(&keys::bsid_assignment(incident_id), &json!(binding), Some(ASSIGNMENT_TTL))
        .await
        .map_err(to_downstream)
}

/// Provisions a protection tunnel for `incident_id`, running DETECT →
/// BUILD → CREATE → VERIFY → STEER (spec §4.5).
///
/// Idempotent per `incident_id`: a retried call for the same incident
/// reuses the previously allocated BSID rather than minting a second one
/// (spec §8). The caller (Orchestrator) is responsible for the retry-count
/// policy across repeated calls to this function; this function itself
/// makes exactly one controller create attempt and one verify poll loop.
///
/// # Errors
///
/// Propagates a transport-level failure from `controller` or `store`
/// immediately; a create/verify failure is instead reported as
/// `TunnelResult { success: false, .. }` so the caller can apply its own
/// retry policy.
#[allow(clippy::too_many_arguments)]
pub async fn provision_tunnel(
    controller: &dyn TunnelControllerSource,
    store: &dyn IncidentStore,
    incident_id: &str,
    requested_te_type: Option<TeType>,
    head_end: NodeId,
    end_point: NodeId,
    explicit_hops: Option<Vec<NodeId>>,
    path_type: PathType,
    verify_poll_interval: Duration,
    verify_max_attempts: u32,
) -> Result<TunnelResult, A2aError> {
    let te_type = detect_te_type(controller, requested_te_type, &head_end).await?;

    let binding = match existing_assignment(store, incident_id).await? {
        Some(binding) => binding,
        None => {
            let binding = allocate_binding(store, &head_end, te_type).await?;
            record_assignment(store, incident_id, &binding).await?;
            binding
        }
    };

    let config = TunnelConfig {
        name: format!("protection-{incident_id}"),
        te_type,
        head_end: head_end.clone(),
        end_point,
        binding: binding.clone(),
        color: 100 + rand::random::<u32>() % 100,
        explicit_hops: if matches!(path_type, PathType::Explicit) { explicit_hops } else { None },
        path_type,
    };

    let tunnel_id = match controller.create_tunnel(&config).await {
        Ok(id) => id,
        Err(err @ A2aError::Transport { .. }) => return Err(err),
        Err(err) => {
            return Ok(TunnelResult {
                success: false,
                tunnel_id: None,
                binding: Some(binding),
                te_type,
                operational_status: OperationalStatus::Unknown,
                error: Some(err.to_string()),
            })
        }
    };

    let mut status = OperationalStatus::Unknown;
    for _ in 0..verify_max_attempts {
        status = controller.verify_tunnel(tunnel_id).await?;
        if status == OperationalStatus::Up {
            break;
        }
        tokio::time::sleep(verify_poll_interval).await;
    }

    if status != OperationalStatus::Up {
        return Ok(TunnelResult {
            success: false,
            tunnel_id: Some(tunnel_id),
            binding: Some(binding),
            te_type,
            operational_status: status,
            error: Some("tunnel did not reach operational status up".to_string()),
        });
    }

    Ok(TunnelResult {
        success: true,
        tunnel_id: Some(tunnel_id),
        binding: Some(binding),
        te_type,
        operational_status: OperationalStatus::Up,
        error: None,
    })
}

/// Tears down a protection tunnel: delete at the controller, THEN return
/// its BSID to the free-set (spec §4.5 "deletion ... order matters to
/// avoid double-allocation").
///
/// # Errors
///
/// Propagates a controller deletion failure without releasing the BSID,
/// so a failed delete never frees a binding-SID still bound at the
/// head-end.
pub async fn delete_protection_tunnel(
    controller: &dyn TunnelControllerSource,
    store: &dyn IncidentStore,
    incident_id: &str,
    head_end: &NodeId,
    tunnel_id: TunnelId,
    binding: BindingIdentifier,
) -> Result<(), A2aError> {
    controller.delete_tunnel(tunnel_id).await?;
    release_binding(store, head_end, &binding).await?;
    store.delete(&keys::bsid_assignment(incident_id)).await.map_err(to_downstream)?;
    Ok(())
}
