//! Restoration monitoring and cutover: POLL → CHECK → START_TIMER → WAIT →
//! VERIFY → (RESET | CUTOVER → (VERIFY | CLEANUP → RETURN)) (spec §4.6,
//! §4.7), grounded in
//! `original_source/agents/restoration_monitor/{nodes,tools}/*.py`
//! (`hold_timer.py`, `cutover.py`, `verify_node.py`, `cutover_node.py`,
//! `cleanup_node.py`, `conditions.py`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::domain_types::{BindingIdentifier, CutoverMode, NodeId, SlaTier, TunnelId, Weight};
use crate::error::A2aError;
use crate::store::IncidentStore;
use crate::tunnel::TunnelControllerSource;

/// Number of consecutive good samples required to verify stability (spec
/// §4.6 "VERIFY: 3 consecutive good samples").
const STABILITY_CHECK_COUNT: u32 = 3;
/// Default spacing between POLL samples while waiting for recovery.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Default cap on POLL attempts before giving up (spec §4.6 "Termination").
const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 100;
/// Seconds between gradual-cutover weight stages (spec §4.7).
const STAGE_INTERVAL_SECONDS: u64 = 60;

/// Staged ECMP weight migration, (protection, original) pairs, applied in
/// order (spec §4.7).
const GRADUAL_STAGES: [(u8, u8); 4] = [(75, 25), (50, 50), (25, 75), (0, 100)];

/// One SLA sample taken against a candidate path (spec §4.6 "POLL").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlaSample {
    /// Whether every metric fell within the tier's thresholds.
    pub within_thresholds: bool,
    /// Observed latency, for diagnostics.
    pub latency_ms: Option<f64>,
    /// Observed jitter, for diagnostics.
    pub jitter_ms: Option<f64>,
    /// Observed loss ratio, for diagnostics.
    pub loss_ratio: Option<f64>,
}

/// Endpoints a restoration monitor samples the SLA of (spec §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathEndpoints {
    /// Head-end node of the original (pre-incident) path.
    pub source: NodeId,
    /// Tail-end node of the original path.
    pub destination: NodeId,
}

/// SLA telemetry source queried during POLL and VERIFY (spec §4.6,
/// `PCAClient.verify_stability`).
#[async_trait]
pub trait SlaProbe: Send + Sync {
    /// Samples the original path's current SLA against `sla_tier`'s
    /// thresholds.
    async fn sample(&self, endpoints: &PathEndpoints, sla_tier: SlaTier) -> Result<SlaSample, A2aError>;
}

/// Controller boundary for applying ECMP weight splits between the
/// protection and original paths during cutover (spec §4.7,
/// `CNCTrafficSteeringClient`).
#[async_trait]
pub trait TrafficWeightController: Send + Sync {
    /// Sets the traffic split at `protection_tunnel_id`'s head-end.
    async fn set_weights(&self, protection_tunnel_id: TunnelId, protection_weight: Weight, original_weight: Weight) -> Result<(), A2aError>;
}

/// Outcome of the full restoration-monitor run (spec §4.6 "RETURN").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestorationOutcome {
    /// Whether the original path was restored and the protection tunnel
    /// torn down.
    pub restored: bool,
    /// The hold-timer duration used, by tier.
    pub hold_timer_seconds: u64,
    /// The cutover strategy used.
    pub cutover_mode: CutoverMode,
    /// Whether the protection tunnel was deleted.
    pub tunnel_deleted: bool,
    /// Total time the protection tunnel was in service, in seconds.
    pub total_protection_duration_seconds: u64,
    /// Present when `restored` is `false`: why monitoring gave up.
    pub timeout_reason: Option<String>,
}

/// Polls `probe` every `poll_interval` until a sample falls within
/// thresholds (spec §4.6 "POLL"/"CHECK"), or `max_attempts` is reached.
///
/// Returns the number of samples taken and whether the last one recovered
/// (`Ok((_, true))`), or `Ok((max_attempts, false))` if the cap is hit
/// first without ever recovering.
async fn poll_until_recovered(
    probe: &dyn SlaProbe,
    endpoints: &PathEndpoints,
    sla_tier: SlaTier,
    poll_interval: Duration,
    max_attempts: u32,
) -> Result<(u32, bool), A2aError> {
    for attempt in 1..=max_attempts {
        if probe.sample(endpoints, sla_tier).await?.within_thresholds {
            return Ok((attempt, true));
        }
        tokio::time::sleep(poll_interval).await;
    }
    Ok((max_attempts, false))
}

/// Runs the hold timer: waits `tier.hold_timer_seconds()`, sampling every
/// `poll_interval` along the way. Returns `Ok(true)` if the hold elapsed
/// without regression, `Ok(false)` if SLA degraded and the timer was
/// cancelled (spec §4.6 "WAIT ... if the SLA degrades during WAIT, the
/// timer is cancelled and control returns to POLL").
///
/// Cancellation-aware: returns `Ok(false)` immediately if `cancel` fires,
/// so a shutting-down agent does not block the hold out.
async fn wait_hold_timer(
    probe: &dyn SlaProbe,
    endpoints: &PathEndpoints,
    sla_tier: SlaTier,
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> Result<bool, A2aError> {
    let hold_duration = Duration::from_secs(sla_tier.hold_timer_seconds());
    let mut elapsed = Duration::ZERO;

    while elapsed < hold_duration {
        let step = poll_interval.min(hold_duration - elapsed);
        tokio::select! {
            () = cancel.cancelled() => return Ok(false),
            () = tokio::time::sleep(step) => {}
        }
        elapsed += step;

        if !probe.sample(endpoints, sla_tier).await?.within_thresholds {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Verifies stability with [`STABILITY_CHECK_COUNT`] consecutive good
/// samples spaced by `tier.stability_check_seconds()` (spec §4.6 "VERIFY").
/// Any failing sample restarts the caller's monitor loop from POLL.
async fn verify_stability(probe: &dyn SlaProbe, endpoints: &PathEndpoints, sla_tier: SlaTier) -> Result<bool, A2aError> {
    let spacing = Duration::from_secs(sla_tier.stability_check_seconds());
    for check in 0..STABILITY_CHECK_COUNT {
        if check > 0 {
            tokio::time::sleep(spacing).await;
        }
        if !probe.sample(endpoints, sla_tier).await?.within_thresholds {
            return Ok(false);
        }
    }
    Ok(true)
}

fn weight(value: u8) -> Weight {
    Weight::try_new(value).expect("gradual cutover stages are hard-coded within 0..=100")
}

/// Performs an immediate cutover: a single weight update from full
/// protection to full original (spec §4.7 "Immediate"). Escalates to the
/// caller on controller failure rather than retrying.
async fn execute_immediate_cutover(weights: &dyn TrafficWeightController, protection_tunnel_id: TunnelId) -> Result<(), A2aError> {
    weights.set_weights(protection_tunnel_id, Weight::zero(), Weight::full()).await
}

/// Performs a staged ECMP migration through [`GRADUAL_STAGES`], re-verifying
/// the original path's SLA between stages and rolling back one stage on
/// regression (spec §4.7 "Gradual").
///
/// Returns `Ok(true)` once every stage has committed. Returns `Ok(false)`
/// if a regression was detected and rolled back — the caller returns to
/// POLL without tearing down the protection tunnel (spec §4.7, and the
/// `cutover_node.py` gradual-failure branch, which re-enters
/// verification rather than unwinding all the way to the outer poll).
async fn execute_gradual_cutover(
    weights: &dyn TrafficWeightController,
    probe: &dyn SlaProbe,
    endpoints: &PathEndpoints,
    sla_tier: SlaTier,
    protection_tunnel_id: TunnelId,
    cancel: &CancellationToken,
) -> Result<bool, A2aError> {
    let mut previous = GRADUAL_STAGES[0];

    for (index, &(protection, original)) in GRADUAL_STAGES.iter().enumerate() {
        weights.set_weights(protection_tunnel_id, weight(protection), weight(original)).await?;

        if index + 1 < GRADUAL_STAGES.len() {
            tokio::select! {
                () = cancel.cancelled() => return Ok(false),
                () = tokio::time::sleep(Duration::from_secs(STAGE_INTERVAL_SECONDS)) => {}
            }

            if !probe.sample(endpoints, sla_tier).await?.within_thresholds {
                weights.set_weights(protection_tunnel_id, weight(previous.0), weight(previous.1)).await?;
                return Ok(false);
            }
        }

        previous = (protection, original);
    }

    Ok(true)
}

/// Runs the full restoration monitor for one incident's protection tunnel
/// (spec §4.6, §4.7).
///
/// Implements POLL → CHECK → START_TIMER → WAIT → VERIFY →
/// (RESET | CUTOVER → (VERIFY | CLEANUP → RETURN)). A WAIT regression or
/// a failed VERIFY sample restarts the loop from POLL; a failed gradual
/// cutover stage rolls back one stage and also restarts from POLL,
/// without deleting the protection tunnel.
///
/// # Errors
///
/// Propagates any transport-level failure from `probe`, `weights`, or
/// `tunnel_controller` immediately; logic exhaustion (poll-attempt cap
/// reached) is reported as `RestorationOutcome { restored: false, .. }`,
/// not an error, so the Orchestrator can apply its own escalation policy.
#[allow(clippy::too_many_arguments)]
pub async fn monitor_restoration(
    probe: &dyn SlaProbe,
    weights: &dyn TrafficWeightController,
    tunnel_controller: &dyn TunnelControllerSource,
    store: &dyn IncidentStore,
    cancel: &CancellationToken,
    incident_id: &str,
    endpoints: PathEndpoints,
    sla_tier: SlaTier,
    cutover_mode: CutoverMode,
    protection_head_end: NodeId,
    protection_tunnel_id: TunnelId,
    protection_binding_sid: BindingIdentifier,
    tunnel_provisioned_at: chrono::DateTime<chrono::Utc>,
    poll_interval: Duration,
    max_poll_attempts: u32,
) -> Result<RestorationOutcome, A2aError> {
    let hold_timer_seconds = sla_tier.hold_timer_seconds();
    let mut poll_attempts_used = 0u32;

    loop {
        let remaining_attempts = max_poll_attempts.saturating_sub(poll_attempts_used);
        if remaining_attempts == 0 {
            return Ok(RestorationOutcome {
                restored: false,
                hold_timer_seconds,
                cutover_mode,
                tunnel_deleted: false,
                total_protection_duration_seconds: protection_duration(tunnel_provisioned_at),
                timeout_reason: Some("poll attempt cap reached".to_string()),
            });
        }

        if cancel.is_cancelled() {
            return Ok(RestorationOutcome {
                restored: false,
                hold_timer_seconds,
                cutover_mode,
                tunnel_deleted: false,
                total_protection_duration_seconds: protection_duration(tunnel_provisioned_at),
                timeout_reason: Some("cancelled".to_string()),
            });
        }

        let (consumed, recovered) = poll_until_recovered(probe, &endpoints, sla_tier, poll_interval, remaining_attempts).await?;
        poll_attempts_used += consumed;
        if !recovered {
            continue;
        }

        if !wait_hold_timer(probe, &endpoints, sla_tier, poll_interval, cancel).await? {
            continue;
        }

        if !verify_stability(probe, &endpoints, sla_tier).await? {
            continue;
        }

        let cutover_succeeded = match cutover_mode {
            CutoverMode::Immediate => execute_immediate_cutover(weights, protection_tunnel_id).await.map(|()| true)?,
            CutoverMode::Gradual => execute_gradual_cutover(weights, probe, &endpoints, sla_tier, protection_tunnel_id, cancel).await?,
        };

        if !cutover_succeeded {
            continue;
        }

        crate::tunnel::delete_protection_tunnel(
            tunnel_controller,
            store,
            incident_id,
            &protection_head_end,
            protection_tunnel_id,
            protection_binding_sid,
        )
        .await?;

        return Ok(RestorationOutcome {
            restored: true,
            hold_timer_seconds,
            cutover_mode,
            tunnel_deleted: true,
            total_protection_duration_seconds: protection_duration(tunnel_provisioned_at),
            timeout_reason: None,
        });
    }
}

fn protection_duration(provisioned_at: chrono::DateTime<chrono::Utc>) -> u64 {
    (chrono::Utc::now() - provisioned_at).num_seconds().max(0) as u64
}
