//! Domain types for the customer-experience protection control plane
//!
//! Strongly-typed identifiers and measures to keep incident handling,
//! tunnel provisioning, and correlation math free of primitive obsession.

use nutype::nutype;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an incident, minted by the Event Correlator.
///
/// Format: `INC-{yyyymmddHHMMSS}-{6 hex chars}`, time-ordered so lexical
/// sort matches creation order.
#[nutype(
    validate(predicate = |s: &str| s.starts_with("INC-") && s.len() >= 20),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRef)
)]
pub struct IncidentId(String);

impl IncidentId {
    /// Mints a new incident ID from a timestamp and random suffix.
    pub fn generate(now: chrono::DateTime<chrono::Utc>) -> Self {
        let suffix: u32 = rand::random::<u32>() & 0x00FF_FFFF;
        let id = format!("INC-{}-{suffix:06x}", now.format("%Y%m%d%H%M%S"));
        Self::try_new(id).expect("generated incident id always satisfies its own format")
    }
}

/// Identifier of a network link in the form used by the topology source.
#[nutype(
    validate(len_char_min = 1, len_char_max = 200),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRef)
)]
pub struct LinkId(String);

/// Identifier of a network node (head-end, tail-end, or waypoint).
#[nutype(
    validate(len_char_min = 1, len_char_max = 200),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRef)
)]
pub struct NodeId(String);

/// Client-chosen idempotency key for an A2A task.
#[nutype(derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From
))]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generates a fresh random task ID.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// Identifier correlating related alerts/tasks for distributed tracing.
#[nutype(derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From
))]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generates a fresh random correlation ID.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// Identifier of an alert as received from a source system.
#[nutype(
    validate(len_char_min = 1, len_char_max = 200),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRef)
)]
pub struct AlertId(String);

/// Identifier of a provisioned tunnel.
#[nutype(derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From
))]
pub struct TunnelId(Uuid);

impl TunnelId {
    /// Generates a fresh random tunnel ID.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// A binding-SID value. SR-MPLS values are numeric labels (24000-24999 by
/// default); SRv6 values are textual locators and are not modeled by this
/// type (see [`Srv6Locator`]).
#[nutype(
    validate(greater_or_equal = 0, less_or_equal = 1_048_575),
    derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, Into)
)]
pub struct BindingSid(u32);

/// Textual SRv6 locator, e.g. `fc00:0:ffff::1234`.
#[nutype(
    validate(len_char_min = 1, len_char_max = 64),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRef)
)]
pub struct Srv6Locator(String);

/// A tunnel's binding-SID, discriminated by technology (spec §3: "binding-SID
/// (numeric for MPLS, textual locator for SRv6)"). SR-MPLS and RSVP-TE
/// tunnels carry a numeric [`BindingSid`]; SRv6 tunnels carry a textual
/// [`Srv6Locator`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingIdentifier {
    /// Numeric MPLS label, also used for RSVP-TE (no SR dataplane distinct
    /// allocation scheme).
    Mpls(BindingSid),
    /// Textual SRv6 locator.
    Srv6(Srv6Locator),
}

impl std::fmt::Display for BindingIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mpls(bsid) => write!(f, "{bsid}"),
            Self::Srv6(locator) => write!(f, "{locator}"),
        }
    }
}

/// Alert / incident severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational threshold crossing, no immediate impact expected.
    Warning,
    /// Below protection threshold but SLA-relevant.
    Minor,
    /// Above protection threshold, requires prompt action.
    Major,
    /// Imminent or active customer impact.
    Critical,
}

/// Alert type — how the degradation was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Direct SLA metric crossed a configured threshold.
    ReactiveSla,
    /// Hard link/interface alarm (CNC-style).
    ReactiveAlarm,
    /// Forecast-derived predicted congestion.
    ProactivePrediction,
}

/// SLA service tier. Ordering reflects priority: platinum is highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaTier {
    /// Lowest commitment tier.
    Bronze,
    /// Standard commercial tier.
    Silver,
    /// Premium tier.
    Gold,
    /// Highest commitment tier.
    Platinum,
}

impl SlaTier {
    /// Numeric priority weight, bronze=1 .. platinum=4, used to break ties
    /// when ranking affected services.
    pub fn tier_weight(self) -> u8 {
        match self {
            Self::Bronze => 1,
            Self::Silver => 2,
            Self::Gold => 3,
            Self::Platinum => 4,
        }
    }

    /// Hold-timer duration for this tier (spec §4.6).
    pub fn hold_timer_seconds(self) -> u64 {
        match self {
            Self::Platinum => 60,
            Self::Gold => 120,
            Self::Silver => 180,
            Self::Bronze => 300,
        }
    }

    /// Spacing between stability-verification samples for this tier. Not
    /// named by spec §4.6's prose; carried over from the per-tier hold
    /// timer configuration the restoration monitor used upstream.
    pub fn stability_check_seconds(self) -> u64 {
        match self {
            Self::Platinum => 30,
            Self::Gold => 60,
            Self::Silver => 90,
            Self::Bronze => 120,
        }
    }
}

/// Tunnel / path technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeType {
    /// Segment Routing over MPLS data plane.
    SrMpls,
    /// Segment Routing over IPv6 data plane.
    Srv6,
    /// RSVP Traffic Engineering.
    RsvpTe,
}

/// How a path's explicit hops were requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    /// Let the controller choose intermediate hops.
    Loose,
    /// Pin the exact hop list from the computed path.
    Explicit,
}

/// Constraint relaxation level, 0 (strict) to 4 (fully relaxed).
#[nutype(
    validate(less_or_equal = 4),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, Default, Into)
)]
pub struct RelaxationLevel(u8);

impl RelaxationLevel {
    /// The strict, unrelaxed level.
    pub fn strict() -> Self {
        Self::default()
    }

    /// The next relaxation level, or `None` if already at the maximum (4).
    pub fn next(self) -> Option<Self> {
        Self::try_new(self.into_inner() + 1).ok()
    }

    /// Whether this level is the maximum the relax loop is bounded to.
    pub fn is_exhausted(self) -> bool {
        self.into_inner() >= 4
    }
}

/// Cutover strategy for returning traffic to its original path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoverMode {
    /// Single weight update from protection to original.
    Immediate,
    /// Staged ECMP weight migration.
    Gradual,
}

/// Task priority, 1 (lowest) .. 10 (highest).
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 10),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, Default, Into),
    default = 5,
)]
pub struct Priority(u8);

/// A percentage weight 0..=100, used for ECMP traffic splits.
#[nutype(
    validate(less_or_equal = 100),
    derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, Into)
)]
pub struct Weight(u8);

impl Weight {
    /// The zero weight.
    pub fn zero() -> Self {
        Self::try_new(0).expect("0 is always <= 100")
    }

    /// The full (100) weight.
    pub fn full() -> Self {
        Self::try_new(100).expect("100 is always <= 100")
    }
}

/// Specific escalation causes the Orchestrator attributes a hard failure to
/// (spec §4.8, §7). Kept as a typed enum rather than a free string so
/// callers can match exhaustively instead of string-comparing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EscalationReason {
    /// Path Computer exhausted all relaxation levels without a result.
    NoAlternatePath,
    /// Correlator grouped failures across adjacent/path-correlated links.
    CascadingFailure,
    /// Tunnel Provisioner failed three consecutive attempts.
    TunnelProvisionFailed3x,
    /// Computed constraints could not be jointly satisfied.
    ConflictingConstraints,
    /// The requested or detected TE type has no supported handling.
    UnknownTeType,
    /// Authoritative Incident Store operation failed.
    StoreUnavailable,
    /// Restoration Monitor exceeded its poll-attempt cap.
    RestorationTimeout,
    /// A collaborator agent was unreachable, timed out, or rejected the
    /// call as a contract violation, and the calling node has no retry
    /// policy of its own to apply (spec §7 "Transport error"/"Task
    /// timeout"/"Contract violation", surfaced as an escalation since §4.8
    /// only defines explicit retry budgets for provisioning and steering).
    CollaboratorUnavailable,
}

impl EscalationReason {
    /// Stable kebab-case reason string, as carried in the incident record.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoAlternatePath => "no-alternate-path",
            Self::CascadingFailure => "cascading-failure",
            Self::TunnelProvisionFailed3x => "tunnel-provision-failed-3x",
            Self::ConflictingConstraints => "conflicting-constraints",
            Self::UnknownTeType => "unknown-te-type",
            Self::StoreUnavailable => "store-unavailable",
            Self::RestorationTimeout => "restoration-timeout",
            Self::CollaboratorUnavailable => "collaborator-unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_id_generate_satisfies_its_own_validation() {
        let id = IncidentId::generate(chrono::Utc::now());
        assert!(id.as_ref().starts_with("INC-"));
    }

    #[test]
    fn relaxation_level_next_stops_at_four() {
        let mut level = RelaxationLevel::strict();
        for _ in 0..4 {
            level = level.next().expect("should advance within bound");
        }
        assert!(level.is_exhausted());
        assert!(level.next().is_none());
    }

    #[test]
    fn sla_tier_hold_timers_match_spec() {
        assert_eq!(SlaTier::Platinum.hold_timer_seconds(), 60);
        assert_eq!(SlaTier::Gold.hold_timer_seconds(), 120);
        assert_eq!(SlaTier::Silver.hold_timer_seconds(), 180);
        assert_eq!(SlaTier::Bronze.hold_timer_seconds(), 300);
    }

    #[test]
    fn weight_bounds_are_enforced() {
        assert!(Weight::try_new(101).is_err());
        assert_eq!(Weight::zero().into_inner(), 0);
        assert_eq!(Weight::full().into_inner(), 100);
    }
}
