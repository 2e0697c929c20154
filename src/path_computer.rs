//! Constraint-based alternate-path computation: BUILD_CONSTRAINTS → QUERY →
//! VALIDATE → (RETURN | RELAX → QUERY …), bounded by relaxation level ≤ 4
//! (spec §4.4), grounded in
//! `original_source/agents/path_computation/{schemas,tools}/*.py`
//! (`constraint_builder.py`, `path_validator.py`, `kg_client.py`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain_types::{LinkId, NodeId, RelaxationLevel, TeType};
use crate::error::A2aError;

/// Default max-hops before any relaxation (`ConstraintBuilder.DEFAULT_MAX_HOPS`).
const DEFAULT_MAX_HOPS: u32 = 10;
/// Hops added per relaxation level 2+ (`ConstraintBuilder.HOP_INCREASE_PER_LEVEL`).
const HOP_INCREASE_PER_LEVEL: u32 = 5;
/// Delay tolerance multiplier applied to the required SLA (`DEFAULT_MAX_DELAY_MULTIPLIER`).
const MAX_DELAY_MULTIPLIER: f64 = 2.0;
/// Bandwidth tolerance factor applied to the required SLA (`DEFAULT_MIN_BANDWIDTH_FACTOR`).
const MIN_BANDWIDTH_FACTOR: f64 = 0.8;

/// Metric a path query ranks candidates by (spec §4.4 "optimization metric").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMetric {
    /// IGP (link-state) metric. Reached only after relaxation level 3.
    Igp,
    /// Traffic-engineering metric, used for RSVP-TE paths.
    Te,
    /// End-to-end delay. The default when the SLA specifies a delay bound.
    Delay,
    /// Raw hop count.
    HopCount,
}

/// Constraints handed to the topology source's path query (spec §4.4 step 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathConstraints {
    /// Links the query must never traverse. Never relaxed (spec §4.4).
    pub avoid_links: Vec<LinkId>,
    /// Nodes the query should avoid; cleared at relaxation level 4.
    pub avoid_nodes: Vec<NodeId>,
    /// SRLGs the query should avoid; cleared at relaxation level 1.
    pub avoid_srlgs: Vec<String>,
    /// Ranking metric for candidate paths.
    pub optimization_metric: OptimizationMetric,
    /// Maximum hop count, raised by [`HOP_INCREASE_PER_LEVEL`] per level from 2.
    pub max_hops: u32,
    /// Required end-to-end delay bound, dropped at relaxation level 3.
    pub max_delay_ms: Option<f64>,
    /// Required minimum available bandwidth.
    pub min_bandwidth_gbps: Option<f64>,
}

/// A path candidate returned by the topology source (spec §4.4, `ComputedPath`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedPath {
    /// Opaque path identifier assigned by the topology source.
    pub path_id: String,
    /// Head-end node.
    pub source: NodeId,
    /// Tail-end node.
    pub destination: NodeId,
    /// Ordered node hops.
    pub segments: Vec<NodeId>,
    /// Segment identifiers corresponding 1:1 with `segments`.
    pub segment_sids: Vec<String>,
    /// Hop count, i.e. `segments.len() - 1`.
    pub total_hops: u32,
    /// Aggregated end-to-end delay.
    pub total_delay_ms: Option<f64>,
    /// Aggregated IGP metric.
    pub total_igp_metric: Option<f64>,
    /// Aggregated TE metric.
    pub total_te_metric: Option<f64>,
    /// Minimum available bandwidth across all hops.
    pub min_available_bandwidth_gbps: Option<f64>,
    /// Tunnel technology the topology source recommends for this path.
    pub recommended_te_type: TeType,
    /// Whether this path was found only after relaxing constraints.
    pub constraints_relaxed: bool,
    /// The relaxation level at which this path was found.
    pub relaxation_level: RelaxationLevel,
}

/// Outcome of validating a computed path against the required SLA (spec
/// §4.4 "Validation against SLA").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathValidationResult {
    /// Whether the path satisfies every checked bound.
    pub is_valid: bool,
    /// Human-readable descriptions of each failed bound.
    pub violations: Vec<String>,
    /// Whether the delay bound held, if one was required.
    pub delay_ok: bool,
    /// Whether the bandwidth bound held, if one was required.
    pub bandwidth_ok: bool,
    /// Whether the hop-count bound held.
    pub hop_count_ok: bool,
}

/// Source of path candidates, queried once per relaxation attempt (spec
/// §4.4, `KGDijkstraClient.compute_path`).
#[async_trait]
pub trait PathQuerySource: Send + Sync {
    /// Returns the best candidate path for `source`→`destination` under
    /// `constraints`, or `None` if no path exists at all.
    async fn compute_path(
        &self,
        source: &NodeId,
        destination: &NodeId,
        constraints: &PathConstraints,
    ) -> Result<Option<ComputedPath>, A2aError>;
}

/// Builds the initial, strictest constraint set for a path request (spec
/// §4.4 step 1, `ConstraintBuilder.build_constraints`).
///
/// The optimization metric is `te` when the current tunnel is RSVP-TE,
/// otherwise `delay` — matching the upstream builder regardless of whether
/// the SLA names a delay bound, since `delay` is also its fallback default.
pub fn build_constraints(
    avoid_links: Vec<LinkId>,
    current_te_type: TeType,
    required_max_delay_ms: Option<f64>,
    required_min_bandwidth_gbps: Option<f64>,
) -> PathConstraints {
    let optimization_metric =
        if current_te_type == TeType::RsvpTe { OptimizationMetric::Te } else { OptimizationMetric::Delay };

    PathConstraints {
        avoid_links,
        avoid_nodes: Vec::new(),
        avoid_srlgs: Vec::new(),
        optimization_metric,
        max_hops: DEFAULT_MAX_HOPS,
        max_delay_ms: required_max_delay_ms,
        min_bandwidth_gbps: required_min_bandwidth_gbps,
    }
}

/// Relaxes `constraints` cumulatively up to `level` (spec §4.4 "Relaxation
/// levels, applied cumulatively"). `avoid_links` is never touched.
pub fn relax_constraints(mut constraints: PathConstraints, level: RelaxationLevel) -> PathConstraints {
    let level: u8 = level.into();
    if level >= 1 {
        constraints.avoid_srlgs.clear();
    }
    if level >= 2 {
        constraints.max_hops += HOP_INCREASE_PER_LEVEL;
    }
    if level >= 3 {
        constraints.optimization_metric = OptimizationMetric::Igp;
        constraints.max_delay_ms = None;
    }
    if level >= 4 {
        constraints.avoid_nodes.clear();
    }
    constraints
}

/// Validates `path` against the required SLA and the constraints it was
/// queried under (spec §4.4, `PathValidator.validate_path`).
pub fn validate_path(
    path: &ComputedPath,
    constraints: &PathConstraints,
    required_max_delay_ms: Option<f64>,
    required_min_bandwidth_gbps: Option<f64>,
) -> PathValidationResult {
    let mut violations = Vec::new();

    let delay_ok = match (required_max_delay_ms, path.total_delay_ms) {
        (Some(required), Some(actual)) => {
            let ok = actual <= required * MAX_DELAY_MULTIPLIER;
            if !ok {
                violations.push(format!("delay {actual}ms exceeds {required}ms x{MAX_DELAY_MULTIPLIER}"));
            }
            ok
        }
        _ => true,
    };

    let bandwidth_ok = match (required_min_bandwidth_gbps, path.min_available_bandwidth_gbps) {
        (Some(required), Some(actual)) => {
            let ok = actual >= required * MIN_BANDWIDTH_FACTOR;
            if !ok {
                violations.push(format!("bandwidth {actual}Gbps below {required}Gbps x{MIN_BANDWIDTH_FACTOR}"));
            }
            ok
        }
        _ => true,
    };

    let hop_count_ok = path.total_hops <= constraints.max_hops;
    if !hop_count_ok {
        violations.push(format!("hop count {} exceeds max_hops {}", path.total_hops, constraints.max_hops));
    }

    PathValidationResult { is_valid: delay_ok && bandwidth_ok && hop_count_ok, violations, delay_ok, bandwidth_ok, hop_count_ok }
}

/// Runs the full BUILD_CONSTRAINTS → QUERY → VALIDATE → (RETURN | RELAX)
/// loop for one alternate-path request (spec §4.4).
///
/// Returns `Ok(None)` once relaxation is exhausted without a valid path —
/// the orchestrator treats that as an escalation trigger, not an error.
///
/// # Errors
///
/// Propagates a query failure from `source` immediately; a query that
/// simply finds no path is not an error and continues the relax loop.
pub async fn compute_protected_path(
    source_query: &dyn PathQuerySource,
    source: &NodeId,
    destination: &NodeId,
    avoid_links: Vec<LinkId>,
    current_te_type: TeType,
    required_max_delay_ms: Option<f64>,
    required_min_bandwidth_gbps: Option<f64>,
) -> Result<Option<ComputedPath>, A2aError> {
    let mut constraints = build_constraints(avoid_links, current_te_type, required_max_delay_ms, required_min_bandwidth_gbps);
    let mut level = RelaxationLevel::strict();

    loop {
        if let Some(mut candidate) = source_query.compute_path(source, destination, &constraints).await? {
            let validation = validate_path(&candidate, &constraints, required_max_delay_ms, required_min_bandwidth_gbps);
            if validation.is_valid {
                candidate.relaxation_level = level;
                candidate.constraints_relaxed = u8::from(level) > 0;
                return Ok(Some(candidate));
            }
        }

        match level.next() {
            Some(next) => {
                level = next;
                constraints = relax_constraints(constraints, level);
            }
            None => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> NodeId {
        NodeId::try_new(name.to_string()).unwrap()
    }

    fn link(name: &str) -> LinkId {
        LinkId::try_new(name.to_string()).unwrap()
    }

    fn base_path(hops: u32, delay_ms: Option<f64>) -> ComputedPath {
        ComputedPath {
            path_id: "path-1".to_string(),
            source: node("PE-SJ"),
            destination: node("PE-NY"),
            segments: vec![node("PE-SJ"), node("PE-NY")],
            segment_sids: vec!["16001".to_string(), "16002".to_string()],
            total_hops: hops,
            total_delay_ms: delay_ms,
            total_igp_metric: Some(100.0),
            total_te_metric: None,
            min_available_bandwidth_gbps: Some(10.0),
            recommended_te_type: TeType::SrMpls,
            constraints_relaxed: false,
            relaxation_level: RelaxationLevel::strict(),
        }
    }

    /// A source that only has a path once avoid_srlgs has been cleared
    /// (i.e. at relaxation level >= 1), exercising the relax loop.
    struct RelaxingSource;

    #[async_trait]
    impl PathQuerySource for RelaxingSource {
        async fn compute_path(
            &self,
            _source: &NodeId,
            _destination: &NodeId,
            constraints: &PathConstraints,
        ) -> Result<Option<ComputedPath>, A2aError> {
            if constraints.avoid_srlgs.is_empty() {
                Ok(Some(base_path(5, Some(10.0))))
            } else {
                Ok(None)
            }
        }
    }

    #[tokio::test]
    async fn relaxation_advances_until_a_valid_path_is_found() {
        let result = compute_protected_path(
            &RelaxingSource,
            &node("PE-SJ"),
            &node("PE-NY"),
            vec![link("link-L")],
            TeType::SrMpls,
            Some(20.0),
            Some(5.0),
        )
        .await
        .unwrap()
        .expect("relaxation should find a path");

        assert_eq!(u8::from(result.relaxation_level), 1);
        assert!(result.constraints_relaxed);
    }

    struct NeverFindsSource;

    #[async_trait]
    impl PathQuerySource for NeverFindsSource {
        async fn compute_path(
            &self,
            _source: &NodeId,
            _destination: &NodeId,
            _constraints: &PathConstraints,
        ) -> Result<Option<ComputedPath>, A2aError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn exhausting_all_relaxation_levels_returns_none() {
        let result =
            compute_protected_path(&NeverFindsSource, &node("PE-SJ"), &node("PE-NY"), vec![link("link-L")], TeType::SrMpls, None, None)
                .await
                .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn avoid_links_survives_every_relaxation_level() {
        let mut constraints = build_constraints(vec![link("link-L")], TeType::SrMpls, None, None);
        let mut level = RelaxationLevel::strict();
        while let Some(next) = level.next() {
            level = next;
            constraints = relax_constraints(constraints, level);
            assert_eq!(constraints.avoid_links, vec![link("link-L")]);
        }
    }

    #[test]
    fn validate_path_flags_delay_over_twice_the_requirement() {
        let constraints = build_constraints(vec![], TeType::SrMpls, Some(10.0), None);
        let path = base_path(3, Some(25.0));
        let result = validate_path(&path, &constraints, Some(10.0), None);
        assert!(!result.is_valid);
        assert!(!result.delay_ok);
    }

    #[test]
    fn validate_path_rejects_hop_count_over_max_hops() {
        let constraints = build_constraints(vec![], TeType::SrMpls, None, None);
        let path = base_path(DEFAULT_MAX_HOPS + 1, None);
        let result = validate_path(&path, &constraints, None, None);
        assert!(!result.is_valid);
        assert!(!result.hop_count_ok);
    }

    #[test]
    fn rsvp_te_current_type_selects_te_optimization_metric() {
        let constraints = build_constraints(vec![], TeType::RsvpTe, None, None);
        assert_eq!(constraints.optimization_metric, OptimizationMetric::Te);
    }
}
