//! Property-based tests for domain-type invariants and the constraint
//! relaxation ladder, in the style of the validated-newtype round-trip
//! checks the teacher's message-router property suite runs.

use proptest::prelude::*;

use netprotect::domain_types::{LinkId, NodeId, RelaxationLevel, TeType, Weight};
use netprotect::path_computer::{relax_constraints, OptimizationMetric, PathConstraints};

prop_compose! {
    fn arb_link_id()(s in "[a-zA-Z0-9][a-zA-Z0-9_-]{0,50}") -> LinkId {
        LinkId::try_new(s).unwrap()
    }
}

prop_compose! {
    fn arb_node_id()(s in "[a-zA-Z0-9][a-zA-Z0-9_-]{0,50}") -> NodeId {
        NodeId::try_new(s).unwrap()
    }
}

prop_compose! {
    fn arb_relaxation_level()(level in 0u8..=4) -> RelaxationLevel {
        RelaxationLevel::try_new(level).unwrap()
    }
}

prop_compose! {
    fn arb_constraints()(
        avoid_links in prop::collection::vec(arb_link_id(), 0..3),
        avoid_nodes in prop::collection::vec(arb_node_id(), 0..3),
        avoid_srlgs in prop::collection::vec("[a-z]{3,8}", 0..3),
        max_hops in 1u32..20,
        max_delay_ms in prop::option::of(1.0f64..500.0),
    ) -> PathConstraints {
        PathConstraints {
            avoid_links,
            avoid_nodes,
            avoid_srlgs,
            optimization_metric: OptimizationMetric::Delay,
            max_hops,
            max_delay_ms,
            min_bandwidth_gbps: None,
        }
    }
}

proptest! {
    /// Relaxation never removes a link the caller refuses to traverse, and
    /// never shrinks the hop budget, regardless of how far the level goes.
    #[test]
    fn relax_constraints_never_narrows_the_search(
        constraints in arb_constraints(),
        level in arb_relaxation_level(),
    ) {
        let original_links = constraints.avoid_links.clone();
        let original_hops = constraints.max_hops;

        let relaxed = relax_constraints(constraints, level);

        prop_assert_eq!(relaxed.avoid_links, original_links);
        prop_assert!(relaxed.max_hops >= original_hops);
    }

    /// Each named relaxation threshold takes effect exactly when the level
    /// reaches it, cumulatively, matching spec §4.4's "applied cumulatively"
    /// relaxation ladder.
    #[test]
    fn relax_constraints_thresholds_are_cumulative(constraints in arb_constraints()) {
        let level1 = relax_constraints(constraints.clone(), RelaxationLevel::try_new(1).unwrap());
        prop_assert!(level1.avoid_srlgs.is_empty());

        let level3 = relax_constraints(constraints.clone(), RelaxationLevel::try_new(3).unwrap());
        prop_assert!(level3.max_delay_ms.is_none());
        prop_assert_eq!(level3.optimization_metric, OptimizationMetric::Igp);

        let level4 = relax_constraints(constraints, RelaxationLevel::try_new(4).unwrap());
        prop_assert!(level4.avoid_nodes.is_empty());
    }

    /// `Weight` rejects anything above 100 and accepts the full valid range,
    /// round-tripping through `u8::from` unchanged.
    #[test]
    fn weight_accepts_only_the_valid_percentage_range(value in 0u8..=255) {
        let result = Weight::try_new(value);
        if value <= 100 {
            prop_assert_eq!(u8::from(result.unwrap()), value);
        } else {
            prop_assert!(result.is_err());
        }
    }

    /// `LinkId`/`NodeId` preserve their original string through validation
    /// and `Display`, for any value inside the accepted length bounds.
    #[test]
    fn link_and_node_ids_round_trip_through_display(link in arb_link_id(), node in arb_node_id()) {
        prop_assert_eq!(link.to_string(), link.as_ref().to_string());
        prop_assert_eq!(node.to_string(), node.as_ref().to_string());
    }
}

#[test]
fn relaxation_level_progression_reaches_exhaustion_at_four() {
    let mut level = RelaxationLevel::strict();
    for _ in 0..4 {
        level = level.next().expect("levels 0..4 all have a successor");
    }
    assert!(level.is_exhausted());
    assert!(level.next().is_none());
}

#[test]
fn te_type_is_distinct_per_variant() {
    assert_ne!(TeType::SrMpls, TeType::RsvpTe);
}
