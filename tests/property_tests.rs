//! Property-based tests for kemp's scoring and eligibility primitives.
//!
//! These tests use the `proptest` framework to verify invariants hold across
//! thousands of randomly generated inputs. Unlike example-based tests that
//! check specific known values, property tests express universal truths that
//! must hold for all valid inputs, making them excellent at finding edge cases.
//!
//! # Prerequisites
//!
//! - No database or network access required.
//! - These tests are purely computational and always run.
//!
//! # How to run
//!
//! ```bash
//! # Run all property tests:
//! cargo test --test property_tests
//!
//! # Increase case count for thorough testing (default is 256):
//! PROPTEST_CASES=10000 cargo test --test property_tests
//! ```
//!
//! # Testing strategy
//!
//! Properties are organized by module:
//! - **Scoring**: effective-point rounding, multiplier identity
//! - **Aggregation**: category disjointness, sum invariant, order independence
//! - **Eligibility**: threshold AND semantics, percentage bounds, non-revocation
//! - **Direction completion**: percentage bounds, zero-requirement guard
//!
//! Each property is named `prop_<subject>_<invariant>`. The `proptest!` macro
//! generates the test harness, input strategies, and shrinking logic
//! automatically.

use std::collections::BTreeMap;

use proptest::prelude::*;

use kemp::aggregate::ProgressAggregates;
use kemp::effective_points;
use kemp::eligibility::{
    compute_direction_progress, evaluate_totem, DirectionSpec, DirectionStanding, TotemRule,
};

/// One synthetic ledger entry: (reward_type, subtype, points, multiplier).
fn arb_entry() -> impl Strategy<Value = (String, Option<String>, i64, f64)> {
    let reward = prop_oneof![
        (Just("zakal"), prop_oneof![Just("bjj"), Just("kick"), Just("ofp")].prop_map(Some)),
        (
            Just("gran"),
            prop_oneof![Just(None::<&str>), Just(Some("nutrition")), Just(Some("tactics"))]
        ),
        (
            Just("shram"),
            prop_oneof![Just("bjj"), Just("kick"), Just("ofp"), Just("tactics")].prop_map(Some)
        ),
    ];
    (reward, 1i64..100, prop_oneof![Just(1.0f64), Just(1.5f64)]).prop_map(
        |((reward_type, subtype), points, multiplier)| {
            (
                reward_type.to_string(),
                subtype.map(str::to_string),
                points,
                multiplier,
            )
        },
    )
}

fn aggregate(entries: &[(String, Option<String>, i64, f64)]) -> ProgressAggregates {
    let mut agg = ProgressAggregates::default();
    for (reward_type, subtype, points, multiplier) in entries {
        agg.add(reward_type, subtype.as_deref(), *points, *multiplier);
    }
    agg
}

// == Scoring ===================================================================

proptest! {
    /// A 1.0 multiplier never changes the base points.
    #[test]
    fn prop_effective_points_identity_at_one(points in 1i64..100_000) {
        prop_assert_eq!(effective_points(points, 1.0), points);
    }

    /// A 1.5 multiplier yields points + points/2, rounded half away from zero.
    ///
    /// For odd base points the product ends in .5, which must round UP
    /// (3 × 1.5 = 4.5 → 5), never truncate.
    #[test]
    fn prop_effective_points_half_up(points in 1i64..100_000) {
        let expected = points + (points + 1) / 2;
        prop_assert_eq!(effective_points(points, 1.5), expected);
    }

    /// Effective points never drop below the base for allowed multipliers.
    #[test]
    fn prop_effective_points_never_shrink(
        points in 1i64..100_000,
        multiplier in prop_oneof![Just(1.0f64), Just(1.5f64)],
    ) {
        prop_assert!(effective_points(points, multiplier) >= points);
    }
}

// == Aggregation ===============================================================

proptest! {
    /// Type totals partition the counted entries: every entry lands in exactly
    /// one of zakal_total / gran / shram_total, so their sum equals the entry
    /// count.
    #[test]
    fn prop_aggregates_categories_are_disjoint(entries in prop::collection::vec(arb_entry(), 0..60)) {
        let agg = aggregate(&entries);
        prop_assert_eq!(
            agg.zakal_total + agg.gran + agg.shram_total,
            entries.len() as i64
        );
    }

    /// Discipline buckets never exceed their type total.
    #[test]
    fn prop_aggregates_buckets_bounded_by_totals(entries in prop::collection::vec(arb_entry(), 0..60)) {
        let agg = aggregate(&entries);
        prop_assert_eq!(agg.zakal_bjj + agg.zakal_kick + agg.zakal_ofp, agg.zakal_total);
        prop_assert_eq!(
            agg.shram_bjj + agg.shram_kick + agg.shram_ofp + agg.shram_tactics,
            agg.shram_total
        );
    }

    /// Total points equal the sum of per-entry effective points — nothing in
    /// categorization may lose or double-count score.
    #[test]
    fn prop_aggregates_sum_invariant(entries in prop::collection::vec(arb_entry(), 0..60)) {
        let agg = aggregate(&entries);
        let expected: i64 = entries
            .iter()
            .map(|(_, _, points, multiplier)| effective_points(*points, *multiplier))
            .sum();
        prop_assert_eq!(agg.total_points, expected);
    }

    /// Aggregation is order-independent: the ledger is a set of facts, not a
    /// sequence.
    #[test]
    fn prop_aggregates_order_independent(entries in prop::collection::vec(arb_entry(), 0..60)) {
        let forward = aggregate(&entries);
        let mut reversed = entries.clone();
        reversed.reverse();
        prop_assert_eq!(forward, aggregate(&reversed));
    }
}

// == Eligibility ===============================================================

fn arb_aggregates() -> impl Strategy<Value = ProgressAggregates> {
    prop::collection::vec(arb_entry(), 0..60).prop_map(|entries| aggregate(&entries))
}

proptest! {
    /// Threshold rules are a strict AND: eligible exactly when every keyed
    /// metric meets its minimum.
    #[test]
    fn prop_thresholds_are_strict_and(
        agg in arb_aggregates(),
        zakal_min in 1i64..10,
        shram_min in 1i64..3,
    ) {
        let rule = TotemRule::Thresholds(BTreeMap::from([
            ("zakal_bjj".to_string(), zakal_min),
            ("shram_bjj".to_string(), shram_min),
        ]));
        let status = evaluate_totem("snake", &rule, &agg, None);
        let expected = agg.zakal_bjj >= zakal_min && agg.shram_bjj >= shram_min;
        prop_assert_eq!(status.eligible, expected);
    }

    /// All-discipline-trials requires one trial in each of bjj, kick and ofp;
    /// tactics trials never contribute.
    #[test]
    fn prop_all_trials_ignores_tactics(agg in arb_aggregates()) {
        let status = evaluate_totem("blade", &TotemRule::AllDisciplineTrials, &agg, None);
        let expected = agg.shram_bjj >= 1 && agg.shram_kick >= 1 && agg.shram_ofp >= 1;
        prop_assert_eq!(status.eligible, expected);
    }

    /// Progress percentages stay within [0, 100] and are never NaN, and an
    /// earned totem always reports exactly 100.
    #[test]
    fn prop_totem_percent_bounded(agg in arb_aggregates(), granted in any::<bool>()) {
        let rule = TotemRule::Thresholds(BTreeMap::from([
            ("zakal_kick".to_string(), 8),
            ("shram_kick".to_string(), 1),
        ]));
        let grant = granted.then(chrono::Utc::now);
        let status = evaluate_totem("panther", &rule, &agg, grant);
        prop_assert!(!status.progress_percent.is_nan());
        prop_assert!((0.0..=100.0).contains(&status.progress_percent));
        if status.is_earned {
            prop_assert_eq!(status.progress_percent, 100.0);
        }
    }

    /// A persisted grant dominates the ledger: whatever the aggregates say,
    /// the totem stays earned.
    #[test]
    fn prop_grants_are_never_revoked(agg in arb_aggregates()) {
        let rule = TotemRule::Thresholds(BTreeMap::from([("gran".to_string(), 12)]));
        let status = evaluate_totem("mentor", &rule, &agg, Some(chrono::Utc::now()));
        prop_assert!(status.is_earned);
        prop_assert_eq!(status.progress_percent, 100.0);
    }
}

// == Direction Completion ======================================================

proptest! {
    /// Completion percentage is bounded, never NaN, and hits 100 exactly when
    /// every requirement is individually met.
    #[test]
    fn prop_direction_percent_bounded(
        required_activities in 0i64..20,
        required_lectures in 0i64..20,
        has_final_test in any::<bool>(),
        activities_completed in 0i64..40,
        lectures_completed in 0i64..40,
        final_test_passed in any::<bool>(),
    ) {
        let spec = DirectionSpec { required_activities, required_lectures, has_final_test };
        let standing = DirectionStanding { activities_completed, lectures_completed, final_test_passed };
        let completion = compute_direction_progress(&standing, &spec);

        prop_assert!(!completion.percentage.is_nan());
        prop_assert!((0.0..=100.0).contains(&completion.percentage));
        prop_assert!(completion.completed_units <= completion.total_units);

        let all_met = activities_completed >= required_activities
            && lectures_completed >= required_lectures
            && (!has_final_test || final_test_passed);
        if completion.total_units > 0 {
            prop_assert_eq!(completion.percentage == 100.0, all_met);
            prop_assert_eq!(completion.totem_earned, all_met);
        }
    }

    /// A direction with no requirements reports 0%, not a division-by-zero
    /// artifact, and never flips the earned flag.
    #[test]
    fn prop_direction_zero_requirements(
        activities_completed in 0i64..40,
        lectures_completed in 0i64..40,
    ) {
        let spec = DirectionSpec {
            required_activities: 0,
            required_lectures: 0,
            has_final_test: false,
        };
        let standing = DirectionStanding { activities_completed, lectures_completed, final_test_passed: false };
        let completion = compute_direction_progress(&standing, &spec);
        prop_assert_eq!(completion.percentage, 0.0);
        prop_assert!(!completion.totem_earned);
    }

    /// Overshooting one counter can never substitute for another: with the
    /// final test outstanding the direction is strictly below 100%.
    #[test]
    fn prop_direction_overshoot_cannot_substitute(
        required_activities in 1i64..20,
        surplus in 0i64..40,
    ) {
        let spec = DirectionSpec {
            required_activities,
            required_lectures: 0,
            has_final_test: true,
        };
        let standing = DirectionStanding {
            activities_completed: required_activities + surplus,
            lectures_completed: 0,
            final_test_passed: false,
        };
        let completion = compute_direction_progress(&standing, &spec);
        prop_assert!(completion.percentage < 100.0);
        prop_assert!(!completion.totem_earned);
    }
}
