//! # Eligibility Evaluator — Totem Awards and Direction Completion
//!
//! Applies declarative requirement rules to the aggregation engine's output.
//! Two rule shapes exist:
//!
//! - **Keyed thresholds** — a map from aggregate metric name to minimum count,
//!   e.g. `{"zakal_bjj": 8, "shram_bjj": 1}`. Eligibility is a strict AND over
//!   every key. No partial credit, no OR, no weighting.
//! - **All-discipline trials** — the combined "blade" totem: at least one
//!   shram entry in every training discipline (bjj AND kick AND ofp).
//!
//! Alongside the award gate, the evaluator produces a 0–100 display
//! percentage (70% weight on activity thresholds, 30% on trial thresholds for
//! discipline totems). The percentage is a progress-bar heuristic only; the
//! award decision is always the strict threshold check.
//!
//! Totems are one-way: an existing grant row forces `is_earned = true` no
//! matter what the current aggregates say.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::aggregate::ProgressAggregates;

/// Requirement rule variants, decoded from the `totem_requirements` table.
#[derive(Clone, Debug, PartialEq)]
pub enum TotemRule {
    /// Minimum count per aggregate metric; AND over all keys.
    Thresholds(BTreeMap<String, i64>),
    /// At least one shram entry in each of bjj, kick and ofp.
    AllDisciplineTrials,
}

impl TotemRule {
    /// Decode the stored JSON requirement.
    ///
    /// `{"all_discipline_trials": true}` selects the combined rule; any other
    /// object is read as a metric→threshold map. Non-numeric thresholds and
    /// non-object payloads are rejected.
    pub fn from_json(raw: &Value) -> anyhow::Result<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("totem requirement must be a JSON object: {raw}"))?;

        if obj.get("all_discipline_trials").and_then(Value::as_bool) == Some(true) {
            return Ok(TotemRule::AllDisciplineTrials);
        }

        let mut thresholds = BTreeMap::new();
        for (key, val) in obj {
            let n = val
                .as_i64()
                .ok_or_else(|| anyhow::anyhow!("threshold for '{key}' is not an integer: {val}"))?;
            thresholds.insert(key.clone(), n);
        }
        if thresholds.is_empty() {
            anyhow::bail!("totem requirement has no thresholds");
        }
        Ok(TotemRule::Thresholds(thresholds))
    }
}

/// Evaluation result for one (participant, totem) pair — pure display data
/// plus the grant decision.
#[derive(Clone, Debug, Serialize)]
pub struct TotemStatus {
    pub totem_type: String,
    /// Strict threshold check against current aggregates.
    pub eligible: bool,
    /// Sticky earned flag: true if a grant row exists or eligibility holds.
    pub is_earned: bool,
    /// 0–100 progress-bar value; 100 once earned.
    pub progress_percent: f64,
    pub earned_at: Option<DateTime<Utc>>,
}

/// Evaluate one totem against a participant's aggregates.
///
/// `existing_grant` is the `earned_at` of an already-persisted grant row, if
/// any. A present grant short-circuits to earned (non-revocation): aggregates
/// may have regressed after an admin ledger edit, grants never do.
pub fn evaluate_totem(
    totem_type: &str,
    rule: &TotemRule,
    aggregates: &ProgressAggregates,
    existing_grant: Option<DateTime<Utc>>,
) -> TotemStatus {
    let eligible = match rule {
        TotemRule::Thresholds(thresholds) => thresholds.iter().all(|(key, min)| {
            match aggregates.metric(key) {
                Some(count) => count >= *min,
                None => {
                    warn!(totem_type, key, "totem requirement references unknown metric");
                    false
                }
            }
        }),
        TotemRule::AllDisciplineTrials => {
            aggregates.shram_bjj >= 1 && aggregates.shram_kick >= 1 && aggregates.shram_ofp >= 1
        }
    };

    let is_earned = existing_grant.is_some() || eligible;
    let progress_percent = if is_earned {
        100.0
    } else {
        display_percent(rule, aggregates)
    };

    TotemStatus {
        totem_type: totem_type.to_string(),
        eligible,
        is_earned,
        progress_percent,
        earned_at: existing_grant,
    }
}

/// Display-only partial progress toward a totem.
///
/// Discipline totems carry one activity-count key (zakal/gran) and one trial
/// key (shram); those groups are weighted 70/30. A rule with only one group
/// uses the plain average of its key fractions.
fn display_percent(rule: &TotemRule, aggregates: &ProgressAggregates) -> f64 {
    let pct = match rule {
        TotemRule::Thresholds(thresholds) => {
            let mut activity = Vec::new();
            let mut trial = Vec::new();
            for (key, min) in thresholds {
                let frac = fraction(aggregates.metric(key).unwrap_or(0), *min);
                if key.starts_with("shram") {
                    trial.push(frac);
                } else {
                    activity.push(frac);
                }
            }
            match (avg(&activity), avg(&trial)) {
                (Some(a), Some(t)) => 100.0 * (0.7 * a + 0.3 * t),
                (Some(a), None) => 100.0 * a,
                (None, Some(t)) => 100.0 * t,
                (None, None) => 0.0,
            }
        }
        TotemRule::AllDisciplineTrials => {
            let covered = [
                aggregates.shram_bjj,
                aggregates.shram_kick,
                aggregates.shram_ofp,
            ]
            .iter()
            .filter(|c| **c >= 1)
            .count();
            100.0 * covered as f64 / 3.0
        }
    };
    pct.clamp(0.0, 100.0)
}

fn fraction(count: i64, min: i64) -> f64 {
    if min <= 0 {
        return 1.0;
    }
    (count as f64 / min as f64).min(1.0)
}

fn avg(fracs: &[f64]) -> Option<f64> {
    if fracs.is_empty() {
        None
    } else {
        Some(fracs.iter().sum::<f64>() / fracs.len() as f64)
    }
}

// ── Direction completion ────────────────────────────────────────

/// Declared completion requirements of a direction (static reference data).
#[derive(Clone, Copy, Debug)]
pub struct DirectionSpec {
    pub required_activities: i64,
    pub required_lectures: i64,
    pub has_final_test: bool,
}

/// Current completion counters for a (participant, direction) pair.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectionStanding {
    pub activities_completed: i64,
    pub lectures_completed: i64,
    pub final_test_passed: bool,
}

/// Computed completion state, recomputed on every read; the stored
/// `progress_percentage` column is strictly a cache of this.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DirectionCompletion {
    pub completed_units: i64,
    pub total_units: i64,
    pub percentage: f64,
    pub totem_earned: bool,
}

/// Completion percentage for a direction.
///
/// `total_units = required_activities + required_lectures + (has_final_test ? 1 : 0)`.
/// Each counter is capped at its requirement so overshooting one requirement
/// cannot stand in for another. A direction with nothing required is 0%,
/// never 100% and never NaN. 100% flips `totem_earned` (one-way at the
/// persistence layer).
pub fn compute_direction_progress(
    standing: &DirectionStanding,
    spec: &DirectionSpec,
) -> DirectionCompletion {
    let total_units = spec.required_activities.max(0)
        + spec.required_lectures.max(0)
        + i64::from(spec.has_final_test);

    if total_units == 0 {
        return DirectionCompletion {
            completed_units: 0,
            total_units: 0,
            percentage: 0.0,
            totem_earned: false,
        };
    }

    let completed_units = standing
        .activities_completed
        .clamp(0, spec.required_activities.max(0))
        + standing
            .lectures_completed
            .clamp(0, spec.required_lectures.max(0))
        + i64::from(spec.has_final_test && standing.final_test_passed);

    let percentage = (100.0 * completed_units as f64 / total_units as f64).clamp(0.0, 100.0);

    DirectionCompletion {
        completed_units,
        total_units,
        percentage,
        totem_earned: percentage >= 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agg(zakal_bjj: i64, shram_bjj: i64) -> ProgressAggregates {
        ProgressAggregates {
            zakal_bjj,
            shram_bjj,
            zakal_total: zakal_bjj,
            shram_total: shram_bjj,
            ..Default::default()
        }
    }

    fn snake_rule() -> TotemRule {
        TotemRule::from_json(&json!({"zakal_bjj": 8, "shram_bjj": 1})).unwrap()
    }

    #[test]
    fn rule_decoding_variants() {
        assert_eq!(
            TotemRule::from_json(&json!({"all_discipline_trials": true})).unwrap(),
            TotemRule::AllDisciplineTrials
        );
        assert!(matches!(snake_rule(), TotemRule::Thresholds(_)));
        assert!(TotemRule::from_json(&json!([1, 2])).is_err());
        assert!(TotemRule::from_json(&json!({})).is_err());
        assert!(TotemRule::from_json(&json!({"zakal_bjj": "eight"})).is_err());
    }

    #[test]
    fn threshold_and_semantics() {
        let rule = snake_rule();
        // both met
        assert!(evaluate_totem("snake", &rule, &agg(8, 1), None).eligible);
        assert!(evaluate_totem("snake", &rule, &agg(9, 3), None).eligible);
        // either short by one fails
        assert!(!evaluate_totem("snake", &rule, &agg(7, 1), None).eligible);
        assert!(!evaluate_totem("snake", &rule, &agg(8, 0), None).eligible);
    }

    #[test]
    fn unknown_metric_key_never_satisfied() {
        let rule = TotemRule::from_json(&json!({"pushups": 1})).unwrap();
        let status = evaluate_totem("bogus", &rule, &agg(100, 100), None);
        assert!(!status.eligible);
    }

    #[test]
    fn non_revocation_with_existing_grant() {
        let earned_at = Utc::now();
        // aggregates far below threshold, grant row present
        let status = evaluate_totem("snake", &snake_rule(), &agg(0, 0), Some(earned_at));
        assert!(!status.eligible);
        assert!(status.is_earned);
        assert_eq!(status.progress_percent, 100.0);
        assert_eq!(status.earned_at, Some(earned_at));
    }

    #[test]
    fn blade_requires_every_discipline() {
        let rule = TotemRule::AllDisciplineTrials;
        let mut a = ProgressAggregates::default();
        a.shram_bjj = 1;
        a.shram_kick = 2;
        assert!(!evaluate_totem("blade", &rule, &a, None).eligible);
        a.shram_ofp = 1;
        assert!(evaluate_totem("blade", &rule, &a, None).eligible);
        // tactics alone never counts toward blade
        let mut t = ProgressAggregates::default();
        t.shram_tactics = 5;
        assert!(!evaluate_totem("blade", &rule, &t, None).eligible);
    }

    #[test]
    fn display_percent_weights_activity_over_trial() {
        // 4 of 8 activities, no trial: 0.7 * 0.5 = 35%
        let status = evaluate_totem("snake", &snake_rule(), &agg(4, 0), None);
        assert!((status.progress_percent - 35.0).abs() < 1e-9);
        // trial done, no activities: 30%
        let status = evaluate_totem("snake", &snake_rule(), &agg(0, 1), None);
        assert!((status.progress_percent - 30.0).abs() < 1e-9);
        // earned pins to 100
        let status = evaluate_totem("snake", &snake_rule(), &agg(8, 1), None);
        assert_eq!(status.progress_percent, 100.0);
    }

    #[test]
    fn blade_display_percent_counts_covered_disciplines() {
        let mut a = ProgressAggregates::default();
        a.shram_bjj = 1;
        let status = evaluate_totem("blade", &TotemRule::AllDisciplineTrials, &a, None);
        assert!((status.progress_percent - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn direction_progress_final_test_outstanding() {
        // 8 activities of 8, final test required but not passed: 8/9 ≈ 88.9
        let spec = DirectionSpec {
            required_activities: 8,
            required_lectures: 0,
            has_final_test: true,
        };
        let standing = DirectionStanding {
            activities_completed: 8,
            lectures_completed: 0,
            final_test_passed: false,
        };
        let c = compute_direction_progress(&standing, &spec);
        assert_eq!(c.completed_units, 8);
        assert_eq!(c.total_units, 9);
        assert!((c.percentage - 800.0 / 9.0).abs() < 1e-9);
        assert!(!c.totem_earned);
    }

    #[test]
    fn direction_progress_zero_requirements_is_zero_percent() {
        let spec = DirectionSpec {
            required_activities: 0,
            required_lectures: 0,
            has_final_test: false,
        };
        let c = compute_direction_progress(&DirectionStanding::default(), &spec);
        assert_eq!(c.percentage, 0.0);
        assert!(!c.totem_earned);
    }

    #[test]
    fn direction_progress_overshoot_does_not_substitute() {
        // 20 activities cannot stand in for the unpassed final test
        let spec = DirectionSpec {
            required_activities: 8,
            required_lectures: 0,
            has_final_test: true,
        };
        let standing = DirectionStanding {
            activities_completed: 20,
            lectures_completed: 0,
            final_test_passed: false,
        };
        let c = compute_direction_progress(&standing, &spec);
        assert!(c.percentage < 100.0);
        assert!(!c.totem_earned);
    }

    #[test]
    fn direction_progress_full_completion_earns() {
        let spec = DirectionSpec {
            required_activities: 8,
            required_lectures: 2,
            has_final_test: true,
        };
        let standing = DirectionStanding {
            activities_completed: 8,
            lectures_completed: 2,
            final_test_passed: true,
        };
        let c = compute_direction_progress(&standing, &spec);
        assert_eq!(c.percentage, 100.0);
        assert!(c.totem_earned);
    }
}
