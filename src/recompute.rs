//! # Recompute Pipeline — Ledger to Derived State
//!
//! Rebuilds every derived view for a participant from the ledger alone:
//! the cached point total, per-direction progress rows, and totem grants.
//! Runs after every ledger mutation (insert, admin edit, admin delete) and is
//! idempotent — re-running against an unchanged ledger writes the same values
//! and creates no new grants.
//!
//! Grants only ever flow forward: a recompute that lands below a threshold
//! after an admin edit leaves existing `participant_totems` rows untouched.

use std::collections::HashMap;

use anyhow::Result;
use tracing::warn;

use crate::aggregate::ProgressAggregates;
use crate::db::{ActivityRow, Database};
use crate::eligibility::{
    compute_direction_progress, evaluate_totem, DirectionSpec, DirectionStanding, TotemRule,
    TotemStatus,
};
use crate::events::{Event, EventBus};
use crate::ledger::RewardType;
use crate::prom_metrics::{Metrics, TotemLabel};

/// Everything a recompute derived for one participant.
pub struct RecomputeOutcome {
    pub participant_id: uuid::Uuid,
    pub aggregates: ProgressAggregates,
    pub totems: Vec<TotemStatus>,
    /// Totem types whose grant row was created by this run.
    pub newly_granted: Vec<String>,
}

/// Recompute all derived state for one participant from scratch.
///
/// Returns `None` for an unknown participant id — a participant is never
/// fabricated. A participant with an empty ledger recomputes to all zeros.
pub async fn recompute_participant(
    db: &Database,
    participant_id: uuid::Uuid,
    bus: Option<&EventBus>,
    metrics: Option<&Metrics>,
) -> Result<Option<RecomputeOutcome>> {
    let Some(participant) = db.get_participant(participant_id).await? else {
        return Ok(None);
    };

    let rows = db.list_activities(participant_id).await?;
    let aggregates = ProgressAggregates::from_rows(&rows);

    db.set_participant_points(participant_id, aggregates.total_points)
        .await?;

    let (totems, newly_granted) = sync_totems(
        db,
        participant_id,
        &participant.full_name,
        &aggregates,
        bus,
        metrics,
    )
    .await?;
    sync_direction_progress(db, participant_id, &aggregates, &rows).await?;

    if let Some(m) = metrics {
        m.recompute_runs.inc();
    }

    Ok(Some(RecomputeOutcome {
        participant_id,
        aggregates,
        totems,
        newly_granted,
    }))
}

/// Recompute every participant. Used by the CLI sweep and after reference
/// data changes. Returns the number of participants processed.
pub async fn recompute_all(
    db: &Database,
    bus: Option<&EventBus>,
    metrics: Option<&Metrics>,
) -> Result<usize> {
    let ids = db.list_participant_ids().await?;
    let mut processed = 0;
    for id in &ids {
        if recompute_participant(db, *id, bus, metrics).await?.is_some() {
            processed += 1;
        }
    }
    Ok(processed)
}

/// Evaluate every totem requirement against fresh aggregates and create any
/// missing grants.
///
/// A malformed requirement row is skipped with a warning rather than failing
/// the whole recompute — one bad reference row must not block scoring. The
/// grant insert is conditional, so a concurrent recompute for the same
/// participant cannot double-grant; the loser simply sees the existing row.
async fn sync_totems(
    db: &Database,
    participant_id: uuid::Uuid,
    participant_name: &str,
    aggregates: &ProgressAggregates,
    bus: Option<&EventBus>,
    metrics: Option<&Metrics>,
) -> Result<(Vec<TotemStatus>, Vec<String>)> {
    let requirements = db.get_totem_requirements().await?;
    let earned: HashMap<String, chrono::DateTime<chrono::Utc>> = db
        .get_participant_totems(participant_id)
        .await?
        .into_iter()
        .map(|t| (t.totem_type, t.earned_at))
        .collect();

    let mut statuses = Vec::with_capacity(requirements.len());
    let mut newly_granted = Vec::new();

    for requirement in &requirements {
        let rule = match TotemRule::from_json(&requirement.requirements) {
            Ok(rule) => rule,
            Err(e) => {
                warn!(totem_type = %requirement.totem_type, error = %e, "skipping malformed totem requirement");
                if let Some(b) = bus {
                    b.emit(Event::Warning {
                        context: format!("totem {}", requirement.totem_type),
                        message: e.to_string(),
                    });
                }
                continue;
            }
        };

        let existing = earned.get(&requirement.totem_type).copied();
        let mut status = evaluate_totem(&requirement.totem_type, &rule, aggregates, existing);

        if status.eligible && existing.is_none() {
            // false→true transition with no grant row: insert exactly once
            if let Some(grant) = db.grant_totem(participant_id, &requirement.totem_type).await? {
                status.earned_at = Some(grant.earned_at);
                newly_granted.push(requirement.totem_type.clone());
                if let Some(b) = bus {
                    b.emit(Event::TotemEarned {
                        participant: participant_name.to_string(),
                        totem_type: requirement.totem_type.clone(),
                        totem_name: requirement.name.clone(),
                    });
                }
                if let Some(m) = metrics {
                    m.totems_granted
                        .get_or_create(&TotemLabel {
                            totem_type: requirement.totem_type.clone(),
                        })
                        .inc();
                }
            } else {
                // lost a race: the grant exists, treat as success
                if let Some(row) = db
                    .get_participant_totems(participant_id)
                    .await?
                    .into_iter()
                    .find(|t| t.totem_type == requirement.totem_type)
                {
                    status.earned_at = Some(row.earned_at);
                }
            }
        }

        statuses.push(status);
    }

    Ok((statuses, newly_granted))
}

/// Derive direction counters from the ledger and replace the cached rows.
///
/// - activities_completed: the direction's zakal bucket
/// - lectures_completed: gran rows whose lecture code matches the direction
/// - final_test_passed: at least one shram entry in the direction (when the
///   direction declares a final test)
async fn sync_direction_progress(
    db: &Database,
    participant_id: uuid::Uuid,
    aggregates: &ProgressAggregates,
    rows: &[ActivityRow],
) -> Result<()> {
    let directions = db.get_directions().await?;
    for direction in &directions {
        let standing = DirectionStanding {
            activities_completed: aggregates.zakal_for(&direction.code),
            lectures_completed: lectures_for(rows, &direction.code),
            final_test_passed: direction.has_final_test
                && aggregates.shram_for(&direction.code) >= 1,
        };
        let spec = DirectionSpec {
            required_activities: direction.required_activities,
            required_lectures: direction.required_lectures,
            has_final_test: direction.has_final_test,
        };
        let completion = compute_direction_progress(&standing, &spec);
        db.upsert_direction_progress(
            participant_id,
            direction.id,
            standing.activities_completed,
            standing.lectures_completed,
            standing.final_test_passed,
            completion.percentage,
            completion.totem_earned,
        )
        .await?;
    }
    Ok(())
}

/// Count gran rows carrying the direction's lecture code.
fn lectures_for(rows: &[ActivityRow], code: &str) -> i64 {
    rows.iter()
        .filter(|r| {
            RewardType::parse(&r.reward_type) == Some(RewardType::Gran)
                && r.subtype.as_deref() == Some(code)
        })
        .count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gran_row(subtype: Option<&str>) -> ActivityRow {
        ActivityRow {
            id: 0,
            participant_id: uuid::Uuid::nil(),
            reward_type: "gran".into(),
            subtype: subtype.map(str::to_string),
            points: 2,
            multiplier: 1.0,
            activity_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            description: None,
            verified_by: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn lectures_for_matches_code_only() {
        let rows = vec![
            gran_row(Some("nutrition")),
            gran_row(Some("nutrition")),
            gran_row(Some("recovery")),
            gran_row(None),
        ];
        assert_eq!(lectures_for(&rows, "nutrition"), 2);
        assert_eq!(lectures_for(&rows, "recovery"), 1);
        assert_eq!(lectures_for(&rows, "bjj"), 0);
    }

    #[test]
    fn lectures_for_ignores_non_gran_rows() {
        let mut row = gran_row(Some("bjj"));
        row.reward_type = "zakal".into();
        assert_eq!(lectures_for(&[row], "bjj"), 0);
    }
}
