//! Direction catalog and per-participant progress cache.
//!
//! `direction_progress` rows are a cache of ledger-derived counters plus the
//! computed percentage. They are upserted wholesale by the recompute pipeline
//! on every ledger write — never patched field by field — so a read either
//! sees a complete consistent row or nothing. The `totem_earned` flag is
//! one-way: the upsert ORs the stored value with the new one.

use super::{Database, DirectionProgressRow, DirectionRow};
use anyhow::Result;

impl Database {
    /// The direction catalog (static reference data).
    pub async fn get_directions(&self) -> Result<Vec<DirectionRow>> {
        let rows = sqlx::query_as::<_, DirectionRow>("SELECT * FROM directions ORDER BY id")
            .fetch_all(self.pool())
            .await?;
        Ok(rows)
    }

    /// Look up a direction by id.
    pub async fn get_direction(&self, id: i64) -> Result<Option<DirectionRow>> {
        let row = sqlx::query_as::<_, DirectionRow>("SELECT * FROM directions WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    /// Cached progress for one (participant, direction) pair.
    pub async fn get_direction_progress(
        &self,
        participant_id: uuid::Uuid,
        direction_id: i64,
    ) -> Result<Option<DirectionProgressRow>> {
        let row = sqlx::query_as::<_, DirectionProgressRow>(
            "SELECT * FROM direction_progress
             WHERE participant_id = $1 AND direction_id = $2",
        )
        .bind(participant_id)
        .bind(direction_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// All cached progress rows for one participant.
    pub async fn list_direction_progress(
        &self,
        participant_id: uuid::Uuid,
    ) -> Result<Vec<DirectionProgressRow>> {
        let rows = sqlx::query_as::<_, DirectionProgressRow>(
            "SELECT * FROM direction_progress
             WHERE participant_id = $1 ORDER BY direction_id",
        )
        .bind(participant_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Replace the cached progress row for a (participant, direction) pair.
    ///
    /// `totem_earned` can only flip false→true here; a recompute that lands
    /// below 100% after an admin ledger edit leaves an earned flag standing.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_direction_progress(
        &self,
        participant_id: uuid::Uuid,
        direction_id: i64,
        activities_completed: i64,
        lectures_completed: i64,
        final_test_passed: bool,
        progress_percentage: f64,
        totem_earned: bool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO direction_progress
               (participant_id, direction_id, activities_completed, lectures_completed,
                final_test_passed, progress_percentage, totem_earned)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (participant_id, direction_id) DO UPDATE SET
               activities_completed = EXCLUDED.activities_completed,
               lectures_completed = EXCLUDED.lectures_completed,
               final_test_passed = EXCLUDED.final_test_passed,
               progress_percentage = EXCLUDED.progress_percentage,
               totem_earned = direction_progress.totem_earned OR EXCLUDED.totem_earned,
               updated_at = NOW()",
        )
        .bind(participant_id)
        .bind(direction_id)
        .bind(activities_completed)
        .bind(lectures_completed)
        .bind(final_test_passed)
        .bind(progress_percentage)
        .bind(totem_earned)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
