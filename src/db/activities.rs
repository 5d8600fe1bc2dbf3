//! Activity ledger operations — validated append, listing, admin edit/delete.
//!
//! The ledger is append-only in the intended design; the admin surface may
//! still edit or delete a row, after which the caller is responsible for a
//! full recompute of the participant's derived state (points, direction
//! progress, totem eligibility). Nothing here patches caches.

use super::{ActivityRow, Database};
use crate::ledger::ValidatedActivity;
use anyhow::Result;

impl Database {
    /// Append a validated activity to the ledger.
    pub async fn insert_activity(&self, activity: &ValidatedActivity) -> Result<ActivityRow> {
        let row = sqlx::query_as::<_, ActivityRow>(
            "INSERT INTO activities
               (participant_id, reward_type, subtype, points, multiplier,
                activity_date, description, verified_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(activity.participant_id)
        .bind(activity.reward_type.as_str())
        .bind(&activity.subtype)
        .bind(activity.points)
        .bind(activity.multiplier)
        .bind(activity.activity_date)
        .bind(&activity.description)
        .bind(&activity.verified_by)
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    /// Full ledger for one participant. Order is irrelevant to aggregation;
    /// newest-first is for display.
    pub async fn list_activities(&self, participant_id: uuid::Uuid) -> Result<Vec<ActivityRow>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            "SELECT * FROM activities
             WHERE participant_id = $1
             ORDER BY activity_date DESC, id DESC",
        )
        .bind(participant_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Look up a single ledger row.
    pub async fn get_activity(&self, id: i64) -> Result<Option<ActivityRow>> {
        let row = sqlx::query_as::<_, ActivityRow>("SELECT * FROM activities WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    /// Admin correction: overwrite the scored fields of a ledger row.
    ///
    /// Semantically a delete + reinsert; the caller must recompute the
    /// participant's derived state afterwards. Returns the updated row, or
    /// `None` if the id was unknown.
    pub async fn update_activity(
        &self,
        id: i64,
        activity: &ValidatedActivity,
    ) -> Result<Option<ActivityRow>> {
        let row = sqlx::query_as::<_, ActivityRow>(
            "UPDATE activities SET
               reward_type = $2, subtype = $3, points = $4, multiplier = $5,
               activity_date = $6, description = $7, verified_by = $8
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(activity.reward_type.as_str())
        .bind(&activity.subtype)
        .bind(activity.points)
        .bind(activity.multiplier)
        .bind(activity.activity_date)
        .bind(&activity.description)
        .bind(&activity.verified_by)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Admin deletion of a ledger row. Returns the owning participant id so
    /// the caller can recompute, or `None` if the id was unknown.
    pub async fn delete_activity(&self, id: i64) -> Result<Option<uuid::Uuid>> {
        let participant = sqlx::query_scalar::<_, uuid::Uuid>(
            "DELETE FROM activities WHERE id = $1 RETURNING participant_id",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(participant)
    }
}
