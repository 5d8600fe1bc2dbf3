//! Totem and special-badge grants.
//!
//! Grants are append-only and guarded by a uniqueness constraint on
//! (participant_id, totem_type): two concurrent evaluations for the same pair
//! cannot both insert, and the losing insert is indistinguishable from "grant
//! already exists" — which is exactly how callers treat it.

use super::{Database, ParticipantTotemRow, SpecialBadgeRow, TotemRequirementRow};
use anyhow::Result;

impl Database {
    // ── Reference data ────────────────────────────────────────────

    /// The declarative requirement table, stable display order.
    pub async fn get_totem_requirements(&self) -> Result<Vec<TotemRequirementRow>> {
        let rows = sqlx::query_as::<_, TotemRequirementRow>(
            "SELECT totem_type, name, icon, description, requirements
             FROM totem_requirements ORDER BY totem_type",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    // ── Grants ────────────────────────────────────────────────────

    /// Earned totems for one participant.
    pub async fn get_participant_totems(
        &self,
        participant_id: uuid::Uuid,
    ) -> Result<Vec<ParticipantTotemRow>> {
        let rows = sqlx::query_as::<_, ParticipantTotemRow>(
            "SELECT participant_id, totem_type, earned_at
             FROM participant_totems WHERE participant_id = $1
             ORDER BY earned_at",
        )
        .bind(participant_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Conditionally insert a totem grant.
    ///
    /// Returns `Some(row)` if this call created the grant, `None` if a grant
    /// already existed (including the case where a concurrent call won the
    /// race) — `earned_at` of an existing grant is never touched.
    pub async fn grant_totem(
        &self,
        participant_id: uuid::Uuid,
        totem_type: &str,
    ) -> Result<Option<ParticipantTotemRow>> {
        let row = sqlx::query_as::<_, ParticipantTotemRow>(
            "INSERT INTO participant_totems (participant_id, totem_type)
             VALUES ($1, $2)
             ON CONFLICT (participant_id, totem_type) DO NOTHING
             RETURNING participant_id, totem_type, earned_at",
        )
        .bind(participant_id)
        .bind(totem_type)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    // ── Special badges ────────────────────────────────────────────

    /// Admin-granted discrete award, optionally tied to a rank position.
    /// Same append-only grant pattern as totems, but repeatable by type.
    pub async fn grant_special_badge(
        &self,
        participant_id: uuid::Uuid,
        badge_type: &str,
        rank_position: Option<i32>,
        granted_by: Option<&str>,
    ) -> Result<SpecialBadgeRow> {
        let row = sqlx::query_as::<_, SpecialBadgeRow>(
            "INSERT INTO special_badges (participant_id, badge_type, rank_position, granted_by)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(participant_id)
        .bind(badge_type)
        .bind(rank_position)
        .bind(granted_by)
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    /// Special badges for one participant, newest first.
    pub async fn list_special_badges(
        &self,
        participant_id: uuid::Uuid,
    ) -> Result<Vec<SpecialBadgeRow>> {
        let rows = sqlx::query_as::<_, SpecialBadgeRow>(
            "SELECT * FROM special_badges WHERE participant_id = $1
             ORDER BY granted_at DESC",
        )
        .bind(participant_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}
