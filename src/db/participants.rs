//! Participant account management — registration, lookup, leaderboard,
//! cached point totals.
//!
//! The `points` column is a cache of the ledger sum with multipliers applied.
//! It is only ever written by the recompute pipeline, never patched
//! incrementally, so it always agrees with a full ledger recompute.

use super::{Database, LeaderboardRow, ParticipantRow};
use anyhow::Result;

impl Database {
    // ── Registration ──────────────────────────────────────────────

    /// Register a new participant, attached to the current stream if one is
    /// marked. Points start at zero and only move via ledger insertions.
    pub async fn register_participant(
        &self,
        full_name: &str,
        email: Option<&str>,
    ) -> Result<ParticipantRow> {
        let row = sqlx::query_as::<_, ParticipantRow>(
            "INSERT INTO participants (full_name, email, stream_id)
             VALUES ($1, $2, (SELECT id FROM streams WHERE is_current LIMIT 1))
             RETURNING *",
        )
        .bind(full_name)
        .bind(email)
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    /// Look up a participant by id.
    pub async fn get_participant(&self, id: uuid::Uuid) -> Result<Option<ParticipantRow>> {
        let row = sqlx::query_as::<_, ParticipantRow>("SELECT * FROM participants WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    /// List participants, optionally restricted to one stream.
    pub async fn list_participants(
        &self,
        stream_id: Option<uuid::Uuid>,
    ) -> Result<Vec<ParticipantRow>> {
        let rows = match stream_id {
            Some(sid) => {
                sqlx::query_as::<_, ParticipantRow>(
                    "SELECT * FROM participants WHERE stream_id = $1 ORDER BY full_name",
                )
                .bind(sid)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, ParticipantRow>(
                    "SELECT * FROM participants ORDER BY full_name",
                )
                .fetch_all(self.pool())
                .await?
            }
        };
        Ok(rows)
    }

    /// All participant ids, for the full recompute sweep.
    pub async fn list_participant_ids(&self) -> Result<Vec<uuid::Uuid>> {
        let ids = sqlx::query_scalar::<_, uuid::Uuid>("SELECT id FROM participants ORDER BY id")
            .fetch_all(self.pool())
            .await?;
        Ok(ids)
    }

    /// Number of participants registered in the current stream (gauge source).
    pub async fn count_current_stream_participants(&self) -> Result<i64> {
        let n = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM participants
             WHERE stream_id = (SELECT id FROM streams WHERE is_current LIMIT 1)",
        )
        .fetch_one(self.pool())
        .await?;
        Ok(n)
    }

    // ── Points cache ──────────────────────────────────────────────

    /// Overwrite the cached point total with a freshly recomputed sum.
    pub async fn set_participant_points(&self, id: uuid::Uuid, points: i64) -> Result<()> {
        sqlx::query("UPDATE participants SET points = $2 WHERE id = $1")
            .bind(id)
            .bind(points)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    // ── Leaderboard ───────────────────────────────────────────────

    /// Points-ordered participants of the current stream with totem counts.
    ///
    /// Ties share a rank; rows order by points then name for a stable
    /// display.
    pub async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardRow>> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            "SELECT p.id, p.full_name, p.points,
                    COUNT(pt.totem_type) AS totem_count,
                    RANK() OVER (ORDER BY p.points DESC) AS rank
             FROM participants p
             LEFT JOIN participant_totems pt ON pt.participant_id = p.id
             WHERE p.stream_id = (SELECT id FROM streams WHERE is_current LIMIT 1)
             GROUP BY p.id, p.full_name, p.points
             ORDER BY p.points DESC, p.full_name
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    // ── Admin escape hatch ────────────────────────────────────────

    /// Hard-delete a participant and all dependent rows (admin only; normal
    /// flow never deletes). Returns false if the id was unknown.
    pub async fn delete_participant(&self, id: uuid::Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM participants WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
