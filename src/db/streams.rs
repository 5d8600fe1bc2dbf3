//! Stream (cohort) management.
//!
//! The "current stream" pointer is process-wide state with multiple admin
//! writers, so the swap runs as a single transaction: clear every flag, set
//! exactly one. Two racing swaps serialize on the row locks and the loser's
//! result stands — at no point can two streams both read as current.

use super::{Database, StreamRow};
use anyhow::Result;
use chrono::NaiveDate;

impl Database {
    /// All streams, newest first.
    pub async fn get_streams(&self) -> Result<Vec<StreamRow>> {
        let rows = sqlx::query_as::<_, StreamRow>("SELECT * FROM streams ORDER BY starts_on DESC")
            .fetch_all(self.pool())
            .await?;
        Ok(rows)
    }

    /// The stream currently marked current, if any.
    pub async fn get_current_stream(&self) -> Result<Option<StreamRow>> {
        let row = sqlx::query_as::<_, StreamRow>("SELECT * FROM streams WHERE is_current LIMIT 1")
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    /// Create a stream. New streams are never current until explicitly set.
    pub async fn create_stream(
        &self,
        name: &str,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
    ) -> Result<StreamRow> {
        let row = sqlx::query_as::<_, StreamRow>(
            "INSERT INTO streams (name, starts_on, ends_on)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(name)
        .bind(starts_on)
        .bind(ends_on)
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    /// Transactional current-stream swap: clear-all-then-set-one.
    ///
    /// Returns false (and rolls back the clear) if the target id is unknown,
    /// leaving the previous pointer intact.
    pub async fn set_current_stream(&self, id: uuid::Uuid) -> Result<bool> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("UPDATE streams SET is_current = FALSE WHERE is_current")
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("UPDATE streams SET is_current = TRUE WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }
}
