//! # Database — PostgreSQL Storage Layer
//!
//! Provides async database operations for participants, the activity ledger,
//! totems, directions, and streams via `sqlx::PgPool` connecting to Supabase
//! PostgreSQL.
//!
//! ## Schema
//!
//! - `streams`: program cohorts; exactly one row carries `is_current`
//! - `participants`: identity + cached cumulative points
//! - `activities`: append-only scored-event ledger
//! - `totem_requirements`: declarative award rules (static reference data)
//! - `participant_totems`: earned totems, unique on (participant, totem)
//! - `directions`: discipline tracks with completion requirements
//! - `direction_progress`: cached per-(participant, direction) counters
//! - `special_badges`: admin-granted discrete awards
//!
//! ## Module Structure
//!
//! Operations are split into submodules by domain:
//!
//! - [`participants`] — registration, lookup, leaderboard, points sync
//! - [`activities`] — ledger append, listing, admin edit/delete
//! - [`totems`] — requirement table, conditional grants, special badges
//! - [`directions`] — direction catalog and progress cache upserts
//! - [`streams`] — cohort listing and the current-stream swap

mod activities;
mod directions;
mod participants;
mod streams;
mod totems;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

// ── Participant types ───────────────────────────────────────────

#[derive(Clone, Serialize, sqlx::FromRow)]
pub struct ParticipantRow {
    pub id: uuid::Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub stream_id: Option<uuid::Uuid>,
    pub points: i64,
    pub registered_at: chrono::DateTime<chrono::Utc>,
}

/// Leaderboard entry: participants of the current stream ordered by points.
#[derive(Serialize, sqlx::FromRow)]
pub struct LeaderboardRow {
    pub id: uuid::Uuid,
    pub full_name: String,
    pub points: i64,
    pub totem_count: i64,
    pub rank: i64,
}

// ── Ledger types ────────────────────────────────────────────────

#[derive(Clone, Serialize, sqlx::FromRow)]
pub struct ActivityRow {
    pub id: i64,
    pub participant_id: uuid::Uuid,
    pub reward_type: String,
    pub subtype: Option<String>,
    pub points: i64,
    pub multiplier: f64,
    pub activity_date: chrono::NaiveDate,
    pub description: Option<String>,
    pub verified_by: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// ── Totem types ─────────────────────────────────────────────────

#[derive(Clone, Serialize, sqlx::FromRow)]
pub struct TotemRequirementRow {
    pub totem_type: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub requirements: Value,
}

#[derive(Clone, Serialize, sqlx::FromRow)]
pub struct ParticipantTotemRow {
    pub participant_id: uuid::Uuid,
    pub totem_type: String,
    pub earned_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Serialize, sqlx::FromRow)]
pub struct SpecialBadgeRow {
    pub id: i64,
    pub participant_id: uuid::Uuid,
    pub badge_type: String,
    pub rank_position: Option<i32>,
    pub granted_by: Option<String>,
    pub granted_at: chrono::DateTime<chrono::Utc>,
}

// ── Direction types ─────────────────────────────────────────────

#[derive(Clone, Serialize, sqlx::FromRow)]
pub struct DirectionRow {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub required_activities: i64,
    pub required_lectures: i64,
    pub has_final_test: bool,
    pub totem_type: Option<String>,
}

#[derive(Clone, Serialize, sqlx::FromRow)]
pub struct DirectionProgressRow {
    pub participant_id: uuid::Uuid,
    pub direction_id: i64,
    pub activities_completed: i64,
    pub lectures_completed: i64,
    pub final_test_passed: bool,
    pub progress_percentage: f64,
    pub totem_earned: bool,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

// ── Stream types ────────────────────────────────────────────────

#[derive(Clone, Serialize, sqlx::FromRow)]
pub struct StreamRow {
    pub id: uuid::Uuid,
    pub name: String,
    pub starts_on: chrono::NaiveDate,
    pub ends_on: chrono::NaiveDate,
    pub is_current: bool,
}

// ── Database struct and connection ──────────────────────────────

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL using the provided database URL.
    ///
    /// Manually parses the URL to preserve the full username — sqlx's built-in
    /// parser strips the ".project-ref" suffix that Supabase pooler requires.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let url = url::Url::parse(database_url)?;
        let username = urlencoding::decode(url.username())?.into_owned();
        let password = url
            .password()
            .map(|p| urlencoding::decode(p).map(|s| s.into_owned()))
            .transpose()?;
        let mut opts = PgConnectOptions::new()
            .host(url.host_str().unwrap_or("localhost"))
            .port(url.port().unwrap_or(5432))
            .database(url.path().trim_start_matches('/'))
            .username(&username)
            .statement_cache_capacity(0);
        if let Some(ref pw) = password {
            opts = opts.password(pw);
        }
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;
        Ok(Database { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check: execute `SELECT 1` to verify database connectivity.
    ///
    /// Used by the `/readyz` readiness probe. Returns `Ok(())` if the
    /// database responds, or an error if the connection is broken.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
