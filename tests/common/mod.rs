//! Shared test helpers for integration tests.

#![allow(dead_code)]

use tokio::sync::OnceCell;

/// Returns the test database URL from the `TEST_DATABASE_URL` environment variable.
/// Panics if the variable is not set.
pub fn test_db_url() -> String {
    std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set for integration tests")
}

/// Returns true if the test database URL is configured.
pub fn has_test_db() -> bool {
    std::env::var("TEST_DATABASE_URL").is_ok()
}

/// One-time schema initialization.
static SCHEMA_INIT: OnceCell<()> = OnceCell::const_new();

/// Ensure the test database schema is set up (runs migrations once per test binary).
pub async fn ensure_schema() {
    SCHEMA_INIT
        .get_or_init(|| async {
            let pool = sqlx::PgPool::connect(&test_db_url()).await.unwrap();
            run_migrations(&pool).await;
        })
        .await;
}

/// Connect to the test database (also ensures schema is set up).
pub async fn setup_test_db() -> kemp::db::Database {
    ensure_schema().await;
    let db = kemp::db::Database::connect(&test_db_url())
        .await
        .expect("Failed to connect to test database");
    truncate_all_tables(db.pool()).await;
    db
}

/// Build an Axum test app router connected to the test database.
pub async fn build_test_app() -> axum::Router {
    let db = setup_test_db().await;
    let state = kemp::portal::AppState::with_db(db);
    kemp::portal::build_router(state)
}

/// Truncate all mutable tables and re-seed a current stream, so every test
/// starts with a known-clean state. Reference data (totem requirements,
/// directions) is left as seeded by the migrations.
pub async fn truncate_all_tables(pool: &sqlx::PgPool) {
    sqlx::raw_sql(
        "TRUNCATE TABLE special_badges, direction_progress, participant_totems,
                        activities, participants, streams
         CASCADE",
    )
    .execute(pool)
    .await
    .unwrap();

    sqlx::raw_sql(
        "INSERT INTO streams (name, starts_on, ends_on, is_current)
         VALUES ('Test stream', '2026-01-12', '2026-03-08', TRUE)",
    )
    .execute(pool)
    .await
    .unwrap();
}

/// Run all migrations against the test database, in filename order.
async fn run_migrations(pool: &sqlx::PgPool) {
    let migration_files = [
        "supabase/migrations/001_core_tables.sql",
        "supabase/migrations/002_reference_data.sql",
    ];

    for file in &migration_files {
        let path = std::path::Path::new(file);
        if !path.exists() {
            panic!("Migration file not found: {}", file);
        }
        let sql = std::fs::read_to_string(path).unwrap();
        sqlx::raw_sql(&sql).execute(pool).await.unwrap_or_else(|e| {
            panic!("Migration {} failed: {}", file, e);
        });
    }
}
