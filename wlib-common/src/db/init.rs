//! Database initialization
//!
//! Opens (or creates) the SQLite file and ensures the five logical
//! tables exist. All data columns are TEXT: the store is modeled after
//! the spreadsheet it replaced, where every cell is a string and typed
//! interpretation happens in the logic layer.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize the database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc creates the file on first run
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers while a submission writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema, for tests and embedding.
///
/// A single connection keeps every caller on the same `:memory:` store.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Idempotent schema creation, safe to run on every startup
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_members_table(pool).await?;
    create_inventory_table(pool).await?;
    create_reviews_table(pool).await?;
    create_signups_table(pool).await?;
    create_registrations_table(pool).await?;
    Ok(())
}

async fn create_members_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS members (
            member_id TEXT,
            phone_number TEXT,
            display_name TEXT,
            email TEXT,
            registered_date TEXT,
            active TEXT
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_inventory_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS inventory (
            wheel_id TEXT,
            wheel_name TEXT,
            brand TEXT,
            wheel_size TEXT,
            wheel_material TEXT,
            durometer_category TEXT,
            best_for TEXT,
            status TEXT,
            lender_id TEXT,
            bearings_included TEXT,
            bearing_size TEXT,
            bearing_material TEXT,
            timestamp TEXT
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_reviews_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS reviews (
            phone_number TEXT,
            display_name TEXT,
            wheel_id TEXT,
            wheel_name TEXT,
            experience_level TEXT,
            hours_on_wheels TEXT,
            rating TEXT,
            review_text TEXT,
            environment TEXT,
            timestamp TEXT
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_signups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS signups (
            timestamp TEXT,
            phone_number TEXT,
            display_name TEXT,
            experience_level TEXT,
            primary_style TEXT
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_registrations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS registrations (
            timestamp TEXT,
            phone_number TEXT,
            display_name TEXT,
            email TEXT
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}
