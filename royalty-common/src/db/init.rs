//! Database initialization
//!
//! Opens (or creates) the shared SQLite database and creates the platform
//! tables used by every royalty service. Schema creation is idempotent.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create shared tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(250));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_shared_schema(&pool).await?;

    Ok(pool)
}

/// Create the shared platform tables (catalog, balances, audit, settings)
pub async fn create_shared_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_catalog_releases_table(pool).await?;
    create_user_balances_table(pool).await?;
    create_balance_entries_table(pool).await?;
    create_profile_balances_view(pool).await?;
    create_transactions_table(pool).await?;
    Ok(())
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_catalog_releases_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_releases (
            id TEXT PRIMARY KEY,
            user_id TEXT,
            kind TEXT NOT NULL DEFAULT 'basic' CHECK (kind IN ('basic', 'exclusive')),
            status TEXT NOT NULL,
            artist_name TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL DEFAULT '',
            upc TEXT,
            cover_url TEXT,
            tracks TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_catalog_releases_status ON catalog_releases(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_catalog_releases_upc ON catalog_releases(upc)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_user_balances_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_balances (
            user_id TEXT PRIMARY KEY,
            balance TEXT NOT NULL DEFAULT '0',
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_balance_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS balance_entries (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('credit', 'debit')),
            amount TEXT NOT NULL,
            balance_after TEXT NOT NULL,
            report_id TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_balance_entries_user ON balance_entries(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Legacy profile-shaped balance, derived from `user_balances` and never written
async fn create_profile_balances_view(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE VIEW IF NOT EXISTS profile_balances AS
        SELECT user_id AS id, balance FROM user_balances
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_transactions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            type TEXT NOT NULL,
            amount TEXT NOT NULL,
            currency TEXT NOT NULL,
            balance_before TEXT NOT NULL,
            balance_after TEXT NOT NULL,
            status TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            payment_method TEXT,
            reference_id TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}
