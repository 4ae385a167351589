//! Database access for royalty-recon
//!
//! Shared platform tables come from `royalty_common::db`; this module adds
//! the report, statistics and payout tables owned by the reconciliation.

pub mod catalog;
pub mod payouts;
pub mod reports;
pub mod settings;
pub mod statistics;

use royalty_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open the shared database and create the reconciliation tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = royalty_common::db::init_database(db_path).await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create reconciliation tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS royalty_reports (
            id TEXT PRIMARY KEY,
            quarter TEXT NOT NULL,
            year INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'processing'
                CHECK (status IN ('processing', 'completed', 'failed')),
            total_files INTEGER NOT NULL DEFAULT 0,
            processed_files INTEGER NOT NULL DEFAULT 0,
            total_rows INTEGER NOT NULL DEFAULT 0,
            matched_tracks INTEGER NOT NULL DEFAULT 0,
            unmatched_tracks INTEGER NOT NULL DEFAULT 0,
            total_streams INTEGER NOT NULL DEFAULT 0,
            total_revenue TEXT NOT NULL DEFAULT '0',
            processing_progress INTEGER NOT NULL DEFAULT 0,
            error_log TEXT,
            uploaded_by TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // NULL isrc never conflicts, so ISRC-less tracks are always plain inserts
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS track_statistics (
            id TEXT PRIMARY KEY,
            report_id TEXT NOT NULL,
            quarter TEXT NOT NULL,
            year INTEGER NOT NULL,
            isrc TEXT,
            upc TEXT,
            track_title TEXT NOT NULL DEFAULT '',
            release_title TEXT NOT NULL DEFAULT '',
            artist_name TEXT NOT NULL DEFAULT '',
            release_id TEXT,
            release_type TEXT,
            track_index INTEGER,
            user_id TEXT,
            match_basis TEXT,
            is_matched INTEGER NOT NULL DEFAULT 0,
            streams INTEGER NOT NULL DEFAULT 0,
            revenue TEXT NOT NULL DEFAULT '0',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (isrc, quarter, year)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_track_statistics_report ON track_statistics(report_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_track_statistics_user ON track_statistics(user_id)")
        .execute(pool)
        .await?;

    for (table, column) in [
        ("country_statistics", "country_name"),
        ("platform_statistics", "platform_name"),
    ] {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                track_stat_id TEXT NOT NULL REFERENCES track_statistics(id) ON DELETE CASCADE,
                report_id TEXT NOT NULL,
                {column} TEXT NOT NULL,
                streams INTEGER NOT NULL DEFAULT 0,
                revenue TEXT NOT NULL DEFAULT '0',
                UNIQUE (track_stat_id, {column})
            )
            "#
        ))
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_report ON {table}(report_id)"
        ))
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS royalty_payouts (
            id TEXT PRIMARY KEY,
            report_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            quarter TEXT NOT NULL,
            year INTEGER NOT NULL,
            amount TEXT NOT NULL DEFAULT '0',
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'credited', 'failed')),
            last_error TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            credited_at TEXT,
            UNIQUE (report_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Single-connection in-memory pool with every table
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    royalty_common::db::create_shared_schema(&pool).await.unwrap();
    init_tables(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_database_pool_creates_all_tables() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database_pool(&dir.path().join("royalty.db")).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(&pool)
            .await
            .unwrap();

        for expected in [
            "royalty_reports",
            "track_statistics",
            "country_statistics",
            "platform_statistics",
            "royalty_payouts",
            "catalog_releases",
            "user_balances",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {}", expected);
        }

        init_tables(&pool).await.expect("table creation should be idempotent");
    }
}
