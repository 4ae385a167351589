//! Shared fixtures for royalty-recon integration tests

#![allow(dead_code)]

pub mod fixtures;

use sqlx::SqlitePool;
use tempfile::TempDir;

/// File-backed database in a temp dir; keep the `TempDir` alive for the test
pub async fn temp_database() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = royalty_recon::db::init_database_pool(&dir.path().join("royalty.db"))
        .await
        .unwrap();
    (dir, pool)
}
