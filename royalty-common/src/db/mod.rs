//! Shared database access
//!
//! Tables owned by the wider platform (catalog, balances, audit
//! transactions, settings). Service-specific tables live with each service.

pub mod balances;
pub mod catalog;
pub mod init;
pub mod settings;
pub mod transactions;

pub use init::{create_shared_schema, init_database};

/// Single-connection in-memory pool with the shared schema
///
/// One connection keeps every query on the same in-memory database.
#[cfg(test)]
pub(crate) async fn test_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_shared_schema(&pool).await.unwrap();
    pool
}
