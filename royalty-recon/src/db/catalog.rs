//! SQLite-backed release catalog for the resolver

use crate::services::catalog_resolver::ReleaseCatalog;
use async_trait::async_trait;
use royalty_common::db::catalog::{self, CatalogRelease};
use royalty_common::Result;
use sqlx::SqlitePool;

/// Reads eligible releases from the shared `catalog_releases` table
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReleaseCatalog for SqliteCatalog {
    async fn eligible_releases(&self) -> Result<Vec<CatalogRelease>> {
        catalog::eligible_releases(&self.pool).await
    }

    async fn releases_by_upc(&self, upc: &str) -> Result<Vec<CatalogRelease>> {
        catalog::releases_by_upc(&self.pool, upc).await
    }

    async fn releases_by_upc_prefix(&self, prefix: &str) -> Result<Vec<CatalogRelease>> {
        catalog::releases_by_upc_prefix(&self.pool, prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::{AggregatedTrack, MatchBasis};
    use crate::services::catalog_resolver::CatalogResolver;
    use royalty_common::db::catalog::{insert_release, CatalogTrack, ReleaseKind, ReleaseStatus};

    #[tokio::test]
    async fn test_resolver_over_sqlite_catalog() {
        let pool = test_pool().await;
        insert_release(
            &pool,
            &CatalogRelease {
                id: "rel-1".to_string(),
                user_id: Some("u1".to_string()),
                kind: ReleaseKind::Exclusive,
                status: ReleaseStatus::Distributed,
                artist_name: "Artist".to_string(),
                title: "Album".to_string(),
                upc: Some("4601234567890".to_string()),
                cover_url: None,
                tracks: vec![CatalogTrack {
                    title: "Song".to_string(),
                    isrc: Some("RUAB12400001".to_string()),
                }],
            },
        )
        .await
        .unwrap();

        let resolver = CatalogResolver::new(SqliteCatalog::new(pool));
        let track = AggregatedTrack {
            upc: "4601239999999".to_string(),
            ..Default::default()
        };

        let m = resolver.resolve(&track).await.unwrap();
        assert_eq!(m.basis, MatchBasis::UpcPrefix);
        assert_eq!(m.release_kind, ReleaseKind::Exclusive);
        assert_eq!(m.user_id.as_deref(), Some("u1"));
    }
}
