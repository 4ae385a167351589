//! Release catalog access
//!
//! The catalog is owned by the artist portal; the royalty services only read
//! it. `insert_release` exists for seeding and administrative tooling.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Statuses whose releases may receive royalty matches
pub const MATCHABLE_STATUSES: [ReleaseStatus; 4] = [
    ReleaseStatus::Approved,
    ReleaseStatus::Published,
    ReleaseStatus::Distributed,
    ReleaseStatus::Pending,
];

const ELIGIBLE_FILTER: &str = "status IN ('approved', 'published', 'distributed', 'pending')";

/// Release product line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    Basic,
    Exclusive,
}

impl ReleaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseKind::Basic => "basic",
            ReleaseKind::Exclusive => "exclusive",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "basic" => Ok(ReleaseKind::Basic),
            "exclusive" => Ok(ReleaseKind::Exclusive),
            other => Err(Error::InvalidInput(format!("Unknown release kind: {}", other))),
        }
    }
}

/// Release moderation / distribution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Published,
    Distributed,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Draft => "draft",
            ReleaseStatus::Pending => "pending",
            ReleaseStatus::Approved => "approved",
            ReleaseStatus::Rejected => "rejected",
            ReleaseStatus::Published => "published",
            ReleaseStatus::Distributed => "distributed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "draft" => Ok(ReleaseStatus::Draft),
            "pending" => Ok(ReleaseStatus::Pending),
            "approved" => Ok(ReleaseStatus::Approved),
            "rejected" => Ok(ReleaseStatus::Rejected),
            "published" => Ok(ReleaseStatus::Published),
            "distributed" => Ok(ReleaseStatus::Distributed),
            other => Err(Error::InvalidInput(format!("Unknown release status: {}", other))),
        }
    }

    /// Whether releases in this status take part in royalty matching
    pub fn is_matchable(&self) -> bool {
        MATCHABLE_STATUSES.contains(self)
    }
}

/// One track of a catalog release
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogTrack {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub isrc: Option<String>,
}

/// Catalog release as seen by the royalty services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRelease {
    pub id: String,
    pub user_id: Option<String>,
    pub kind: ReleaseKind,
    pub status: ReleaseStatus,
    pub artist_name: String,
    pub title: String,
    pub upc: Option<String>,
    pub cover_url: Option<String>,
    pub tracks: Vec<CatalogTrack>,
}

fn release_from_row(row: &SqliteRow) -> Result<CatalogRelease> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let tracks: String = row.try_get("tracks")?;
    let id: String = row.try_get("id")?;

    // A malformed track list must not hide the release from UPC/title matching
    let tracks: Vec<CatalogTrack> = serde_json::from_str(&tracks).unwrap_or_else(|e| {
        tracing::warn!(release_id = %id, error = %e, "Unreadable track list in catalog release");
        Vec::new()
    });

    Ok(CatalogRelease {
        id,
        user_id: row.try_get("user_id")?,
        kind: ReleaseKind::parse(&kind)?,
        status: ReleaseStatus::parse(&status)?,
        artist_name: row.try_get("artist_name")?,
        title: row.try_get("title")?,
        upc: row.try_get("upc")?,
        cover_url: row.try_get("cover_url")?,
        tracks,
    })
}

fn releases_from_rows(rows: Vec<SqliteRow>) -> Result<Vec<CatalogRelease>> {
    rows.iter().map(release_from_row).collect()
}

const RELEASE_COLUMNS: &str = "id, user_id, kind, status, artist_name, title, upc, cover_url, tracks";

/// All releases eligible for matching, ordered by kind then id
pub async fn eligible_releases(pool: &SqlitePool) -> Result<Vec<CatalogRelease>> {
    let sql = format!(
        "SELECT {} FROM catalog_releases WHERE {} ORDER BY kind, id",
        RELEASE_COLUMNS, ELIGIBLE_FILTER
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    releases_from_rows(rows)
}

/// Eligible releases whose UPC equals `upc`
pub async fn releases_by_upc(pool: &SqlitePool, upc: &str) -> Result<Vec<CatalogRelease>> {
    let sql = format!(
        "SELECT {} FROM catalog_releases WHERE upc = ? AND {} ORDER BY kind, id",
        RELEASE_COLUMNS, ELIGIBLE_FILTER
    );
    let rows = sqlx::query(&sql).bind(upc).fetch_all(pool).await?;
    releases_from_rows(rows)
}

/// Eligible releases whose UPC starts with `prefix` (case-insensitive)
pub async fn releases_by_upc_prefix(pool: &SqlitePool, prefix: &str) -> Result<Vec<CatalogRelease>> {
    let pattern = format!("{}%", escape_like(prefix));
    let sql = format!(
        "SELECT {} FROM catalog_releases WHERE upc LIKE ? ESCAPE '\\' AND {} ORDER BY kind, id",
        RELEASE_COLUMNS, ELIGIBLE_FILTER
    );
    let rows = sqlx::query(&sql).bind(pattern).fetch_all(pool).await?;
    releases_from_rows(rows)
}

/// Releases by id regardless of status (used for report enrichment)
pub async fn releases_by_ids(pool: &SqlitePool, ids: &[String]) -> Result<Vec<CatalogRelease>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM catalog_releases WHERE id IN ({})",
        RELEASE_COLUMNS, placeholders
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(pool).await?;
    releases_from_rows(rows)
}

/// Insert or replace a catalog release
pub async fn insert_release(pool: &SqlitePool, release: &CatalogRelease) -> Result<()> {
    let tracks = serde_json::to_string(&release.tracks)
        .map_err(|e| Error::Internal(format!("Failed to serialize tracks: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO catalog_releases (id, user_id, kind, status, artist_name, title, upc, cover_url, tracks)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            user_id = excluded.user_id,
            kind = excluded.kind,
            status = excluded.status,
            artist_name = excluded.artist_name,
            title = excluded.title,
            upc = excluded.upc,
            cover_url = excluded.cover_url,
            tracks = excluded.tracks
        "#,
    )
    .bind(&release.id)
    .bind(&release.user_id)
    .bind(release.kind.as_str())
    .bind(release.status.as_str())
    .bind(&release.artist_name)
    .bind(&release.title)
    .bind(&release.upc)
    .bind(&release.cover_url)
    .bind(tracks)
    .execute(pool)
    .await?;

    Ok(())
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
