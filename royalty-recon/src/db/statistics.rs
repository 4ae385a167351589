//! Track, country and platform statistics
//!
//! Track rows are keyed by `(isrc, quarter, year)`: re-processing the same
//! period updates the existing row instead of duplicating it. Country and
//! platform rows hang off a track row and are insert-once.

use crate::models::{AggregatedTrack, Tally, TrackMatch};
use royalty_common::amount::{parse_stored, to_stored};
use royalty_common::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Which breakdown table a query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakdown {
    Country,
    Platform,
}

impl Breakdown {
    fn table(&self) -> &'static str {
        match self {
            Breakdown::Country => "country_statistics",
            Breakdown::Platform => "platform_statistics",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Breakdown::Country => "country_name",
            Breakdown::Platform => "platform_name",
        }
    }
}

/// Persisted per-track statistic
#[derive(Debug, Clone, Serialize)]
pub struct TrackStatistic {
    pub id: String,
    pub report_id: String,
    pub quarter: String,
    pub year: i32,
    pub isrc: Option<String>,
    pub upc: Option<String>,
    pub track_title: String,
    pub release_title: String,
    pub artist_name: String,
    pub release_id: Option<String>,
    pub release_type: Option<String>,
    pub track_index: Option<i64>,
    pub user_id: Option<String>,
    pub match_basis: Option<String>,
    pub is_matched: bool,
    pub streams: i64,
    pub revenue: Decimal,
}

/// One breakdown row (country or platform of one track)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub name: String,
    pub streams: i64,
    pub revenue: Decimal,
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Upsert the statistic for one aggregated track, returning the row id
pub async fn upsert_track_statistic(
    conn: &mut SqliteConnection,
    report_id: &str,
    quarter: &str,
    year: i32,
    track: &AggregatedTrack,
    matched: Option<&TrackMatch>,
) -> Result<String> {
    let id: String = sqlx::query_scalar(
        r#"
        INSERT INTO track_statistics (
            id, report_id, quarter, year, isrc, upc, track_title, release_title, artist_name,
            release_id, release_type, track_index, user_id, match_basis, is_matched, streams, revenue
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (isrc, quarter, year) DO UPDATE SET
            report_id = excluded.report_id,
            upc = excluded.upc,
            track_title = excluded.track_title,
            release_title = excluded.release_title,
            artist_name = excluded.artist_name,
            release_id = excluded.release_id,
            release_type = excluded.release_type,
            track_index = excluded.track_index,
            user_id = excluded.user_id,
            match_basis = excluded.match_basis,
            is_matched = excluded.is_matched,
            streams = excluded.streams,
            revenue = excluded.revenue
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(report_id)
    .bind(quarter)
    .bind(year)
    .bind(non_empty(&track.isrc))
    .bind(non_empty(&track.upc))
    .bind(&track.track_title)
    .bind(&track.release_title)
    .bind(&track.artist_name)
    .bind(matched.map(|m| m.release_id.as_str()))
    .bind(matched.map(|m| m.release_kind.as_str()))
    .bind(matched.map(|m| m.track_index as i64))
    .bind(matched.and_then(|m| m.user_id.as_deref()))
    .bind(matched.map(|m| m.basis.as_str()))
    .bind(matched.is_some())
    .bind(track.streams)
    .bind(to_stored(track.revenue))
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Insert one breakdown row; returns false when it already existed
pub async fn insert_breakdown(
    conn: &mut SqliteConnection,
    kind: Breakdown,
    track_stat_id: &str,
    report_id: &str,
    name: &str,
    tally: &Tally,
) -> Result<bool> {
    let sql = format!(
        "INSERT INTO {} (id, track_stat_id, report_id, {}, streams, revenue) VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT (track_stat_id, {}) DO NOTHING",
        kind.table(),
        kind.column(),
        kind.column()
    );
    let result = sqlx::query(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(track_stat_id)
        .bind(report_id)
        .bind(name)
        .bind(tally.streams)
        .bind(to_stored(tally.revenue))
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn track_statistic_from_row(row: &SqliteRow) -> Result<TrackStatistic> {
    let revenue: String = row.get("revenue");
    let is_matched: i64 = row.get("is_matched");
    Ok(TrackStatistic {
        id: row.get("id"),
        report_id: row.get("report_id"),
        quarter: row.get("quarter"),
        year: row.get("year"),
        isrc: row.get("isrc"),
        upc: row.get("upc"),
        track_title: row.get("track_title"),
        release_title: row.get("release_title"),
        artist_name: row.get("artist_name"),
        release_id: row.get("release_id"),
        release_type: row.get("release_type"),
        track_index: row.get("track_index"),
        user_id: row.get("user_id"),
        match_basis: row.get("match_basis"),
        is_matched: is_matched != 0,
        streams: row.get("streams"),
        revenue: parse_stored(&revenue)?,
    })
}

const TRACK_COLUMNS: &str = "id, report_id, quarter, year, isrc, upc, track_title, release_title, artist_name, \
    release_id, release_type, track_index, user_id, match_basis, is_matched, streams, revenue";

pub async fn track_stats_for_report(pool: &SqlitePool, report_id: &str) -> Result<Vec<TrackStatistic>> {
    let sql = format!(
        "SELECT {} FROM track_statistics WHERE report_id = ? ORDER BY rowid",
        TRACK_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(report_id).fetch_all(pool).await?;
    rows.iter().map(track_statistic_from_row).collect()
}

pub async fn track_stats_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<TrackStatistic>> {
    let sql = format!(
        "SELECT {} FROM track_statistics WHERE user_id = ? AND is_matched = 1 ORDER BY rowid",
        TRACK_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(pool).await?;
    rows.iter().map(track_statistic_from_row).collect()
}

fn breakdown_from_row(row: &SqliteRow) -> Result<BreakdownRow> {
    let revenue: String = row.get("revenue");
    Ok(BreakdownRow {
        name: row.get("name"),
        streams: row.get("streams"),
        revenue: parse_stored(&revenue)?,
    })
}

/// Breakdown rows recorded by one report
pub async fn breakdown_rows_for_report(
    pool: &SqlitePool,
    kind: Breakdown,
    report_id: &str,
) -> Result<Vec<BreakdownRow>> {
    let sql = format!(
        "SELECT {} AS name, streams, revenue FROM {} WHERE report_id = ?",
        kind.column(),
        kind.table()
    );
    let rows = sqlx::query(&sql).bind(report_id).fetch_all(pool).await?;
    rows.iter().map(breakdown_from_row).collect()
}

/// Breakdown rows of every matched track owned by a user
pub async fn breakdown_rows_for_user(pool: &SqlitePool, kind: Breakdown, user_id: &str) -> Result<Vec<BreakdownRow>> {
    let sql = format!(
        "SELECT b.{} AS name, b.streams, b.revenue FROM {} b \
         JOIN track_statistics t ON t.id = b.track_stat_id \
         WHERE t.user_id = ? AND t.is_matched = 1",
        kind.column(),
        kind.table()
    );
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(pool).await?;
    rows.iter().map(breakdown_from_row).collect()
}

/// Revenue of matched, owned tracks of one report, per user (sorted by user id)
pub async fn matched_revenue_by_user(pool: &SqlitePool, report_id: &str) -> Result<Vec<(String, Decimal)>> {
    let rows = sqlx::query(
        "SELECT user_id, revenue FROM track_statistics \
         WHERE report_id = ? AND is_matched = 1 AND user_id IS NOT NULL",
    )
    .bind(report_id)
    .fetch_all(pool)
    .await?;

    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for row in &rows {
        let user_id: String = row.get("user_id");
        let revenue: String = row.get("revenue");
        *totals.entry(user_id).or_default() += parse_stored(&revenue)?;
    }
    Ok(totals.into_iter().collect())
}

/// Delete country and platform rows of the report's track statistics
pub async fn delete_breakdowns_by_report(conn: &mut SqliteConnection, report_id: &str) -> Result<(u64, u64)> {
    let mut deleted = Vec::with_capacity(2);
    for kind in [Breakdown::Country, Breakdown::Platform] {
        let sql = format!(
            "DELETE FROM {} WHERE track_stat_id IN (SELECT id FROM track_statistics WHERE report_id = ?)",
            kind.table()
        );
        let result = sqlx::query(&sql).bind(report_id).execute(&mut *conn).await?;
        deleted.push(result.rows_affected());
    }
    Ok((deleted[0], deleted[1]))
}

pub async fn delete_track_stats_by_report(conn: &mut SqliteConnection, report_id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM track_statistics WHERE report_id = ?")
        .bind(report_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
