//! Report details and user royalty statistics
//!
//! Read-side aggregation over persisted statistics. Nothing here writes.

use crate::db::payouts::{self, PayoutStatus};
use crate::db::statistics::{self, Breakdown, BreakdownRow, TrackStatistic};
use royalty_common::db::catalog;
use royalty_common::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::warn;

const DETAIL_TRACK_LIMIT: usize = 50;
const DETAIL_COUNTRY_LIMIT: usize = 10;
const DETAIL_PAYOUT_LIMIT: usize = 10;
const USER_TRACK_LIMIT: usize = 20;
const USER_COUNTRY_LIMIT: usize = 10;

/// Streams and revenue under one name (country, platform or period)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedTotal {
    pub name: String,
    pub streams: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseTrack {
    pub track_title: String,
    pub isrc: Option<String>,
    pub streams: i64,
    pub revenue: Decimal,
}

/// Tracks of one report grouped under their release
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseSummary {
    pub release_id: Option<String>,
    pub release_type: Option<String>,
    pub release_title: String,
    pub artist_name: String,
    pub cover_url: Option<String>,
    pub is_matched: bool,
    pub total_streams: i64,
    pub total_revenue: Decimal,
    pub tracks: Vec<ReleaseTrack>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutLine {
    pub user_id: String,
    pub amount: Decimal,
    pub status: PayoutStatus,
}

/// Detail payload of a completed report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDetails {
    pub releases: Vec<ReleaseSummary>,
    pub platforms: Vec<NamedTotal>,
    pub countries: Vec<NamedTotal>,
    pub payouts: Vec<PayoutLine>,
}

/// Build the detail payload of a report
pub async fn report_details(pool: &SqlitePool, report_id: &str) -> Result<ReportDetails> {
    let mut tracks = statistics::track_stats_for_report(pool, report_id).await?;
    sort_by_revenue(&mut tracks);
    tracks.truncate(DETAIL_TRACK_LIMIT);

    let mut releases = group_by_release(&tracks);
    enrich_from_catalog(pool, &mut releases).await;
    releases.sort_by(|a, b| b.total_revenue.cmp(&a.total_revenue));

    let mut platforms = sum_by_name(statistics::breakdown_rows_for_report(pool, Breakdown::Platform, report_id).await?);
    platforms.sort_by(|a, b| b.streams.cmp(&a.streams).then_with(|| a.name.cmp(&b.name)));

    let mut countries = sum_by_name(statistics::breakdown_rows_for_report(pool, Breakdown::Country, report_id).await?);
    countries.sort_by(|a, b| b.streams.cmp(&a.streams).then_with(|| a.name.cmp(&b.name)));
    countries.truncate(DETAIL_COUNTRY_LIMIT);

    let payouts = payouts::list_by_report(pool, report_id)
        .await?
        .into_iter()
        .take(DETAIL_PAYOUT_LIMIT)
        .map(|p| PayoutLine {
            user_id: p.user_id,
            amount: p.amount,
            status: p.status,
        })
        .collect();

    Ok(ReportDetails {
        releases,
        platforms,
        countries,
        payouts,
    })
}

fn sort_by_revenue(tracks: &mut [TrackStatistic]) {
    tracks.sort_by(|a, b| b.revenue.cmp(&a.revenue));
}

/// Matched tracks group by release id, unmatched ones by release title and artist
fn group_by_release(tracks: &[TrackStatistic]) -> Vec<ReleaseSummary> {
    let mut releases: Vec<ReleaseSummary> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for stat in tracks {
        let key = match &stat.release_id {
            Some(id) => id.clone(),
            None => format!("unmatched-{}-{}", stat.release_title, stat.artist_name),
        };

        let slot = *index.entry(key).or_insert_with(|| {
            let release_title = if stat.release_title.is_empty() {
                stat.track_title.clone()
            } else {
                stat.release_title.clone()
            };
            releases.push(ReleaseSummary {
                release_id: stat.release_id.clone(),
                release_type: stat.release_type.clone(),
                release_title,
                artist_name: stat.artist_name.clone(),
                cover_url: None,
                is_matched: stat.is_matched,
                total_streams: 0,
                total_revenue: Decimal::ZERO,
                tracks: Vec::new(),
            });
            releases.len() - 1
        });

        let release = &mut releases[slot];
        release.total_streams += stat.streams;
        release.total_revenue += stat.revenue;
        release.tracks.push(ReleaseTrack {
            track_title: stat.track_title.clone(),
            isrc: stat.isrc.clone(),
            streams: stat.streams,
            revenue: stat.revenue,
        });
    }

    releases
}

/// Catalog title, artist and cover take precedence over the sales file text
async fn enrich_from_catalog(pool: &SqlitePool, releases: &mut [ReleaseSummary]) {
    let ids: Vec<String> = releases.iter().filter_map(|r| r.release_id.clone()).collect();
    let catalog_releases = match catalog::releases_by_ids(pool, &ids).await {
        Ok(found) => found,
        Err(e) => {
            warn!(error = %e, "Could not load catalog releases for report details");
            return;
        }
    };

    for release in releases.iter_mut() {
        let Some(found) = catalog_releases
            .iter()
            .find(|c| release.release_id.as_deref() == Some(c.id.as_str()))
        else {
            continue;
        };
        release.cover_url = found.cover_url.clone();
        if !found.title.is_empty() {
            release.release_title = found.title.clone();
        }
        if !found.artist_name.is_empty() {
            release.artist_name = found.artist_name.clone();
        }
    }
}

fn sum_by_name(rows: Vec<BreakdownRow>) -> Vec<NamedTotal> {
    let mut totals: Vec<NamedTotal> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        match index.get(&row.name) {
            Some(&slot) => {
                totals[slot].streams += row.streams;
                totals[slot].revenue += row.revenue;
            }
            None => {
                index.insert(row.name.clone(), totals.len());
                totals.push(NamedTotal {
                    name: row.name,
                    streams: row.streams,
                    revenue: row.revenue,
                });
            }
        }
    }

    totals
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserTotals {
    pub total_streams: i64,
    pub total_revenue: Decimal,
    pub total_tracks: usize,
    pub matched_tracks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserTrack {
    pub isrc: Option<String>,
    pub track_title: String,
    pub release_title: String,
    pub artist_name: String,
    pub quarter: String,
    pub year: i32,
    pub streams: i64,
    pub revenue: Decimal,
}

/// Artist portal statistics for one user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRoyaltyStats {
    pub totals: UserTotals,
    pub tracks: Vec<UserTrack>,
    pub countries: Vec<NamedTotal>,
    pub platforms: Vec<NamedTotal>,
    pub periods: Vec<NamedTotal>,
}

/// Statistics over every matched track a user owns, across all reports
pub async fn user_royalty_stats(pool: &SqlitePool, user_id: &str) -> Result<UserRoyaltyStats> {
    let mut tracks = statistics::track_stats_for_user(pool, user_id).await?;
    sort_by_revenue(&mut tracks);

    let totals = UserTotals {
        total_streams: tracks.iter().map(|t| t.streams).sum(),
        total_revenue: tracks.iter().map(|t| t.revenue).sum(),
        total_tracks: tracks.len(),
        matched_tracks: tracks.iter().filter(|t| t.is_matched).count(),
    };

    let mut countries = sum_by_name(statistics::breakdown_rows_for_user(pool, Breakdown::Country, user_id).await?);
    countries.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));
    countries.truncate(USER_COUNTRY_LIMIT);

    let mut platforms = sum_by_name(statistics::breakdown_rows_for_user(pool, Breakdown::Platform, user_id).await?);
    platforms.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));

    let periods = period_totals(&tracks);

    let tracks = tracks
        .into_iter()
        .take(USER_TRACK_LIMIT)
        .map(|t| UserTrack {
            isrc: t.isrc,
            track_title: t.track_title,
            release_title: t.release_title,
            artist_name: t.artist_name,
            quarter: t.quarter,
            year: t.year,
            streams: t.streams,
            revenue: t.revenue,
        })
        .collect();

    Ok(UserRoyaltyStats {
        totals,
        tracks,
        countries,
        platforms,
        periods,
    })
}

/// `Qn YYYY` totals, newest period first
fn period_totals(tracks: &[TrackStatistic]) -> Vec<NamedTotal> {
    let mut keyed: HashMap<(i32, String), NamedTotal> = HashMap::new();
    for t in tracks {
        let entry = keyed
            .entry((t.year, t.quarter.clone()))
            .or_insert_with(|| NamedTotal {
                name: format!("{} {}", t.quarter, t.year),
                streams: 0,
                revenue: Decimal::ZERO,
            });
        entry.streams += t.streams;
        entry.revenue += t.revenue;
    }

    let mut periods: Vec<((i32, String), NamedTotal)> = keyed.into_iter().collect();
    periods.sort_by(|a, b| b.0.cmp(&a.0));
    periods.into_iter().map(|(_, total)| total).collect()
}
