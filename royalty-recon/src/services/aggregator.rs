//! Sales row aggregation
//!
//! Folds the rows of every report file into one `AggregatedTrack` per track
//! identity, preserving the order in which tracks were first seen.

use crate::models::AggregatedTrack;
use crate::services::row_parser::{columns, ReportRow};
use royalty_common::amount;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Placeholder for a blank country or platform
pub const UNKNOWN: &str = "Unknown";

/// Report-wide running totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateTotals {
    pub rows: i64,
    pub streams: i64,
    pub revenue: Decimal,
}

/// Accumulates rows across all files of one report
#[derive(Debug, Default)]
pub struct Aggregator {
    tracks: Vec<AggregatedTrack>,
    index: HashMap<String, usize>,
    totals: AggregateTotals,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one row. Unparseable quantities and revenues count as zero.
    pub fn add_row(&mut self, row: &ReportRow) {
        let isrc = row.field(columns::ISRC);
        let upc = row.field(columns::UPC);
        let track_title = row.field(columns::TRACK_TITLE);
        let artist_name = row.field(columns::ARTIST);
        let country = non_blank_or_unknown(row.field(columns::COUNTRY));
        let platform = non_blank_or_unknown(row.field(columns::PLATFORM));
        let streams = parse_streams(row.field(columns::QUANTITY));
        let revenue = parse_revenue(row.field(columns::NET_REVENUE));

        let key = AggregatedTrack::identity_key(isrc, upc, track_title, artist_name);
        let slot = match self.index.get(&key) {
            Some(slot) => *slot,
            None => {
                self.tracks.push(AggregatedTrack {
                    isrc: isrc.to_string(),
                    upc: upc.to_string(),
                    track_title: track_title.to_string(),
                    release_title: row.field(columns::RELEASE_TITLE).to_string(),
                    artist_name: artist_name.to_string(),
                    ..Default::default()
                });
                self.index.insert(key, self.tracks.len() - 1);
                self.tracks.len() - 1
            }
        };

        self.tracks[slot].record(country, platform, streams, revenue);

        self.totals.rows += 1;
        self.totals.streams = self.totals.streams.saturating_add(streams);
        self.totals.revenue = self.totals.revenue.saturating_add(revenue);
    }

    pub fn add_rows<'a>(&mut self, rows: impl IntoIterator<Item = &'a ReportRow>) {
        for row in rows {
            self.add_row(row);
        }
    }

    pub fn totals(&self) -> AggregateTotals {
        self.totals
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Tracks in first-seen order
    pub fn into_tracks(self) -> Vec<AggregatedTrack> {
        self.tracks
    }
}

fn non_blank_or_unknown(value: &str) -> &str {
    if value.is_empty() {
        UNKNOWN
    } else {
        value
    }
}

/// Integer, else the integer part of a decimal, else 0
pub fn parse_streams(raw: &str) -> i64 {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return value;
    }
    amount::parse_lenient(trimmed)
        .and_then(|d| d.trunc().to_i64())
        .unwrap_or(0)
}

/// Decimal revenue, else 0
pub fn parse_revenue(raw: &str) -> Decimal {
    amount::parse_lenient(raw).unwrap_or(Decimal::ZERO)
}
