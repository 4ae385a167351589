//! Aggregated sales data for one track

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Streams and revenue for one slice (country, platform or whole track)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub streams: i64,
    pub revenue: Decimal,
}

impl Tally {
    pub fn add(&mut self, streams: i64, revenue: Decimal) {
        self.streams = self.streams.saturating_add(streams);
        self.revenue = self.revenue.saturating_add(revenue);
    }
}

/// All sales rows of one track across every file of a report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedTrack {
    pub isrc: String,
    pub upc: String,
    pub track_title: String,
    pub release_title: String,
    pub artist_name: String,
    pub streams: i64,
    pub revenue: Decimal,
    pub countries: BTreeMap<String, Tally>,
    pub platforms: BTreeMap<String, Tally>,
}

impl AggregatedTrack {
    /// Identity key: the ISRC, or `UPC:title:artist` when the ISRC is empty
    pub fn identity_key(isrc: &str, upc: &str, track_title: &str, artist_name: &str) -> String {
        if isrc.is_empty() {
            format!("{}:{}:{}", upc, track_title, artist_name)
        } else {
            isrc.to_string()
        }
    }

    pub fn key(&self) -> String {
        Self::identity_key(&self.isrc, &self.upc, &self.track_title, &self.artist_name)
    }

    /// Fold one sales row into the totals and both breakdowns
    ///
    /// Sums saturate instead of overflowing on absurd quantities.
    pub fn record(&mut self, country: &str, platform: &str, streams: i64, revenue: Decimal) {
        self.streams = self.streams.saturating_add(streams);
        self.revenue = self.revenue.saturating_add(revenue);
        self.countries.entry(country.to_string()).or_default().add(streams, revenue);
        self.platforms.entry(platform.to_string()).or_default().add(streams, revenue);
    }
}
