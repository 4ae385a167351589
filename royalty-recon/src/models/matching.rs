//! Catalog match results

use royalty_common::db::catalog::ReleaseKind;
use serde::{Deserialize, Serialize};

/// Which resolver tier produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBasis {
    Isrc,
    IsrcPrefix,
    Upc,
    UpcPrefix,
    Title,
    ReleaseTitle,
}

impl MatchBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchBasis::Isrc => "isrc",
            MatchBasis::IsrcPrefix => "isrc_prefix",
            MatchBasis::Upc => "upc",
            MatchBasis::UpcPrefix => "upc_prefix",
            MatchBasis::Title => "title",
            MatchBasis::ReleaseTitle => "release_title",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "isrc" => Some(MatchBasis::Isrc),
            "isrc_prefix" => Some(MatchBasis::IsrcPrefix),
            "upc" => Some(MatchBasis::Upc),
            "upc_prefix" => Some(MatchBasis::UpcPrefix),
            "title" => Some(MatchBasis::Title),
            "release_title" => Some(MatchBasis::ReleaseTitle),
            _ => None,
        }
    }
}

/// A sales track resolved to one track of one catalog release
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackMatch {
    pub release_id: String,
    pub release_kind: ReleaseKind,
    /// Owner of the release; unowned releases are matched but never paid
    pub user_id: Option<String>,
    pub track_index: usize,
    pub basis: MatchBasis,
}
