//! Data models for royalty-recon

pub mod matching;
pub mod report;
pub mod track;

pub use matching::{MatchBasis, TrackMatch};
pub use report::{ReportFile, ReportStats, ReportStatus, RoyaltyReport};
pub use track::{AggregatedTrack, Tally};
