//! Report upload lifecycle
//!
//! A report moves PROCESSING → COMPLETED or PROCESSING → FAILED. Terminal
//! reports are only touched again by reversal (delete) and resume (error log).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Report processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Processing,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Processing => "processing",
            ReportStatus::Completed => "completed",
            ReportStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> royalty_common::Result<Self> {
        match value {
            "processing" => Ok(ReportStatus::Processing),
            "completed" => Ok(ReportStatus::Completed),
            "failed" => Ok(ReportStatus::Failed),
            other => Err(royalty_common::Error::InvalidInput(format!(
                "Unknown report status: {}",
                other
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReportStatus::Processing)
    }
}

/// Persisted report upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoyaltyReport {
    pub id: String,
    /// Quarter label, e.g. "Q1"
    pub quarter: String,
    pub year: i32,
    pub status: ReportStatus,
    pub total_files: i64,
    pub processed_files: i64,
    pub total_rows: i64,
    pub matched_tracks: i64,
    pub unmatched_tracks: i64,
    pub total_streams: i64,
    pub total_revenue: Decimal,
    /// 0 - 100
    pub processing_progress: i64,
    pub error_log: Option<String>,
    pub uploaded_by: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl RoyaltyReport {
    /// Human-readable period, e.g. "Q1 2024"
    pub fn period(&self) -> String {
        format!("{} {}", self.quarter, self.year)
    }
}

/// Counters written with the final status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub processed_files: i64,
    pub total_rows: i64,
    pub matched_tracks: i64,
    pub unmatched_tracks: i64,
    pub total_streams: i64,
    pub total_revenue: Decimal,
}

/// One uploaded report file, already decoded
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub name: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_and_terminality() {
        for status in [ReportStatus::Processing, ReportStatus::Completed, ReportStatus::Failed] {
            assert_eq!(ReportStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(!ReportStatus::Processing.is_terminal());
        assert!(ReportStatus::Completed.is_terminal());
        assert!(ReportStatus::Failed.is_terminal());
        assert!(ReportStatus::parse("queued").is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ReportStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}
