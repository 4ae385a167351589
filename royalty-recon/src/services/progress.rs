//! Report progress tracking
//!
//! Progress is coarse: file ingestion covers 0-50%, catalog matching and
//! persistence 50-90%, payouts run between 90% and the final 100% write.
//! Progress writes are advisory; a failed write is logged and the run goes on.

use crate::db::reports;
use sqlx::SqlitePool;
use tracing::warn;

const INGEST_SHARE: f64 = 50.0;
const MATCH_START: i64 = 50;
const MATCH_SHARE: f64 = 40.0;

/// Percentage after `processed` of `total` files
pub fn ingest_percent(processed: usize, total: usize) -> i64 {
    if total == 0 {
        return MATCH_START;
    }
    (processed as f64 / total as f64 * INGEST_SHARE).round() as i64
}

/// Percentage after `resolved` of `total` tracks
pub fn match_percent(resolved: usize, total: usize) -> i64 {
    if total == 0 {
        return MATCH_START + MATCH_SHARE as i64;
    }
    MATCH_START + (resolved as f64 / total as f64 * MATCH_SHARE).round() as i64
}

/// Writes progress for one report
pub struct ProgressTracker {
    pool: SqlitePool,
    report_id: String,
    total_files: usize,
}

impl ProgressTracker {
    pub fn new(pool: SqlitePool, report_id: impl Into<String>, total_files: usize) -> Self {
        Self {
            pool,
            report_id: report_id.into(),
            total_files,
        }
    }

    /// Record that another file finished ingestion
    pub async fn file_processed(&self, processed_files: usize, total_rows: i64) {
        let progress = ingest_percent(processed_files, self.total_files);
        if let Err(e) =
            reports::update_ingest_progress(&self.pool, &self.report_id, progress, processed_files as i64, total_rows)
                .await
        {
            warn!(report_id = %self.report_id, error = %e, "Failed to record ingestion progress");
        }
    }

    /// Record that another track was resolved and persisted (or failed)
    pub async fn track_resolved(&self, resolved: usize, total_tracks: usize) {
        let progress = match_percent(resolved, total_tracks);
        if let Err(e) = reports::update_progress(&self.pool, &self.report_id, progress).await {
            warn!(report_id = %self.report_id, error = %e, "Failed to record matching progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[test]
    fn test_ingest_percent() {
        assert_eq!(ingest_percent(0, 4), 0);
        assert_eq!(ingest_percent(1, 3), 17);
        assert_eq!(ingest_percent(4, 4), 50);
    }

    #[test]
    fn test_match_percent() {
        assert_eq!(match_percent(0, 10), 50);
        assert_eq!(match_percent(5, 10), 70);
        assert_eq!(match_percent(10, 10), 90);
        assert_eq!(match_percent(0, 0), 90);
    }

    #[tokio::test]
    async fn test_tracker_writes_report_row() {
        let pool = test_pool().await;
        let report = reports::create_report(&pool, "Q1", 2024, 2, None).await.unwrap();

        let tracker = ProgressTracker::new(pool.clone(), report.id.clone(), 2);
        tracker.file_processed(1, 40).await;

        let loaded = reports::load_report(&pool, &report.id).await.unwrap().unwrap();
        assert_eq!(loaded.processing_progress, 25);
        assert_eq!(loaded.processed_files, 1);
        assert_eq!(loaded.total_rows, 40);

        tracker.track_resolved(3, 4).await;
        let loaded = reports::load_report(&pool, &report.id).await.unwrap().unwrap();
        assert_eq!(loaded.processing_progress, 80);
    }
}
