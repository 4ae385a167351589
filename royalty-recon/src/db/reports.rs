//! Report upload persistence
//!
//! The report row is the status record polled by clients: progress, counters
//! and the newline-joined error log of a run.

use crate::models::{ReportStats, ReportStatus, RoyaltyReport};
use royalty_common::amount::{parse_stored, to_stored};
use royalty_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Error log written when a run was interrupted by a restart
pub const INTERRUPTED_MESSAGE: &str = "Processing interrupted by service restart";

const REPORT_COLUMNS: &str = "id, quarter, year, status, total_files, processed_files, total_rows, \
    matched_tracks, unmatched_tracks, total_streams, total_revenue, processing_progress, \
    error_log, uploaded_by, created_at, completed_at";

fn report_from_row(row: &SqliteRow) -> Result<RoyaltyReport> {
    let status: String = row.get("status");
    let total_revenue: String = row.get("total_revenue");

    Ok(RoyaltyReport {
        id: row.get("id"),
        quarter: row.get("quarter"),
        year: row.get("year"),
        status: ReportStatus::parse(&status)?,
        total_files: row.get("total_files"),
        processed_files: row.get("processed_files"),
        total_rows: row.get("total_rows"),
        matched_tracks: row.get("matched_tracks"),
        unmatched_tracks: row.get("unmatched_tracks"),
        total_streams: row.get("total_streams"),
        total_revenue: parse_stored(&total_revenue)?,
        processing_progress: row.get("processing_progress"),
        error_log: row.get("error_log"),
        uploaded_by: row.get("uploaded_by"),
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
    })
}

/// Create a report in `processing` state
pub async fn create_report(
    pool: &SqlitePool,
    quarter: &str,
    year: i32,
    total_files: i64,
    uploaded_by: Option<&str>,
) -> Result<RoyaltyReport> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO royalty_reports (id, quarter, year, status, total_files, uploaded_by, created_at)
        VALUES (?, ?, ?, 'processing', ?, ?, strftime('%Y-%m-%dT%H:%M:%f', 'now'))
        "#,
    )
    .bind(&id)
    .bind(quarter)
    .bind(year)
    .bind(total_files)
    .bind(uploaded_by)
    .execute(pool)
    .await?;

    tracing::info!(report_id = %id, quarter, year, total_files, "Report created");

    load_report(pool, &id)
        .await?
        .ok_or_else(|| royalty_common::Error::Internal(format!("Report {} vanished after insert", id)))
}

pub async fn load_report(pool: &SqlitePool, id: &str) -> Result<Option<RoyaltyReport>> {
    let sql = format!("SELECT {} FROM royalty_reports WHERE id = ?", REPORT_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(report_from_row).transpose()
}

/// All reports, newest first
pub async fn list_reports(pool: &SqlitePool) -> Result<Vec<RoyaltyReport>> {
    let sql = format!(
        "SELECT {} FROM royalty_reports ORDER BY created_at DESC, rowid DESC",
        REPORT_COLUMNS
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(report_from_row).collect()
}

/// Reset a report to the start of processing
pub async fn mark_processing(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query(
        "UPDATE royalty_reports SET status = 'processing', processing_progress = 0, completed_at = NULL WHERE id = ?",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Progress during file ingestion
pub async fn update_ingest_progress(
    pool: &SqlitePool,
    id: &str,
    progress: i64,
    processed_files: i64,
    total_rows: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE royalty_reports SET processing_progress = ?, processed_files = ?, total_rows = ? WHERE id = ?",
    )
    .bind(progress)
    .bind(processed_files)
    .bind(total_rows)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Progress during matching
pub async fn update_progress(pool: &SqlitePool, id: &str, progress: i64) -> Result<()> {
    sqlx::query("UPDATE royalty_reports SET processing_progress = ? WHERE id = ?")
        .bind(progress)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Final status write of a successful run
pub async fn complete_report(
    pool: &SqlitePool,
    id: &str,
    stats: &ReportStats,
    error_log: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE royalty_reports SET
            status = 'completed',
            processing_progress = 100,
            processed_files = ?,
            total_rows = ?,
            matched_tracks = ?,
            unmatched_tracks = ?,
            total_streams = ?,
            total_revenue = ?,
            error_log = ?,
            completed_at = strftime('%Y-%m-%dT%H:%M:%f', 'now')
        WHERE id = ?
        "#,
    )
    .bind(stats.processed_files)
    .bind(stats.total_rows)
    .bind(stats.matched_tracks)
    .bind(stats.unmatched_tracks)
    .bind(stats.total_streams)
    .bind(to_stored(stats.total_revenue))
    .bind(error_log)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a report failed with the given error log
pub async fn fail_report(pool: &SqlitePool, id: &str, error_log: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE royalty_reports SET
            status = 'failed',
            error_log = ?,
            completed_at = strftime('%Y-%m-%dT%H:%M:%f', 'now')
        WHERE id = ?
        "#,
    )
    .bind(error_log)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Replace the error log without touching anything else
pub async fn set_error_log(pool: &SqlitePool, id: &str, error_log: Option<&str>) -> Result<()> {
    sqlx::query("UPDATE royalty_reports SET error_log = ? WHERE id = ?")
        .bind(error_log)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Fail every report left in `processing` by a previous process
pub async fn fail_stale_reports(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE royalty_reports SET
            status = 'failed',
            error_log = CASE
                WHEN error_log IS NULL OR error_log = '' THEN ?
                ELSE error_log || char(10) || ?
            END,
            completed_at = strftime('%Y-%m-%dT%H:%M:%f', 'now')
        WHERE status = 'processing'
        "#,
    )
    .bind(INTERRUPTED_MESSAGE)
    .bind(INTERRUPTED_MESSAGE)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Status only, inside a caller's transaction
pub async fn status_of(conn: &mut SqliteConnection, id: &str) -> Result<Option<ReportStatus>> {
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM royalty_reports WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    status.as_deref().map(ReportStatus::parse).transpose()
}

pub async fn delete_report(conn: &mut SqliteConnection, id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM royalty_reports WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
