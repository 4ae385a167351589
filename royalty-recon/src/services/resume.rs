//! Payout resume
//!
//! Retries the payout stage of a finished report. Totals are recomputed from
//! the report's persisted matched statistics, and payouts already `credited`
//! are skipped, so resuming twice never credits twice.

use crate::db::{reports, statistics};
use crate::models::ReportStatus;
use crate::services::ledger_writer::{LedgerWriter, PayoutAccumulator, PayoutSummary, ReportContext};
use chrono::Utc;
use royalty_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::info;

/// Resume the payouts of a `completed` or `failed` report
pub async fn resume_report(pool: &SqlitePool, report_id: &str, currency: &str) -> Result<PayoutSummary> {
    let report = reports::load_report(pool, report_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Report {} not found", report_id)))?;

    if report.status == ReportStatus::Processing {
        return Err(Error::Conflict(format!("Report {} is still processing", report_id)));
    }

    let totals: PayoutAccumulator = statistics::matched_revenue_by_user(pool, report_id).await?.into_iter().collect();
    info!(report_id, users = totals.len(), "Resuming payouts");

    let ctx = ReportContext::new(report.id.clone(), report.quarter.clone(), report.year);
    let writer = LedgerWriter::new(pool.clone(), currency);
    let summary = writer.credit_payouts(&ctx, totals).await;

    if !summary.errors.is_empty() {
        let mut lines: Vec<String> = report.error_log.iter().cloned().collect();
        lines.push(format!(
            "Resume at {}: {} payout(s) failed",
            Utc::now().to_rfc3339(),
            summary.failed
        ));
        lines.extend(summary.errors.iter().cloned());
        reports::set_error_log(pool, report_id, Some(&lines.join("\n"))).await?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::payouts::{self, PayoutStatus, PayoutUpdate};
    use crate::db::test_pool;
    use crate::models::{AggregatedTrack, MatchBasis, ReportStats, TrackMatch};
    use royalty_common::db::balances;
    use royalty_common::db::catalog::ReleaseKind;
    use rust_decimal_macros::dec;

    async fn finished_report_with_matches(pool: &SqlitePool) -> String {
        let report = reports::create_report(pool, "Q3", 2024, 1, None).await.unwrap();
        let ctx = ReportContext::new(report.id.clone(), "Q3", 2024);
        let writer = LedgerWriter::new(pool.clone(), "RUB");

        for (isrc, user, revenue) in [("RUAB12400001", "u1", dec!(3)), ("RUAB12400002", "u2", dec!(4))] {
            let mut track = AggregatedTrack {
                isrc: isrc.to_string(),
                track_title: isrc.to_string(),
                artist_name: "Artist".to_string(),
                ..Default::default()
            };
            track.record("RU", "Spotify", 1, revenue);
            let m = TrackMatch {
                release_id: format!("rel-{}", user),
                release_kind: ReleaseKind::Basic,
                user_id: Some(user.to_string()),
                track_index: 0,
                basis: MatchBasis::Isrc,
            };
            writer.persist_track(&ctx, &track, Some(&m)).await.unwrap();
        }

        reports::complete_report(pool, &report.id, &ReportStats::default(), None).await.unwrap();
        report.id
    }

    #[tokio::test]
    async fn test_resume_credits_only_uncredited() {
        let pool = test_pool().await;
        let report_id = finished_report_with_matches(&pool).await;

        // u1 was credited by the original run, u2 failed
        {
            let mut conn = pool.acquire().await.unwrap();
            balances::apply_credit(&mut conn, "u1", dec!(3), Some(&report_id)).await.unwrap();
            for (user, status) in [("u1", PayoutStatus::Credited), ("u2", PayoutStatus::Failed)] {
                payouts::upsert_payout(
                    &mut conn,
                    &PayoutUpdate {
                        report_id: &report_id,
                        user_id: user,
                        quarter: "Q3",
                        year: 2024,
                        amount: if user == "u1" { dec!(3) } else { dec!(4) },
                        status,
                        last_error: None,
                    },
                )
                .await
                .unwrap();
            }
        }

        let summary = resume_report(&pool, &report_id, "RUB").await.unwrap();
        assert_eq!(summary.credited, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);

        assert_eq!(balances::derive_balance(&pool, "u1").await.unwrap(), dec!(3));
        assert_eq!(balances::derive_balance(&pool, "u2").await.unwrap(), dec!(4));

        let again = resume_report(&pool, &report_id, "RUB").await.unwrap();
        assert_eq!(again.credited, 0);
        assert_eq!(again.skipped, 2);
        assert_eq!(balances::derive_balance(&pool, "u2").await.unwrap(), dec!(4));
    }

    #[tokio::test]
    async fn test_resume_refuses_processing_report() {
        let pool = test_pool().await;
        let report = reports::create_report(&pool, "Q1", 2024, 1, None).await.unwrap();

        let err = resume_report(&pool, &report.id, "RUB").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_resume_missing_report() {
        let pool = test_pool().await;
        let err = resume_report(&pool, "missing", "RUB").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
