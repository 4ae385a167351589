//! Report reversal
//!
//! Undoes every persisted effect of one report, driven only by its id. All
//! deletes and balance debits share one SQL transaction: either the report is
//! gone together with its statistics, payouts and audit rows, or nothing
//! changed.

use crate::db::{payouts, reports, statistics};
use crate::models::ReportStatus;
use royalty_common::db::{balances, transactions};
use royalty_common::{Error, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Counts of what a reversal removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReversalSummary {
    pub report_id: String,
    pub track_stats: u64,
    pub country_stats: u64,
    pub platform_stats: u64,
    pub payouts: u64,
    pub transactions: u64,
    /// Sum of credited payouts that were reverted
    pub reverted_revenue: Decimal,
    /// Sum actually debited; lower than `reverted_revenue` when balances were clamped
    pub debited: Decimal,
    pub debited_users: usize,
}

/// Reverse a report
///
/// A `processing` report is refused with `Conflict` unless `force` is set,
/// since its background task may still be writing.
pub async fn reverse_report(pool: &SqlitePool, report_id: &str, force: bool) -> Result<ReversalSummary> {
    let mut tx = pool.begin().await?;

    let status = reports::status_of(&mut tx, report_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Report {} not found", report_id)))?;

    if status == ReportStatus::Processing {
        if !force {
            return Err(Error::Conflict(format!(
                "Report {} is still processing; pass force=true to reverse it anyway",
                report_id
            )));
        }
        warn!(report_id, "Forcing reversal of a report that is still processing");
    }

    let mut summary = ReversalSummary {
        report_id: report_id.to_string(),
        ..Default::default()
    };

    let (country_stats, platform_stats) = statistics::delete_breakdowns_by_report(&mut tx, report_id).await?;
    summary.country_stats = country_stats;
    summary.platform_stats = platform_stats;
    summary.track_stats = statistics::delete_track_stats_by_report(&mut tx, report_id).await?;

    for (user_id, amount) in payouts::credited_by_report(&mut tx, report_id).await? {
        let change = balances::apply_debit_clamped(&mut tx, &user_id, amount, Some(report_id)).await?;
        if change.applied < amount {
            warn!(
                report_id,
                user_id = %user_id,
                payout = %amount,
                debited = %change.applied,
                "Balance clamped at zero during reversal"
            );
        }
        summary.reverted_revenue += amount;
        summary.debited += change.applied;
        summary.debited_users += 1;
    }

    summary.payouts = payouts::delete_by_report(&mut tx, report_id).await?;
    summary.transactions = transactions::delete_by_report(&mut tx, report_id).await?;
    reports::delete_report(&mut tx, report_id).await?;

    tx.commit().await?;

    info!(
        report_id,
        track_stats = summary.track_stats,
        payouts = summary.payouts,
        transactions = summary.transactions,
        reverted_revenue = %summary.reverted_revenue,
        "Report reversed"
    );
    Ok(summary)
}
