//! Ledger writer
//!
//! Persists the statistics of each resolved track and credits each owner's
//! share of the report to their balance.
//!
//! **Idempotency:** track rows upsert on `(isrc, quarter, year)`, breakdown
//! rows insert once, and a payout already marked `credited` is never credited
//! again. Re-running a report against the same id therefore changes nothing
//! that was already written.
//!
//! **Balance writes:** the read-modify-write of a balance, its ledger entry
//! and the payout status share one SQL transaction, retried while SQLite
//! reports lock contention. The audit transaction is written afterwards and
//! its failure does not undo the credit.

use crate::db::payouts::{self, PayoutStatus, PayoutUpdate};
use crate::db::settings;
use crate::db::statistics::{self, Breakdown};
use crate::models::{AggregatedTrack, TrackMatch};
use crate::utils::retry_on_lock;
use chrono::Utc;
use royalty_common::db::balances::{self, BalanceChange};
use royalty_common::db::transactions::{self, NewTransaction};
use royalty_common::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Report identity carried into every write
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub report_id: String,
    pub quarter: String,
    pub year: i32,
}

impl ReportContext {
    pub fn new(report_id: impl Into<String>, quarter: impl Into<String>, year: i32) -> Self {
        Self {
            report_id: report_id.into(),
            quarter: quarter.into(),
            year,
        }
    }

    /// Description shown to the user in their transaction history
    pub fn payout_description(&self) -> String {
        format!("Роялти за {} {} (отчёт дистрибьютора)", self.quarter, self.year)
    }
}

/// Per-user payout totals, ordered by user id
#[derive(Debug, Clone, Default)]
pub struct PayoutAccumulator {
    totals: BTreeMap<String, Decimal>,
}

impl PayoutAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, user_id: &str, amount: Decimal) {
        let total = self.totals.entry(user_id.to_string()).or_default();
        *total = total.saturating_add(amount);
    }

    pub fn get(&self, user_id: &str) -> Option<Decimal> {
        self.totals.get(user_id).copied()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn into_vec(self) -> Vec<(String, Decimal)> {
        self.totals.into_iter().collect()
    }
}

impl FromIterator<(String, Decimal)> for PayoutAccumulator {
    fn from_iter<I: IntoIterator<Item = (String, Decimal)>>(iter: I) -> Self {
        let mut accumulator = Self::new();
        for (user_id, amount) in iter {
            accumulator.add(&user_id, amount);
        }
        accumulator
    }
}

/// Outcome of one payout credit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutOutcome {
    Credited(BalanceChange),
    AlreadyCredited,
    Failed(String),
}

/// Totals of a payout stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PayoutSummary {
    pub credited: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Human-readable error lines for the report error log
    pub errors: Vec<String>,
}

/// Writes statistics and payouts for one service instance
#[derive(Clone)]
pub struct LedgerWriter {
    pool: SqlitePool,
    currency: String,
}

impl LedgerWriter {
    pub fn new(pool: SqlitePool, currency: impl Into<String>) -> Self {
        Self {
            pool,
            currency: currency.into(),
        }
    }

    /// Persist one track with its country and platform breakdowns
    ///
    /// All rows of the track are written in one transaction; returns the id of
    /// the track statistic row.
    pub async fn persist_track(
        &self,
        ctx: &ReportContext,
        track: &AggregatedTrack,
        matched: Option<&TrackMatch>,
    ) -> Result<String> {
        let mut tx = self.pool.begin().await?;

        let track_stat_id =
            statistics::upsert_track_statistic(&mut tx, &ctx.report_id, &ctx.quarter, ctx.year, track, matched)
                .await?;

        for (country, tally) in &track.countries {
            statistics::insert_breakdown(&mut tx, Breakdown::Country, &track_stat_id, &ctx.report_id, country, tally)
                .await?;
        }
        for (platform, tally) in &track.platforms {
            statistics::insert_breakdown(&mut tx, Breakdown::Platform, &track_stat_id, &ctx.report_id, platform, tally)
                .await?;
        }

        tx.commit().await?;
        Ok(track_stat_id)
    }

    /// Credit every non-zero payout, continuing past individual failures
    pub async fn credit_payouts(&self, ctx: &ReportContext, totals: PayoutAccumulator) -> PayoutSummary {
        let max_wait_ms = self.max_lock_wait_ms().await;
        let mut summary = PayoutSummary::default();

        for (user_id, amount) in totals.into_vec() {
            if amount.is_zero() {
                continue;
            }

            match self.credit_payout(ctx, &user_id, amount, max_wait_ms).await {
                PayoutOutcome::Credited(change) => {
                    summary.credited += 1;
                    if let Err(e) = self.record_audit_transaction(ctx, &user_id, amount, change).await {
                        warn!(report_id = %ctx.report_id, user_id = %user_id, error = %e, "Audit transaction not written");
                        summary
                            .errors
                            .push(format!("Error recording transaction for user {}: {}", user_id, e));
                    }
                }
                PayoutOutcome::AlreadyCredited => summary.skipped += 1,
                PayoutOutcome::Failed(message) => {
                    summary.failed += 1;
                    summary.errors.push(message);
                }
            }
        }

        info!(
            report_id = %ctx.report_id,
            credited = summary.credited,
            skipped = summary.skipped,
            failed = summary.failed,
            "Payout stage finished"
        );
        summary
    }

    /// Credit one user's payout for the report
    ///
    /// The audit transaction is not written here; see `credit_payouts`.
    pub async fn credit_payout(
        &self,
        ctx: &ReportContext,
        user_id: &str,
        amount: Decimal,
        max_wait_ms: u64,
    ) -> PayoutOutcome {
        let result = retry_on_lock("payout credit", max_wait_ms, || {
            credit_in_transaction(&self.pool, ctx, user_id, amount)
        })
        .await;

        match result {
            Ok(Some(change)) => {
                info!(
                    report_id = %ctx.report_id,
                    user_id,
                    amount = %amount,
                    balance_after = %change.after,
                    "Payout credited"
                );
                PayoutOutcome::Credited(change)
            }
            Ok(None) => {
                debug!(report_id = %ctx.report_id, user_id, "Payout already credited, skipping");
                PayoutOutcome::AlreadyCredited
            }
            Err(e) => {
                error!(report_id = %ctx.report_id, user_id, error = %e, "Payout credit failed");
                self.mark_failed(ctx, user_id, amount, &e.to_string()).await;
                PayoutOutcome::Failed(format!("Error creating payout for user {}: {}", user_id, e))
            }
        }
    }

    async fn max_lock_wait_ms(&self) -> u64 {
        match settings::get_balance_max_lock_wait_ms(&self.pool).await {
            Ok(ms) => ms,
            Err(e) => {
                warn!(error = %e, "Unreadable balance lock wait setting, using default");
                settings::DEFAULT_BALANCE_MAX_LOCK_WAIT_MS
            }
        }
    }

    /// Best effort: leave a failed payout row behind for resume
    async fn mark_failed(&self, ctx: &ReportContext, user_id: &str, amount: Decimal, message: &str) {
        let update = PayoutUpdate {
            report_id: &ctx.report_id,
            user_id,
            quarter: &ctx.quarter,
            year: ctx.year,
            amount,
            status: PayoutStatus::Failed,
            last_error: Some(message),
        };

        let result = async {
            let mut conn = self.pool.acquire().await?;
            payouts::upsert_payout(&mut conn, &update).await
        }
        .await;

        if let Err(e) = result {
            warn!(report_id = %ctx.report_id, user_id, error = %e, "Could not mark payout as failed");
        }
    }

    async fn record_audit_transaction(
        &self,
        ctx: &ReportContext,
        user_id: &str,
        amount: Decimal,
        change: BalanceChange,
    ) -> Result<String> {
        let record = NewTransaction {
            user_id: user_id.to_string(),
            kind: "payout".to_string(),
            amount,
            currency: self.currency.clone(),
            balance_before: change.before,
            balance_after: change.after,
            status: "completed".to_string(),
            description: ctx.payout_description(),
            payment_method: Some("royalty".to_string()),
            reference_id: Some(ctx.report_id.clone()),
            metadata: json!({
                "report_id": ctx.report_id,
                "quarter": ctx.quarter,
                "year": ctx.year,
                "source": "royalty_report",
                "processed_at": Utc::now().to_rfc3339(),
            }),
        };
        transactions::insert_transaction(&self.pool, &record).await
    }
}

/// One credit attempt: status check, balance credit and payout row commit together
///
/// Returns `None` when the payout was already credited.
async fn credit_in_transaction(
    pool: &SqlitePool,
    ctx: &ReportContext,
    user_id: &str,
    amount: Decimal,
) -> Result<Option<BalanceChange>> {
    let mut tx = pool.begin().await?;

    if payouts::payout_status(&mut tx, &ctx.report_id, user_id).await? == Some(PayoutStatus::Credited) {
        tx.rollback().await?;
        return Ok(None);
    }

    let change = balances::apply_credit(&mut tx, user_id, amount, Some(&ctx.report_id)).await?;
    payouts::upsert_payout(
        &mut tx,
        &PayoutUpdate {
            report_id: &ctx.report_id,
            user_id,
            quarter: &ctx.quarter,
            year: ctx.year,
            amount,
            status: PayoutStatus::Credited,
            last_error: None,
        },
    )
    .await?;

    tx.commit().await?;
    Ok(Some(change))
}
