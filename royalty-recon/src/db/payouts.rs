//! Royalty payout persistence
//!
//! One row per (report, user). The status column records whether the user's
//! balance was already credited, which makes re-runs and resume idempotent.

use royalty_common::amount::{parse_stored, to_stored};
use royalty_common::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Payout credit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Credited,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Credited => "credited",
            PayoutStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(PayoutStatus::Pending),
            "credited" => Ok(PayoutStatus::Credited),
            "failed" => Ok(PayoutStatus::Failed),
            other => Err(Error::InvalidInput(format!("Unknown payout status: {}", other))),
        }
    }
}

/// Persisted payout
#[derive(Debug, Clone, Serialize)]
pub struct RoyaltyPayout {
    pub id: String,
    pub report_id: String,
    pub user_id: String,
    pub quarter: String,
    pub year: i32,
    pub amount: Decimal,
    pub status: PayoutStatus,
    pub last_error: Option<String>,
    pub created_at: String,
    pub credited_at: Option<String>,
}

fn payout_from_row(row: &SqliteRow) -> Result<RoyaltyPayout> {
    let amount: String = row.get("amount");
    let status: String = row.get("status");
    Ok(RoyaltyPayout {
        id: row.get("id"),
        report_id: row.get("report_id"),
        user_id: row.get("user_id"),
        quarter: row.get("quarter"),
        year: row.get("year"),
        amount: parse_stored(&amount)?,
        status: PayoutStatus::parse(&status)?,
        last_error: row.get("last_error"),
        created_at: row.get("created_at"),
        credited_at: row.get("credited_at"),
    })
}

const PAYOUT_COLUMNS: &str =
    "id, report_id, user_id, quarter, year, amount, status, last_error, created_at, credited_at";

/// Status of the (report, user) payout, if one exists
pub async fn payout_status(conn: &mut SqliteConnection, report_id: &str, user_id: &str) -> Result<Option<PayoutStatus>> {
    let status: Option<String> =
        sqlx::query_scalar("SELECT status FROM royalty_payouts WHERE report_id = ? AND user_id = ?")
            .bind(report_id)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
    status.as_deref().map(PayoutStatus::parse).transpose()
}

/// Payout fields written by `upsert_payout`
#[derive(Debug, Clone)]
pub struct PayoutUpdate<'a> {
    pub report_id: &'a str,
    pub user_id: &'a str,
    pub quarter: &'a str,
    pub year: i32,
    pub amount: Decimal,
    pub status: PayoutStatus,
    pub last_error: Option<&'a str>,
}

/// Insert or update the (report, user) payout
pub async fn upsert_payout(conn: &mut SqliteConnection, update: &PayoutUpdate<'_>) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO royalty_payouts (id, report_id, user_id, quarter, year, amount, status, last_error, credited_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?,
                CASE WHEN ? = 'credited' THEN strftime('%Y-%m-%dT%H:%M:%f', 'now') END)
        ON CONFLICT (report_id, user_id) DO UPDATE SET
            amount = excluded.amount,
            status = excluded.status,
            last_error = excluded.last_error,
            credited_at = excluded.credited_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(update.report_id)
    .bind(update.user_id)
    .bind(update.quarter)
    .bind(update.year)
    .bind(to_stored(update.amount))
    .bind(update.status.as_str())
    .bind(update.last_error)
    .bind(update.status.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Payouts of a report, largest amount first
pub async fn list_by_report(pool: &SqlitePool, report_id: &str) -> Result<Vec<RoyaltyPayout>> {
    let sql = format!("SELECT {} FROM royalty_payouts WHERE report_id = ?", PAYOUT_COLUMNS);
    let rows = sqlx::query(&sql).bind(report_id).fetch_all(pool).await?;
    let mut payouts = rows.iter().map(payout_from_row).collect::<Result<Vec<_>>>()?;
    payouts.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.user_id.cmp(&b.user_id)));
    Ok(payouts)
}

/// Credited (user, amount) pairs of a report, inside a caller's transaction
pub async fn credited_by_report(conn: &mut SqliteConnection, report_id: &str) -> Result<Vec<(String, Decimal)>> {
    let rows = sqlx::query(
        "SELECT user_id, amount FROM royalty_payouts WHERE report_id = ? AND status = 'credited' ORDER BY user_id",
    )
    .bind(report_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            let amount: String = row.get("amount");
            Ok((row.get("user_id"), parse_stored(&amount)?))
        })
        .collect()
}

pub async fn delete_by_report(conn: &mut SqliteConnection, report_id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM royalty_payouts WHERE report_id = ?")
        .bind(report_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
