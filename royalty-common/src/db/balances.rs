//! User balances
//!
//! `user_balances` holds the current balance per user and is the only place a
//! balance is written. Every change also appends a row to `balance_entries`,
//! so the cached value can always be re-derived from the ledger. The legacy
//! `profile_balances` view reads from the cache and is never written.
//!
//! Mutating functions take a `SqliteConnection` so callers can run them inside
//! their own transaction together with related writes.

use crate::amount::{parse_stored, to_stored};
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Direction of a balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Credit,
    Debit,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Credit => "credit",
            EntryKind::Debit => "debit",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "credit" => Ok(EntryKind::Credit),
            "debit" => Ok(EntryKind::Debit),
            other => Err(Error::InvalidInput(format!("Unknown balance entry kind: {}", other))),
        }
    }
}

/// One row of the append-only balance ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub id: String,
    pub user_id: String,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub report_id: Option<String>,
    pub created_at: String,
}

/// Balance before and after a single change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub before: Decimal,
    pub after: Decimal,
    /// Amount actually applied (a clamped debit may apply less than requested)
    pub applied: Decimal,
}

/// Current balance, creating a zero balance row when the user has none
pub async fn current_balance_or_create(conn: &mut SqliteConnection, user_id: &str) -> Result<Decimal> {
    sqlx::query("INSERT INTO user_balances (user_id, balance) VALUES (?, '0') ON CONFLICT(user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let balance: String = sqlx::query_scalar("SELECT balance FROM user_balances WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    parse_stored(&balance)
}

/// Overwrite the cached balance
pub async fn store_balance(conn: &mut SqliteConnection, user_id: &str, balance: Decimal) -> Result<()> {
    sqlx::query("UPDATE user_balances SET balance = ?, updated_at = CURRENT_TIMESTAMP WHERE user_id = ?")
        .bind(to_stored(balance))
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Append a ledger row, returning its id
pub async fn append_entry(
    conn: &mut SqliteConnection,
    user_id: &str,
    kind: EntryKind,
    amount: Decimal,
    balance_after: Decimal,
    report_id: Option<&str>,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO balance_entries (id, user_id, kind, amount, balance_after, report_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(kind.as_str())
    .bind(to_stored(amount))
    .bind(to_stored(balance_after))
    .bind(report_id)
    .execute(&mut *conn)
    .await?;
    Ok(id)
}

/// Add `amount` to the user's balance and record the credit
pub async fn apply_credit(
    conn: &mut SqliteConnection,
    user_id: &str,
    amount: Decimal,
    report_id: Option<&str>,
) -> Result<BalanceChange> {
    let before = current_balance_or_create(conn, user_id).await?;
    let after = before + amount;
    append_entry(conn, user_id, EntryKind::Credit, amount, after, report_id).await?;
    store_balance(conn, user_id, after).await?;
    Ok(BalanceChange {
        before,
        after,
        applied: amount,
    })
}

/// Subtract up to `amount`, never taking the balance below zero
///
/// The ledger row records the amount actually removed.
pub async fn apply_debit_clamped(
    conn: &mut SqliteConnection,
    user_id: &str,
    amount: Decimal,
    report_id: Option<&str>,
) -> Result<BalanceChange> {
    let before = current_balance_or_create(conn, user_id).await?;
    let after = (before - amount).max(Decimal::ZERO);
    let applied = before - after;
    if applied > Decimal::ZERO {
        append_entry(conn, user_id, EntryKind::Debit, applied, after, report_id).await?;
        store_balance(conn, user_id, after).await?;
    }
    Ok(BalanceChange { before, after, applied })
}

/// Balance as exposed through the legacy profile view
pub async fn profile_balance(pool: &SqlitePool, user_id: &str) -> Result<Option<Decimal>> {
    let balance: Option<String> = sqlx::query_scalar("SELECT balance FROM profile_balances WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    balance.as_deref().map(parse_stored).transpose()
}

/// Recompute a balance from the ledger alone
pub async fn derive_balance(pool: &SqlitePool, user_id: &str) -> Result<Decimal> {
    let entries = entries_for_user(pool, user_id).await?;
    Ok(entries.iter().fold(Decimal::ZERO, |acc, entry| match entry.kind {
        EntryKind::Credit => acc + entry.amount,
        EntryKind::Debit => acc - entry.amount,
    }))
}

/// Ledger rows for a user, oldest first
pub async fn entries_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<BalanceEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, kind, amount, balance_after, report_id, created_at
        FROM balance_entries
        WHERE user_id = ?
        ORDER BY created_at, rowid
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let kind: String = row.get("kind");
            let amount: String = row.get("amount");
            let balance_after: String = row.get("balance_after");
            Ok(BalanceEntry {
                id: row.get("id"),
                user_id: row.get("user_id"),
                kind: EntryKind::parse(&kind)?,
                amount: parse_stored(&amount)?,
                balance_after: parse_stored(&balance_after)?,
                report_id: row.get("report_id"),
                created_at: row.get("created_at"),
            })
        })
        .collect()
}
