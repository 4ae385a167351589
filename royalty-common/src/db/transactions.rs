//! Audit transactions
//!
//! Human-readable history of balance movements shown to users. Rows written
//! by the royalty services carry their report id in `metadata`.

use crate::amount::{parse_stored, to_stored};
use crate::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// New audit transaction
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: String,
    pub kind: String,
    pub amount: Decimal,
    pub currency: String,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub status: String,
    pub description: String,
    pub payment_method: Option<String>,
    pub reference_id: Option<String>,
    pub metadata: serde_json::Value,
}

/// Stored audit transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: Decimal,
    pub currency: String,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub status: String,
    pub description: String,
    pub payment_method: Option<String>,
    pub reference_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: String,
}

/// Insert an audit transaction, returning its id
pub async fn insert_transaction(pool: &SqlitePool, tx: &NewTransaction) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, user_id, type, amount, currency, balance_before, balance_after,
            status, description, payment_method, reference_id, metadata
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&tx.user_id)
    .bind(&tx.kind)
    .bind(to_stored(tx.amount))
    .bind(&tx.currency)
    .bind(to_stored(tx.balance_before))
    .bind(to_stored(tx.balance_after))
    .bind(&tx.status)
    .bind(&tx.description)
    .bind(&tx.payment_method)
    .bind(&tx.reference_id)
    .bind(tx.metadata.to_string())
    .execute(pool)
    .await?;

    Ok(id)
}

/// Row predicate on `metadata.report_id`
///
/// `CASE` keeps `json_extract` away from non-JSON metadata written by other
/// balance writers sharing this table.
const REPORT_ID_MATCH: &str =
    "(CASE WHEN json_valid(metadata) THEN json_extract(metadata, '$.report_id') END) = ?";

/// Delete every transaction whose metadata names `report_id`
pub async fn delete_by_report(conn: &mut SqliteConnection, report_id: &str) -> Result<u64> {
    let sql = format!("DELETE FROM transactions WHERE {}", REPORT_ID_MATCH);
    let result = sqlx::query(&sql)
        .bind(report_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Transactions whose metadata names `report_id`
pub async fn list_by_report(pool: &SqlitePool, report_id: &str) -> Result<Vec<TransactionRecord>> {
    let sql = format!(
        "SELECT id, user_id, type, amount, currency, balance_before, balance_after, \
         status, description, payment_method, reference_id, metadata, created_at \
         FROM transactions WHERE {} ORDER BY created_at, rowid",
        REPORT_ID_MATCH
    );
    let rows = sqlx::query(&sql).bind(report_id).fetch_all(pool).await?;

    rows.iter()
        .map(|row| {
            let amount: String = row.get("amount");
            let before: String = row.get("balance_before");
            let after: String = row.get("balance_after");
            let metadata: String = row.get("metadata");
            Ok(TransactionRecord {
                id: row.get("id"),
                user_id: row.get("user_id"),
                kind: row.get("type"),
                amount: parse_stored(&amount)?,
                currency: row.get("currency"),
                balance_before: parse_stored(&before)?,
                balance_after: parse_stored(&after)?,
                status: row.get("status"),
                description: row.get("description"),
                payment_method: row.get("payment_method"),
                reference_id: row.get("reference_id"),
                metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
                created_at: row.get("created_at"),
            })
        })
        .collect()
}
