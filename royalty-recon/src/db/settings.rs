//! Reconciliation settings
//!
//! Named accessors over the shared `settings` table.

use royalty_common::db::settings::{get_setting, set_setting};
use royalty_common::Result;
use sqlx::{Pool, Sqlite};

pub const CSV_DELIMITER_KEY: &str = "csv_delimiter";
pub const BALANCE_MAX_LOCK_WAIT_KEY: &str = "balance_max_lock_wait_ms";

/// Default retry window for balance writes
pub const DEFAULT_BALANCE_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Default CSV delimiter stored in the database, if any
pub async fn get_csv_delimiter(db: &Pool<Sqlite>) -> Result<Option<char>> {
    get_setting::<char>(db, CSV_DELIMITER_KEY).await
}

pub async fn set_csv_delimiter(db: &Pool<Sqlite>, delimiter: char) -> Result<()> {
    set_setting(db, CSV_DELIMITER_KEY, delimiter).await
}

/// Retry window for balance transactions
///
/// **Default:** 5000 ms
pub async fn get_balance_max_lock_wait_ms(db: &Pool<Sqlite>) -> Result<u64> {
    get_setting(db, BALANCE_MAX_LOCK_WAIT_KEY)
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_BALANCE_MAX_LOCK_WAIT_MS))
}

pub async fn set_balance_max_lock_wait_ms(db: &Pool<Sqlite>, value: u64) -> Result<()> {
    set_setting(db, BALANCE_MAX_LOCK_WAIT_KEY, value).await
}
