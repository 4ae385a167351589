//! Settings table accessors
//!
//! Key/value runtime settings. Values are stored as text and parsed on read.

use crate::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Read a setting, parsing it into `T`
///
/// **Returns:** Some(value) if set, None if the key is absent
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Insert or overwrite a setting
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

/// Remove a setting so lower-priority sources apply again
pub async fn clear_setting(db: &Pool<Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_missing_setting_is_none() {
        let pool = test_pool().await;
        let value: Option<u64> = get_setting(&pool, "balance_max_lock_wait_ms").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_then_overwrite() {
        let pool = test_pool().await;
        set_setting(&pool, "csv_delimiter", ';').await.unwrap();
        set_setting(&pool, "csv_delimiter", ',').await.unwrap();

        let value: Option<char> = get_setting(&pool, "csv_delimiter").await.unwrap();
        assert_eq!(value, Some(','));
    }

    #[tokio::test]
    async fn test_unparseable_value_is_config_error() {
        let pool = test_pool().await;
        set_setting(&pool, "balance_max_lock_wait_ms", "soon").await.unwrap();

        let result: Result<Option<u64>> = get_setting(&pool, "balance_max_lock_wait_ms").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_clear_setting() {
        let pool = test_pool().await;
        set_setting(&pool, "csv_delimiter", ';').await.unwrap();
        clear_setting(&pool, "csv_delimiter").await.unwrap();

        let value: Option<char> = get_setting(&pool, "csv_delimiter").await.unwrap();
        assert_eq!(value, None);
    }
}
