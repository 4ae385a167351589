//! Monetary amount helpers
//!
//! Amounts are persisted as decimal TEXT columns so that sums survive the
//! round trip through SQLite without binary floating point drift.

use crate::{Error, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse an amount column read back from the database
pub fn parse_stored(value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|e| Error::InvalidInput(format!("Stored amount '{}' is not a decimal: {}", value, e)))
}

/// Parse an optional amount column, treating NULL as zero
pub fn parse_stored_opt(value: Option<String>) -> Result<Decimal> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_stored(&v),
        _ => Ok(Decimal::ZERO),
    }
}

/// Render an amount for storage
pub fn to_stored(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Lenient parse of a revenue figure as written by distributors
///
/// Accepts plain decimals, a comma decimal separator (when no dot is present)
/// and scientific notation. Returns `None` when nothing sensible is found.
pub fn parse_lenient(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replacen(',', ".", 1)
    } else {
        trimmed.to_string()
    };

    Decimal::from_str(&candidate)
        .or_else(|_| Decimal::from_scientific(&candidate))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_stored_round_trip_keeps_precision() {
        let value = dec!(0.1) + dec!(0.2);
        assert_eq!(parse_stored(&to_stored(value)).unwrap(), dec!(0.3));
    }

    #[test]
    fn test_parse_stored_rejects_garbage() {
        assert!(parse_stored("twelve").is_err());
    }

    #[test]
    fn test_parse_stored_opt_null_is_zero() {
        assert_eq!(parse_stored_opt(None).unwrap(), Decimal::ZERO);
        assert_eq!(parse_stored_opt(Some("".to_string())).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_parse_lenient_formats() {
        assert_eq!(parse_lenient("12.50"), Some(dec!(12.50)));
        assert_eq!(parse_lenient(" 0,0375 "), Some(dec!(0.0375)));
        assert_eq!(parse_lenient("1.5E-3"), Some(dec!(0.0015)));
        assert_eq!(parse_lenient("-3.25"), Some(dec!(-3.25)));
        assert_eq!(parse_lenient("n/a"), None);
        assert_eq!(parse_lenient(""), None);
    }
}
