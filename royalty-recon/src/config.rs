//! Configuration resolution for royalty-recon
//!
//! The default CSV delimiter is resolved with Database → ENV → TOML priority,
//! falling back to `;`.

use crate::services::row_parser::DEFAULT_DELIMITER;
use royalty_common::config::TomlConfig;
use royalty_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

/// Environment override for the default delimiter
pub const DELIMITER_ENV: &str = "ROYALTY_CSV_DELIMITER";

/// Parse a delimiter setting: a single character, or `tab`/`\t`
pub fn parse_delimiter(value: &str) -> Result<char> {
    let value = value.trim_matches(|c| c == '\r' || c == '\n');
    match value {
        "tab" | "\\t" | "\t" => return Ok('\t'),
        _ => {}
    }

    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c != '"' && !c.is_alphanumeric() => Ok(c),
        _ => Err(Error::InvalidInput(format!(
            "Delimiter must be a single non-alphanumeric character, got {:?}",
            value
        ))),
    }
}

/// Resolve the default delimiter for uploads that do not name one
///
/// **Priority:** Database → ENV → TOML → `;`
pub async fn resolve_default_delimiter(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<char> {
    let mut sources = Vec::new();

    let db_value = crate::db::settings::get_csv_delimiter(db).await?;
    if db_value.is_some() {
        sources.push("database");
    }

    let env_value = match std::env::var(DELIMITER_ENV) {
        Ok(raw) => match parse_delimiter(&raw) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("Ignoring {}: {}", DELIMITER_ENV, e);
                None
            }
        },
        Err(_) => None,
    };
    if env_value.is_some() {
        sources.push("environment");
    }

    let toml_value = toml_config.reconciliation.default_delimiter;
    if toml_value.is_some() {
        sources.push("TOML");
    }

    if sources.len() > 1 {
        warn!(
            "CSV delimiter found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(c) = db_value.or(env_value).or(toml_value) {
        info!(delimiter = ?c, source = sources[0], "Default CSV delimiter resolved");
        return Ok(c);
    }

    Ok(DEFAULT_DELIMITER)
}
