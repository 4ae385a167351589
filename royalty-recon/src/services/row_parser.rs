//! Distributor CSV row parsing
//!
//! Splits decoded report text into header-keyed rows. The format is the loose
//! CSV dialect distributors actually produce: a configurable delimiter, double
//! quotes that only toggle quoting (quote characters are never copied) and
//! spreadsheet-mangled ISRC/UPC codes in scientific notation.

use std::collections::HashMap;

/// Column names used by the reconciliation
pub mod columns {
    pub const PLATFORM: &str = "Platform";
    pub const COUNTRY: &str = "Country/Region";
    pub const ARTIST: &str = "Artist Name";
    pub const RELEASE_TITLE: &str = "Release title";
    pub const TRACK_TITLE: &str = "Track title";
    pub const UPC: &str = "UPC";
    pub const ISRC: &str = "ISRC";
    pub const QUANTITY: &str = "Quantity";
    pub const NET_REVENUE: &str = "Net Revenue";
}

/// Default field delimiter of distributor exports
pub const DEFAULT_DELIMITER: char = ';';

/// One data row keyed by header name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportRow {
    fields: HashMap<String, String>,
}

impl ReportRow {
    /// Field value, or "" when the column is absent
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Whether a file should be skipped as a distributor summary sheet
pub fn is_summary_file(file_name: &str) -> bool {
    file_name.to_lowercase().contains("summary")
}

/// Parse decoded report text into rows
///
/// Text with fewer than two lines (no data after the header) yields no rows.
pub fn parse_rows(content: &str, delimiter: char) -> Vec<ReportRow> {
    let lines: Vec<&str> = content.trim().split('\n').collect();
    if lines.len() < 2 {
        return Vec::new();
    }

    let headers = split_line(lines[0], delimiter);

    lines[1..]
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let values = split_line(line, delimiter);
            let fields = headers
                .iter()
                .enumerate()
                .map(|(idx, header)| {
                    let raw = values.get(idx).map(String::as_str).unwrap_or("");
                    (header.clone(), normalize_value(raw, header))
                })
                .collect();
            ReportRow { fields }
        })
        .collect()
}

/// Whether the header line names ISRC, UPC or track title
///
/// A header without any of them usually means the file was split on the
/// wrong delimiter.
pub fn has_identity_columns(content: &str, delimiter: char) -> bool {
    let header = content.trim().split('\n').next().unwrap_or("");
    split_line(header, delimiter)
        .iter()
        .any(|h| h == columns::ISRC || h == columns::UPC || h == columns::TRACK_TITLE)
}

/// Split one line on `delimiter`, honouring double-quote toggling
fn split_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == delimiter && !in_quotes {
            fields.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }

    fields.push(current.trim().to_string());
    fields
}

/// Repair ISRC/UPC codes that a spreadsheet rendered as `4.6012E+12`
fn normalize_value(value: &str, column: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if (column == columns::ISRC || column == columns::UPC) && has_exponent(trimmed) {
        let candidate = trimmed.replacen(',', ".", 1);
        if let Ok(number) = candidate.parse::<f64>() {
            if number.is_finite() {
                return format!("{:.0}", number);
            }
        }
    }

    trimmed.to_string()
}

/// True when the text contains `e`/`E`, an optional sign, then a digit
fn has_exponent(value: &str) -> bool {
    let chars: Vec<char> = value.chars().collect();
    chars.iter().enumerate().any(|(i, c)| {
        if *c != 'e' && *c != 'E' {
            return false;
        }
        match chars.get(i + 1) {
            Some('+') | Some('-') => chars.get(i + 2).is_some_and(|d| d.is_ascii_digit()),
            Some(d) => d.is_ascii_digit(),
            None => false,
        }
    })
}

/// Extract `("Q<n>", year)` from a path such as `reports/q1 2025/spotify.csv`
pub fn parse_quarter_from_path(path: &str) -> Option<(String, i32)> {
    let chars: Vec<char> = path.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if !c.eq_ignore_ascii_case(&'q') {
            continue;
        }
        let Some(quarter) = chars.get(i + 1).filter(|d| d.is_ascii_digit()) else {
            continue;
        };

        let mut pos = i + 2;
        while chars.get(pos).is_some_and(|w| w.is_whitespace()) {
            pos += 1;
        }

        let year: String = chars.iter().skip(pos).take(4).collect();
        if year.len() == 4 && year.chars().all(|d| d.is_ascii_digit()) {
            if let Ok(year) = year.parse::<i32>() {
                return Some((format!("Q{}", quarter), year));
            }
        }
    }

    None
}
