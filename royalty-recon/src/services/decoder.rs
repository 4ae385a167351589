//! Report file decoder
//!
//! Distributors export CSV in whatever encoding their tooling defaults to.
//! Candidates are tried in order: UTF-8 (BOM stripped), Windows-1251, then
//! ISO-8859-1. The last one maps every byte, so decoding never fails.

use encoding_rs::{UTF_8, WINDOWS_1251};

/// Encoding a report file was decoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedEncoding {
    Utf8,
    Windows1251,
    Latin1,
}

impl DetectedEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            DetectedEncoding::Utf8 => "UTF-8",
            DetectedEncoding::Windows1251 => "windows-1251",
            DetectedEncoding::Latin1 => "ISO-8859-1",
        }
    }
}

/// Decoded report text
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: DetectedEncoding,
}

/// Decode raw report bytes into text using the first clean candidate
pub fn decode(bytes: &[u8]) -> DecodedText {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    if !had_errors && !text.contains(char::REPLACEMENT_CHARACTER) {
        return DecodedText {
            text: text.into_owned(),
            encoding: DetectedEncoding::Utf8,
        };
    }

    let (text, had_errors) = WINDOWS_1251.decode_without_bom_handling(bytes);
    if !had_errors && !text.contains(char::REPLACEMENT_CHARACTER) {
        return DecodedText {
            text: text.into_owned(),
            encoding: DetectedEncoding::Windows1251,
        };
    }

    DecodedText {
        text: encoding_rs::mem::decode_latin1(bytes).into_owned(),
        encoding: DetectedEncoding::Latin1,
    }
}
