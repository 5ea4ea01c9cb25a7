//! Positional field access for fixed-width records

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use super::records::DecodeError;

/// A record line addressed by 1-based, inclusive character positions, the way
/// the AEB field tables are written.
#[derive(Debug, Clone)]
pub struct FixedWidthLine {
    chars: Vec<char>,
}

impl FixedWidthLine {
    pub fn new(line: &str) -> Self {
        Self {
            chars: line.chars().collect(),
        }
    }

    /// Length in characters, not bytes
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Raw field text; positions past the end of the line yield what exists
    pub fn field(&self, start: usize, end: usize) -> String {
        let from = start.saturating_sub(1).min(self.chars.len());
        let to = end.min(self.chars.len());
        if from >= to {
            return String::new();
        }
        self.chars[from..to].iter().collect()
    }

    /// Field text with surrounding padding removed
    pub fn text(&self, start: usize, end: usize) -> String {
        self.field(start, end).trim().to_string()
    }

    /// Trimmed field text, `None` when blank
    pub fn optional_text(&self, start: usize, end: usize) -> Option<String> {
        let value = self.text(start, end);
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    pub fn char_at(&self, position: usize) -> Option<char> {
        position
            .checked_sub(1)
            .and_then(|index| self.chars.get(index))
            .copied()
    }

    pub fn date(
        &self,
        field: &'static str,
        start: usize,
        end: usize,
    ) -> Result<NaiveDate, DecodeError> {
        parse_yymmdd(&self.field(start, end)).ok_or_else(|| DecodeError::InvalidDate {
            field,
            raw: self.field(start, end),
        })
    }

    pub fn amount(
        &self,
        field: &'static str,
        start: usize,
        end: usize,
    ) -> Result<BigDecimal, DecodeError> {
        parse_implied_cents(&self.field(start, end)).ok_or_else(|| DecodeError::InvalidAmount {
            field,
            raw: self.field(start, end),
        })
    }

    pub fn count(
        &self,
        field: &'static str,
        start: usize,
        end: usize,
    ) -> Result<usize, DecodeError> {
        let raw = self.field(start, end);
        let parsed = match raw.trim() {
            digits if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
                digits.parse::<usize>().ok()
            }
            _ => None,
        };
        parsed.ok_or(DecodeError::InvalidNumber { field, raw })
    }
}

/// Expand a `YYMMDD` date; every two-digit year lands in 2000-2099
pub fn parse_yymmdd(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 6 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = raw[0..2].parse().ok()?;
    let month: u32 = raw[2..4].parse().ok()?;
    let day: u32 = raw[4..6].parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + year, month, day)
}

/// Digits-only amount whose last two digits are the fraction
pub fn parse_implied_cents(raw: &str) -> Option<BigDecimal> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let cents: i128 = raw.parse().ok()?;
    Some(BigDecimal::new(cents.into(), 2))
}

/// Decode ISO-8859-1 bytes; every byte maps to the code point of the same value
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
