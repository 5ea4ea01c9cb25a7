//! Record classification and one pure decoder per Norma 43 record type

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::fixed_width::FixedWidthLine;

/// The four record types this decoder understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// `11`, account header
    Header,
    /// `22`, main transaction record
    Transaction,
    /// `23`, complementary concept attached to the previous transaction
    Concept,
    /// `88`, closing totals
    Footer,
}

impl RecordKind {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "11" => Some(RecordKind::Header),
            "22" => Some(RecordKind::Transaction),
            "23" => Some(RecordKind::Concept),
            "88" => Some(RecordKind::Footer),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RecordKind::Header => "11",
            RecordKind::Transaction => "22",
            RecordKind::Concept => "23",
            RecordKind::Footer => "88",
        }
    }

    /// Shortest line that still carries every mandatory field
    pub fn min_length(&self) -> usize {
        match self {
            RecordKind::Header => 51,
            RecordKind::Transaction => 52,
            RecordKind::Concept => 5,
            RecordKind::Footer => 58,
        }
    }

    fn ensure_length(&self, line: &FixedWidthLine) -> Result<(), DecodeError> {
        if line.len() < self.min_length() {
            return Err(DecodeError::TooShort {
                code: self.code(),
                length: line.len(),
                minimum: self.min_length(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Debit/credit key carried by balances and transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignIndicator {
    /// Key `1`: money leaves the account
    Debit,
    /// Key `2`: money enters the account
    Credit,
    /// Any other key; the amount keeps its unsigned value
    Unknown(char),
}

impl SignIndicator {
    pub fn from_key(key: char) -> Self {
        match key {
            '1' => SignIndicator::Debit,
            '2' => SignIndicator::Credit,
            other => SignIndicator::Unknown(other),
        }
    }

    /// Sign an unsigned magnitude according to the key
    pub fn apply(&self, magnitude: BigDecimal) -> BigDecimal {
        match self {
            SignIndicator::Debit => -magnitude,
            SignIndicator::Credit | SignIndicator::Unknown(_) => magnitude,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, SignIndicator::Unknown(_))
    }
}

/// Account header (`11`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementHeader {
    pub bank_code: String,
    pub office_code: String,
    pub account_number: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub balance_sign: SignIndicator,
    /// Signed opening balance
    pub opening_balance: BigDecimal,
    /// Opening balance plus every decoded transaction amount
    pub closing_balance: BigDecimal,
    /// ISO 4217 numeric code, `978` for euro
    pub currency_code: String,
    pub information_mode: Option<String>,
    pub account_name: Option<String>,
}

/// Main transaction record (`22`), extended by any following `23` records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_date: NaiveDate,
    pub value_date: NaiveDate,
    pub office_code: String,
    pub common_concept: String,
    pub own_concept: String,
    pub sign: SignIndicator,
    /// Signed amount: positive for credits, negative for debits
    pub amount: BigDecimal,
    pub document_number: String,
    pub reference_1: Option<String>,
    pub reference_2: Option<String>,
    pub description: String,
}

impl TransactionRecord {
    /// Append free text to the description, space separated
    pub fn append_description(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.description.is_empty() {
            self.description.push(' ');
        }
        self.description.push_str(text);
    }

    /// First non-empty of the two bank references, falling back to the document number
    pub fn external_reference(&self) -> Option<String> {
        self.reference_1
            .clone()
            .or_else(|| self.reference_2.clone())
            .or_else(|| {
                let doc = self.document_number.trim_start_matches('0');
                if doc.is_empty() {
                    None
                } else {
                    Some(self.document_number.clone())
                }
            })
    }
}

/// Complementary concept (`23`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptRecord {
    pub data_code: String,
    /// Non-blank text segments, trimmed, in field order
    pub segments: Vec<String>,
}

impl ConceptRecord {
    pub fn text(&self) -> String {
        self.segments.join(" ")
    }
}

/// Closing totals (`88`), used only to validate what was decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FooterSummary {
    pub debit_count: usize,
    pub total_debits: BigDecimal,
    pub credit_count: usize,
    pub total_credits: BigDecimal,
    /// Signed final balance, when the record carries one
    pub final_balance: Option<BigDecimal>,
}

impl FooterSummary {
    pub fn transaction_count(&self) -> usize {
        self.debit_count + self.credit_count
    }
}

/// One decoded line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    Header(StatementHeader),
    Transaction(TransactionRecord),
    Concept(ConceptRecord),
    Footer(FooterSummary),
    Unrecognized { code: String },
}

/// Why a single line could not be read as its declared record type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("registro tipo {code} demasiado corto ({length} caracteres, mínimo {minimum})")]
    TooShort {
        code: &'static str,
        length: usize,
        minimum: usize,
    },
    #[error("fecha inválida en {field}: '{raw}'")]
    InvalidDate { field: &'static str, raw: String },
    #[error("importe inválido en {field}: '{raw}'")]
    InvalidAmount { field: &'static str, raw: String },
    #[error("número inválido en {field}: '{raw}'")]
    InvalidNumber { field: &'static str, raw: String },
}

/// Read the two-character record code
pub fn classify(line: &str) -> Result<RecordKind, String> {
    let code: String = line.chars().take(2).collect();
    RecordKind::from_code(&code).ok_or(code)
}

/// Decode a physical line into a typed record
pub fn decode_line(line: &str) -> Result<Record, DecodeError> {
    let kind = match classify(line) {
        Ok(kind) => kind,
        Err(code) => return Ok(Record::Unrecognized { code }),
    };
    let fields = FixedWidthLine::new(line);
    match kind {
        RecordKind::Header => decode_header(&fields).map(Record::Header),
        RecordKind::Transaction => decode_transaction(&fields).map(Record::Transaction),
        RecordKind::Concept => decode_concept(&fields).map(Record::Concept),
        RecordKind::Footer => decode_footer(&fields).map(Record::Footer),
    }
}

pub fn decode_header(line: &FixedWidthLine) -> Result<StatementHeader, DecodeError> {
    RecordKind::Header.ensure_length(line)?;

    let balance_sign = sign_at(line, 33);
    let opening_balance = balance_sign.apply(line.amount("saldo inicial", 34, 47)?);

    Ok(StatementHeader {
        bank_code: line.text(3, 6),
        office_code: line.text(7, 10),
        account_number: line.text(11, 20),
        start_date: line.date("fecha inicial", 21, 26)?,
        end_date: line.date("fecha final", 27, 32)?,
        balance_sign,
        closing_balance: opening_balance.clone(),
        opening_balance,
        currency_code: line.text(48, 50),
        information_mode: line.optional_text(51, 51),
        account_name: line.optional_text(52, 77),
    })
}

pub fn decode_transaction(line: &FixedWidthLine) -> Result<TransactionRecord, DecodeError> {
    RecordKind::Transaction.ensure_length(line)?;

    let sign = sign_at(line, 28);
    Ok(TransactionRecord {
        transaction_date: line.date("fecha operación", 11, 16)?,
        value_date: line.date("fecha valor", 17, 22)?,
        office_code: line.text(7, 10),
        common_concept: line.text(23, 24),
        own_concept: line.text(25, 27),
        sign,
        amount: sign.apply(line.amount("importe", 29, 42)?),
        document_number: line.text(43, 52),
        reference_1: line.optional_text(53, 64),
        reference_2: line.optional_text(65, 80),
        description: String::new(),
    })
}

pub fn decode_concept(line: &FixedWidthLine) -> Result<ConceptRecord, DecodeError> {
    RecordKind::Concept.ensure_length(line)?;

    let segments = [line.text(5, 42), line.text(43, 80)]
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .collect();

    Ok(ConceptRecord {
        data_code: line.text(3, 4),
        segments,
    })
}

pub fn decode_footer(line: &FixedWidthLine) -> Result<FooterSummary, DecodeError> {
    RecordKind::Footer.ensure_length(line)?;

    let final_balance = match line.optional_text(60, 73) {
        Some(_) => Some(sign_at(line, 59).apply(line.amount("saldo final", 60, 73)?)),
        None => None,
    };

    Ok(FooterSummary {
        debit_count: line.count("número de cargos", 21, 25)?,
        total_debits: line.amount("total cargos", 26, 39)?,
        credit_count: line.count("número de abonos", 40, 44)?,
        total_credits: line.amount("total abonos", 45, 58)?,
        final_balance,
    })
}

fn sign_at(line: &FixedWidthLine, position: usize) -> SignIndicator {
    SignIndicator::from_key(line.char_at(position).unwrap_or(' '))
}
