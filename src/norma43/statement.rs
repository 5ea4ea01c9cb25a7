//! Statement assembly and validation
//!
//! Folds decoded records into a [`ParsedStatement`]. Nothing here fails: every
//! problem becomes a [`StatementIssue`] and the offending line is left out of
//! the structured result.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::fixed_width::decode_latin1;
use super::records::{
    decode_line, DecodeError, FooterSummary, Record, RecordKind, SignIndicator, StatementHeader,
    TransactionRecord,
};

/// Message used when the file carries no `11` record
pub const MISSING_HEADER: &str = "No se encontró registro de cabecera (tipo 11)";
/// Message used when the file carries no `88` record
pub const MISSING_FOOTER: &str = "No se encontró registro final (tipo 88)";

/// Content shorter than one full record cannot be a statement
pub const MIN_FORMAT_LENGTH: usize = 80;
const MIN_FORMAT_LINES: usize = 2;

/// Error taxonomy for parse-time problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A single line could not be read as its declared record type
    Decode,
    /// The record sequence is broken (missing header/footer, orphan concept)
    Structural,
    /// Footer totals disagree with what was decoded
    Validation,
}

/// A parse-time problem, optionally tied to a physical line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementIssue {
    pub line: Option<usize>,
    pub kind: IssueKind,
    pub message: String,
}

impl fmt::Display for StatementIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "Línea {}: {}", line, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Ordered, append-only issue accumulator threaded through one parse
#[derive(Debug, Default)]
pub struct IssueLog {
    issues: Vec<StatementIssue>,
}

impl IssueLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, line: Option<usize>, kind: IssueKind, message: impl Into<String>) {
        self.issues.push(StatementIssue {
            line,
            kind,
            message: message.into(),
        });
    }

    pub fn decode_error(&mut self, line: usize, error: &DecodeError) {
        self.record(Some(line), IssueKind::Decode, error.to_string());
    }

    pub fn structural(&mut self, line: Option<usize>, message: impl Into<String>) {
        self.record(line, IssueKind::Structural, message);
    }

    pub fn validation(&mut self, line: Option<usize>, message: impl Into<String>) {
        self.record(line, IssueKind::Validation, message);
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn into_issues(self) -> Vec<StatementIssue> {
        self.issues
    }
}

/// Totals recomputed from the decoded transactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSummary {
    pub transactions_count: usize,
    /// Magnitude of all negative amounts
    pub total_debits: BigDecimal,
    /// Sum of all positive amounts
    pub total_credits: BigDecimal,
}

impl StatementSummary {
    pub fn from_transactions(transactions: &[TransactionRecord]) -> Self {
        let zero = BigDecimal::from(0);
        let total_debits: BigDecimal = transactions
            .iter()
            .filter(|t| t.amount < zero)
            .map(|t| t.amount.abs())
            .sum();
        let total_credits: BigDecimal = transactions
            .iter()
            .filter(|t| t.amount > zero)
            .map(|t| &t.amount)
            .sum();

        Self {
            transactions_count: transactions.len(),
            total_debits,
            total_credits,
        }
    }

    /// Credits minus debits
    pub fn net_movement(&self) -> BigDecimal {
        &self.total_credits - &self.total_debits
    }
}

/// Result of parsing one statement file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedStatement {
    pub header: Option<StatementHeader>,
    /// Transactions in file order, with concepts already applied
    pub transactions: Vec<TransactionRecord>,
    /// Every problem found, in the order it was found
    pub errors: Vec<StatementIssue>,
    pub summary: StatementSummary,
}

impl ParsedStatement {
    /// Issues rendered the way they are shown to the person approving the import
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn has_issue_containing(&self, needle: &str) -> bool {
        self.errors.iter().any(|e| e.to_string().contains(needle))
    }

    pub fn has_structural_errors(&self) -> bool {
        self.errors.iter().any(|e| e.kind == IssueKind::Structural)
    }

    /// Only a structurally broken file with nothing decodable blocks an import
    pub fn is_importable(&self) -> bool {
        self.header.is_some() && !(self.transactions.is_empty() && self.has_structural_errors())
    }
}

/// Physical lines worth decoding, with their 1-based line numbers
pub fn split_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty())
}

/// Cheap pre-check used to turn away foreign files before a full decode
pub fn is_valid_format(content: &str) -> bool {
    if content.chars().count() < MIN_FORMAT_LENGTH {
        return false;
    }

    let mut lines = 0;
    let mut has_header = false;
    let mut has_footer = false;
    for (_, line) in split_lines(content) {
        lines += 1;
        has_header |= line.starts_with(RecordKind::Header.code());
        has_footer |= line.starts_with(RecordKind::Footer.code());
    }

    has_header && has_footer && lines >= MIN_FORMAT_LINES
}

/// Parse statement text
pub fn parse_statement(content: &str) -> ParsedStatement {
    let statement = StatementAssembler::new().run(content);
    tracing::debug!(
        transactions = statement.summary.transactions_count,
        issues = statement.errors.len(),
        "Parsed Norma 43 statement"
    );
    statement
}

/// Parse raw file bytes encoded as ISO-8859-1
pub fn parse_statement_bytes(bytes: &[u8]) -> ParsedStatement {
    parse_statement(&decode_latin1(bytes))
}

/// Folds records into a statement while collecting issues
struct StatementAssembler {
    header: Option<StatementHeader>,
    transactions: Vec<TransactionRecord>,
    footer: Option<(usize, FooterSummary)>,
    issues: IssueLog,
}

impl StatementAssembler {
    fn new() -> Self {
        Self {
            header: None,
            transactions: Vec::new(),
            footer: None,
            issues: IssueLog::new(),
        }
    }

    fn run(mut self, content: &str) -> ParsedStatement {
        let has_header =
            split_lines(content).any(|(_, line)| line.starts_with(RecordKind::Header.code()));
        if !has_header {
            self.issues.structural(None, MISSING_HEADER);
            return self.finish();
        }

        for (line_number, line) in split_lines(content) {
            match decode_line(line) {
                Ok(record) => self.apply(line_number, record),
                Err(error) => self.issues.decode_error(line_number, &error),
            }
        }

        if self.header.is_none() {
            // an `11` line was present but could not be decoded
            self.issues.structural(None, MISSING_HEADER);
            return self.finish();
        }
        self.validate();
        self.finish()
    }

    fn apply(&mut self, line: usize, record: Record) {
        match record {
            Record::Header(header) => {
                if self.header.is_some() {
                    self.issues.structural(
                        Some(line),
                        "registro de cabecera duplicado, se conserva el primero",
                    );
                } else {
                    if let SignIndicator::Unknown(key) = header.balance_sign {
                        self.issues.validation(
                            Some(line),
                            format!("clave de saldo inicial desconocida '{}', se asume acreedor", key),
                        );
                    }
                    self.header = Some(header);
                }
            }
            Record::Transaction(transaction) => {
                if let SignIndicator::Unknown(key) = transaction.sign {
                    self.issues.validation(
                        Some(line),
                        format!("clave debe/haber desconocida '{}', se asume haber", key),
                    );
                }
                self.transactions.push(transaction);
            }
            Record::Concept(concept) => match self.transactions.last_mut() {
                Some(last) => last.append_description(&concept.text()),
                None => self.issues.structural(
                    Some(line),
                    "registro de concepto (tipo 23) sin movimiento previo",
                ),
            },
            Record::Footer(footer) => {
                if self.footer.is_some() {
                    self.issues.structural(
                        Some(line),
                        "registro final duplicado, se conserva el primero",
                    );
                } else {
                    self.footer = Some((line, footer));
                }
            }
            Record::Unrecognized { code } => {
                self.issues.record(
                    Some(line),
                    IssueKind::Decode,
                    format!("tipo de registro desconocido '{}'", code),
                );
            }
        }
    }

    fn validate(&mut self) {
        let summary = StatementSummary::from_transactions(&self.transactions);

        if let Some(header) = self.header.as_mut() {
            header.closing_balance = &header.opening_balance + summary.net_movement();
        }

        let Some((line, footer)) = self.footer.as_ref() else {
            self.issues.structural(None, MISSING_FOOTER);
            return;
        };
        let line = Some(*line);

        if footer.transaction_count() != summary.transactions_count {
            self.issues.validation(
                line,
                format!(
                    "Total de movimientos no coincide: declarados {}, encontrados {}",
                    footer.transaction_count(),
                    summary.transactions_count
                ),
            );
        }
        if footer.total_debits != summary.total_debits {
            self.issues.validation(
                line,
                format!(
                    "Total de cargos no coincide: declarado {}, calculado {}",
                    footer.total_debits, summary.total_debits
                ),
            );
        }
        if footer.total_credits != summary.total_credits {
            self.issues.validation(
                line,
                format!(
                    "Total de abonos no coincide: declarado {}, calculado {}",
                    footer.total_credits, summary.total_credits
                ),
            );
        }
        if let (Some(declared), Some(header)) = (&footer.final_balance, &self.header) {
            if *declared != header.closing_balance {
                self.issues.validation(
                    line,
                    format!(
                        "Saldo final no coincide: declarado {}, calculado {}",
                        declared, header.closing_balance
                    ),
                );
            }
        }
    }

    fn finish(self) -> ParsedStatement {
        let transactions = if self.header.is_some() {
            self.transactions
        } else {
            Vec::new()
        };
        ParsedStatement {
            summary: StatementSummary::from_transactions(&transactions),
            header: self.header,
            transactions,
            errors: self.issues.into_issues(),
        }
    }
}
