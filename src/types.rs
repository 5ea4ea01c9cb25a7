//! Core types and data structures for the reconciliation system

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an imported bank transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Imported and waiting to be linked to a ledger event
    Pending,
    /// Linked to exactly one active approved match
    Reconciled,
    /// Explicitly excluded from reconciliation
    Ignored,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Reconciled => "reconciled",
            TransactionStatus::Ignored => "ignored",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of ledger event a match points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Invoice,
    Entry,
    Manual,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Invoice => "invoice",
            MatchType::Entry => "entry",
            MatchType::Manual => "manual",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a reconciliation match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Suggested,
    Approved,
    Rejected,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Suggested => "suggested",
            MatchStatus::Approved => "approved",
            MatchStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named scoring rules, recorded on every suggestion for audit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingRule {
    /// Transaction magnitude equals the candidate's debit or credit side
    ExactAmount,
    /// Transaction and candidate dates fall within the configured window
    DateProximity,
    /// Leading description token of one side appears in the other
    DescriptionMatch,
}

impl MatchingRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchingRule::ExactAmount => "exact_amount",
            MatchingRule::DateProximity => "date_proximity",
            MatchingRule::DescriptionMatch => "description_match",
        }
    }
}

impl fmt::Display for MatchingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the bank account being imported or reconciled, within its
/// owning organization
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountScope {
    /// Tenant that owns both the bank account and the ledger
    pub organization_id: String,
    /// Bank account inside the organization
    pub bank_account_id: String,
}

impl AccountScope {
    pub fn new(organization_id: impl Into<String>, bank_account_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            bank_account_id: bank_account_id.into(),
        }
    }
}

/// Ledger event a transaction has been reconciled against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedEntity {
    pub kind: MatchType,
    pub id: String,
}

/// Bank transaction as persisted by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    /// Unique identifier for the transaction
    pub id: String,
    /// Organization owning the bank account
    pub organization_id: String,
    /// Bank account the transaction was imported into
    pub bank_account_id: String,
    /// Operation date as reported by the bank
    pub transaction_date: NaiveDate,
    /// Value date as reported by the bank
    pub value_date: NaiveDate,
    /// Free-text description, built from concept records
    pub description: String,
    /// External reference (bank reference or document number)
    pub reference: Option<String>,
    /// Signed amount: positive for credits, negative for debits
    pub amount: BigDecimal,
    /// Running balance after this transaction, when known
    pub balance: Option<BigDecimal>,
    /// Reconciliation status
    pub status: TransactionStatus,
    /// Ledger event linked through the active approved match
    pub matched_entity: Option<MatchedEntity>,
    /// Active approved match
    pub reconciliation_match_id: Option<String>,
    /// Identifier shared by every row imported from the same file
    pub import_batch_id: String,
    /// When the transaction was created
    pub created_at: NaiveDateTime,
    /// When the transaction was last updated
    pub updated_at: NaiveDateTime,
}

impl BankTransaction {
    /// Whether money came into the account
    pub fn is_credit(&self) -> bool {
        self.amount > BigDecimal::from(0)
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }
}

/// Ledger entry or invoice that a bank transaction may correspond to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerCandidate {
    pub id: String,
    pub kind: MatchType,
    pub organization_id: String,
    pub date: NaiveDate,
    pub description: String,
    /// Debit side magnitude (matched against outgoing transactions)
    pub debit: BigDecimal,
    /// Credit side magnitude (matched against incoming transactions)
    pub credit: BigDecimal,
}

impl LedgerCandidate {
    /// Create a candidate with both sides at zero
    pub fn new(
        id: impl Into<String>,
        kind: MatchType,
        organization_id: impl Into<String>,
        date: NaiveDate,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            organization_id: organization_id.into(),
            date,
            description: description.into(),
            debit: BigDecimal::from(0),
            credit: BigDecimal::from(0),
        }
    }

    pub fn with_debit(mut self, amount: BigDecimal) -> Self {
        self.debit = amount;
        self
    }

    pub fn with_credit(mut self, amount: BigDecimal) -> Self {
        self.credit = amount;
        self
    }
}

/// Candidate link between a bank transaction and a ledger event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationMatch {
    pub id: String,
    pub transaction_id: String,
    pub match_type: MatchType,
    pub matched_entity_id: String,
    /// Weighted score in [0, 1]
    pub confidence: BigDecimal,
    /// Rules that contributed to the score, in evaluation order
    pub matching_rules: Vec<MatchingRule>,
    pub status: MatchStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
    /// Set when the owning transaction was unmatched after approval
    pub undone_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ReconciliationMatch {
    /// Create a new suggestion with a fresh identifier
    pub fn suggestion(
        transaction_id: String,
        match_type: MatchType,
        matched_entity_id: String,
        confidence: BigDecimal,
        matching_rules: Vec<MatchingRule>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            transaction_id,
            match_type,
            matched_entity_id,
            confidence,
            matching_rules,
            status: MatchStatus::Suggested,
            approved_by: None,
            approved_at: None,
            undone_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Approved and not undone since
    pub fn is_active_approval(&self) -> bool {
        self.status == MatchStatus::Approved && self.undone_at.is_none()
    }

    /// Identity used to deduplicate suggestions
    pub fn pair_key(&self) -> (&str, MatchType, &str) {
        (&self.transaction_id, self.match_type, &self.matched_entity_id)
    }
}

/// State-machine action, reported back on conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionAction {
    Approve,
    Reject,
    Undo,
    Ignore,
}

impl fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransitionAction::Approve => "approve",
            TransitionAction::Reject => "reject",
            TransitionAction::Undo => "undo",
            TransitionAction::Ignore => "ignore",
        })
    }
}

/// Errors that can occur in the reconciliation system
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconciliationError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Match not found: {0}")]
    MatchNotFound(String),
    #[error("Import batch not found: {0}")]
    ImportBatchNotFound(String),
    #[error("Conflict: cannot {action} '{entity_id}' while it is {current_state}")]
    Conflict {
        action: TransitionAction,
        entity_id: String,
        current_state: String,
    },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Import blocked: {0}")]
    ImportBlocked(String),
}

impl ReconciliationError {
    pub fn conflict(
        action: TransitionAction,
        entity_id: impl Into<String>,
        current_state: impl fmt::Display,
    ) -> Self {
        ReconciliationError::Conflict {
            action,
            entity_id: entity_id.into(),
            current_state: current_state.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconciliationError::Conflict { .. })
    }
}

/// Result type for reconciliation operations
pub type ReconciliationResult<T> = Result<T, ReconciliationError>;
