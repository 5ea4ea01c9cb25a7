//! Traits for storage abstraction

use async_trait::async_trait;

use crate::types::*;

/// A bank transaction together with every match recorded against it.
///
/// This is the unit of atomicity for state transitions: storage hands one out
/// under its own transaction and writes it back only if the caller succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationScope {
    pub transaction: BankTransaction,
    pub matches: Vec<ReconciliationMatch>,
}

impl ReconciliationScope {
    pub fn find_match(&self, match_id: &str) -> Option<&ReconciliationMatch> {
        self.matches.iter().find(|m| m.id == match_id)
    }

    pub fn find_match_mut(&mut self, match_id: &str) -> Option<&mut ReconciliationMatch> {
        self.matches.iter_mut().find(|m| m.id == match_id)
    }

    /// Approved match currently linked to the transaction
    pub fn active_approval(&self) -> Option<&ReconciliationMatch> {
        self.matches.iter().find(|m| m.is_active_approval())
    }

    /// Suggested matches, highest confidence first
    pub fn open_suggestions(&self) -> Vec<&ReconciliationMatch> {
        let mut open: Vec<&ReconciliationMatch> = self
            .matches
            .iter()
            .filter(|m| m.status == MatchStatus::Suggested)
            .collect();
        open.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        open
    }
}

/// Outcome of an idempotent suggestion write
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// No match existed for the pair; this one was stored
    Inserted(ReconciliationMatch),
    /// A match for the pair already existed and was left untouched
    Existing(ReconciliationMatch),
}

impl UpsertOutcome {
    pub fn into_match(self) -> ReconciliationMatch {
        match self {
            UpsertOutcome::Inserted(m) | UpsertOutcome::Existing(m) => m,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted(_))
    }
}

/// Storage abstraction for the reconciliation system
///
/// The core never writes durably on its own; every write goes through this
/// trait, so any backend (PostgreSQL, SQLite, in-memory) can be plugged in.
#[async_trait]
pub trait ReconciliationStorage: Send + Sync {
    /// Insert freshly imported transactions
    async fn insert_transactions(&self, transactions: &[BankTransaction])
        -> ReconciliationResult<usize>;

    /// Get a transaction by ID
    async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> ReconciliationResult<Option<BankTransaction>>;

    /// List the transactions of one bank account, optionally filtered by status
    async fn list_transactions(
        &self,
        scope: &AccountScope,
        status: Option<TransactionStatus>,
    ) -> ReconciliationResult<Vec<BankTransaction>>;

    /// List every transaction created by one import
    async fn list_batch_transactions(
        &self,
        import_batch_id: &str,
    ) -> ReconciliationResult<Vec<BankTransaction>>;

    /// Remove every transaction of one import together with its matches.
    /// Must refuse with a validation error if any of them is reconciled.
    async fn delete_import_batch(&self, import_batch_id: &str) -> ReconciliationResult<usize>;

    /// Ledger entries and invoices of one organization that may be matched
    async fn list_ledger_candidates(
        &self,
        organization_id: &str,
    ) -> ReconciliationResult<Vec<LedgerCandidate>>;

    /// Store a suggestion unless one already exists for the same
    /// (transaction, match type, matched entity) pair
    async fn upsert_suggestion(
        &self,
        suggestion: &ReconciliationMatch,
    ) -> ReconciliationResult<UpsertOutcome>;

    /// Get a match by ID
    async fn get_match(&self, match_id: &str) -> ReconciliationResult<Option<ReconciliationMatch>>;

    /// List every match recorded against a transaction
    async fn list_matches(&self, transaction_id: &str)
        -> ReconciliationResult<Vec<ReconciliationMatch>>;

    /// Run `apply` over a transaction and its matches as one atomic
    /// read-modify-write. When `apply` returns an error nothing is written.
    async fn modify_transaction<T, F>(
        &self,
        transaction_id: &str,
        apply: F,
    ) -> ReconciliationResult<T>
    where
        T: Send,
        F: FnOnce(&mut ReconciliationScope) -> ReconciliationResult<T> + Send;
}
