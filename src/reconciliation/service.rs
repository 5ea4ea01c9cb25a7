//! Reconciliation orchestrator that coordinates import, matching and the
//! match lifecycle over a storage backend

use serde::{Deserialize, Serialize};

use crate::import::{ImportBatch, StatementImporter};
use crate::norma43::{parse_statement, ParsedStatement};
use crate::reconciliation::matcher::{MatcherConfig, ReconciliationMatcher};
use crate::reconciliation::transitions;
use crate::traits::*;
use crate::types::*;
use crate::utils::{dedupe_ids, validate_approver_id};

/// Transition applied to every transaction of a bulk request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BulkAction {
    /// Approve the best suggestion of each pending transaction
    Confirm { approver_id: String },
    /// Reject every open suggestion of each pending transaction
    Reject,
    /// Send each reconciled transaction back to pending
    Unmatch,
}

impl BulkAction {
    fn transition(&self) -> TransitionAction {
        match self {
            BulkAction::Confirm { .. } => TransitionAction::Approve,
            BulkAction::Reject => TransitionAction::Reject,
            BulkAction::Unmatch => TransitionAction::Undo,
        }
    }
}

/// A transaction a bulk request left untouched, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTransaction {
    pub transaction_id: String,
    pub reason: String,
}

/// Result of a bulk request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BulkActionOutcome {
    pub affected_count: usize,
    pub skipped: Vec<SkippedTransaction>,
}

impl BulkActionOutcome {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Main reconciliation service
#[derive(Clone)]
pub struct ReconciliationService<S: ReconciliationStorage> {
    storage: S,
    matcher: ReconciliationMatcher,
    importer: StatementImporter,
}

impl<S: ReconciliationStorage> ReconciliationService<S> {
    /// Create a service with the default matcher configuration
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            matcher: ReconciliationMatcher::new(),
            importer: StatementImporter::new(),
        }
    }

    /// Create a service with a custom matcher configuration
    pub fn with_config(storage: S, config: MatcherConfig) -> ReconciliationResult<Self> {
        config.validate()?;
        Ok(Self {
            storage,
            matcher: ReconciliationMatcher::with_config(config),
            importer: StatementImporter::new(),
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn matcher(&self) -> &ReconciliationMatcher {
        &self.matcher
    }

    // Import operations
    /// Parse a statement for preview without importing it
    pub fn preview(&self, content: &str) -> ParsedStatement {
        parse_statement(content)
    }

    /// Parse, normalize and persist a statement as one import batch
    pub async fn import_statement(
        &self,
        content: &str,
        scope: &AccountScope,
    ) -> ReconciliationResult<ImportBatch> {
        let batch = self.importer.prepare(content, scope)?;
        let inserted = self.storage.insert_transactions(&batch.transactions).await?;

        tracing::info!(
            import_batch_id = %batch.id,
            organization_id = %scope.organization_id,
            bank_account_id = %scope.bank_account_id,
            transactions = inserted,
            warnings = batch.statement.errors.len(),
            "Imported bank statement"
        );
        Ok(batch)
    }

    /// Remove every transaction of an import, unless one is already reconciled
    pub async fn revert_import(&self, import_batch_id: &str) -> ReconciliationResult<usize> {
        let transactions = self.storage.list_batch_transactions(import_batch_id).await?;
        if transactions.is_empty() {
            return Err(ReconciliationError::ImportBatchNotFound(
                import_batch_id.to_string(),
            ));
        }
        if let Some(reconciled) = transactions
            .iter()
            .find(|t| t.status == TransactionStatus::Reconciled)
        {
            return Err(ReconciliationError::Validation(format!(
                "Import batch '{}' contains reconciled transaction '{}'",
                import_batch_id, reconciled.id
            )));
        }

        let removed = self.storage.delete_import_batch(import_batch_id).await?;
        tracing::info!(import_batch_id = %import_batch_id, removed, "Reverted import batch");
        Ok(removed)
    }

    // Matching operations
    /// Score the account's pending transactions against the organization's
    /// ledger and store new suggestions. Pairs that already have a match are
    /// left as they are; the open suggestions for the account are returned.
    pub async fn suggest_matches(
        &self,
        scope: &AccountScope,
    ) -> ReconciliationResult<Vec<ReconciliationMatch>> {
        crate::utils::validate_account_scope(scope)?;

        let pending = self
            .storage
            .list_transactions(scope, Some(TransactionStatus::Pending))
            .await?;
        let candidates = self
            .storage
            .list_ledger_candidates(&scope.organization_id)
            .await?;

        let mut inserted = 0;
        let mut suggestions = Vec::new();
        for proposal in self.matcher.suggest(&pending, &candidates) {
            let outcome = self.storage.upsert_suggestion(&proposal).await?;
            if outcome.is_inserted() {
                inserted += 1;
            }
            let stored = outcome.into_match();
            if stored.status == MatchStatus::Suggested {
                suggestions.push(stored);
            }
        }

        tracing::info!(
            organization_id = %scope.organization_id,
            bank_account_id = %scope.bank_account_id,
            pending = pending.len(),
            candidates = candidates.len(),
            inserted,
            suggested = suggestions.len(),
            "Suggested reconciliation matches"
        );
        Ok(suggestions)
    }

    /// List every match recorded against a transaction
    pub async fn list_matches(
        &self,
        transaction_id: &str,
    ) -> ReconciliationResult<Vec<ReconciliationMatch>> {
        self.storage.list_matches(transaction_id).await
    }

    // Lifecycle operations
    /// Approve a suggested match, reconciling its transaction
    pub async fn approve(
        &self,
        match_id: &str,
        approver_id: &str,
    ) -> ReconciliationResult<ReconciliationMatch> {
        validate_approver_id(approver_id)?;
        let suggestion = self.get_match_required(match_id).await?;

        let at = chrono::Utc::now().naive_utc();
        let id = match_id.to_string();
        let approver = approver_id.to_string();
        let result = self
            .storage
            .modify_transaction(&suggestion.transaction_id, move |scope| {
                transitions::approve(scope, &id, &approver, at)
            })
            .await;

        self.log_transition(TransitionAction::Approve, match_id, &result);
        result
    }

    /// Reject a suggested match
    pub async fn reject(&self, match_id: &str) -> ReconciliationResult<ReconciliationMatch> {
        let suggestion = self.get_match_required(match_id).await?;

        let at = chrono::Utc::now().naive_utc();
        let id = match_id.to_string();
        let result = self
            .storage
            .modify_transaction(&suggestion.transaction_id, move |scope| {
                transitions::reject(scope, &id, at)
            })
            .await;

        self.log_transition(TransitionAction::Reject, match_id, &result);
        result
    }

    /// Send a reconciled transaction back to pending
    pub async fn undo(&self, transaction_id: &str) -> ReconciliationResult<BankTransaction> {
        let at = chrono::Utc::now().naive_utc();
        let result = self
            .storage
            .modify_transaction(transaction_id, move |scope| transitions::undo(scope, at))
            .await;

        self.log_transition(TransitionAction::Undo, transaction_id, &result);
        result
    }

    /// Exclude a pending transaction from reconciliation
    pub async fn ignore(&self, transaction_id: &str) -> ReconciliationResult<BankTransaction> {
        let at = chrono::Utc::now().naive_utc();
        let result = self
            .storage
            .modify_transaction(transaction_id, move |scope| transitions::ignore(scope, at))
            .await;

        self.log_transition(TransitionAction::Ignore, transaction_id, &result);
        result
    }

    /// Apply one transition to many transactions.
    ///
    /// Each transaction is updated atomically on its own; transactions in an
    /// incompatible state or unknown to storage are skipped and reported.
    pub async fn bulk_action(
        &self,
        transaction_ids: &[String],
        action: &BulkAction,
    ) -> ReconciliationResult<BulkActionOutcome> {
        if let BulkAction::Confirm { approver_id } = action {
            validate_approver_id(approver_id)?;
        }

        let mut outcome = BulkActionOutcome::default();
        for transaction_id in dedupe_ids(transaction_ids)? {
            let at = chrono::Utc::now().naive_utc();
            let result = match action {
                BulkAction::Confirm { approver_id } => {
                    let approver = approver_id.clone();
                    self.storage
                        .modify_transaction(transaction_id, move |scope| {
                            transitions::approve_best(scope, &approver, at).map(|_| ())
                        })
                        .await
                }
                BulkAction::Reject => {
                    self.storage
                        .modify_transaction(transaction_id, move |scope| {
                            transitions::reject_open_suggestions(scope, at).map(|_| ())
                        })
                        .await
                }
                BulkAction::Unmatch => {
                    self.storage
                        .modify_transaction(transaction_id, move |scope| {
                            transitions::undo(scope, at).map(|_| ())
                        })
                        .await
                }
            };

            match result {
                Ok(()) => outcome.affected_count += 1,
                Err(
                    err @ (ReconciliationError::Conflict { .. }
                    | ReconciliationError::TransactionNotFound(_)),
                ) => {
                    tracing::warn!(
                        transaction_id = %transaction_id,
                        action = %action.transition(),
                        reason = %err,
                        "Skipped transaction in bulk action"
                    );
                    outcome.skipped.push(SkippedTransaction {
                        transaction_id: transaction_id.to_string(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        tracing::info!(
            action = %action.transition(),
            affected = outcome.affected_count,
            skipped = outcome.skipped_count(),
            "Applied bulk reconciliation action"
        );
        Ok(outcome)
    }

    async fn get_match_required(&self, match_id: &str) -> ReconciliationResult<ReconciliationMatch> {
        self.storage
            .get_match(match_id)
            .await?
            .ok_or_else(|| ReconciliationError::MatchNotFound(match_id.to_string()))
    }

    fn log_transition<T>(
        &self,
        action: TransitionAction,
        entity_id: &str,
        result: &ReconciliationResult<T>,
    ) {
        match result {
            Ok(_) => tracing::info!(%action, entity_id, "Reconciliation transition applied"),
            Err(err) if err.is_conflict() => {
                tracing::warn!(%action, entity_id, reason = %err, "Reconciliation conflict")
            }
            Err(err) => {
                tracing::warn!(%action, entity_id, error = %err, "Reconciliation transition failed")
            }
        }
    }
}
