//! In-memory storage implementation for testing

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct StorageState {
    transactions: HashMap<String, BankTransaction>,
    transaction_order: Vec<String>,
    matches: HashMap<String, ReconciliationMatch>,
    match_order: Vec<String>,
    candidates: Vec<LedgerCandidate>,
}

impl StorageState {
    fn matches_of(&self, transaction_id: &str) -> Vec<ReconciliationMatch> {
        self.match_order
            .iter()
            .filter_map(|id| self.matches.get(id))
            .filter(|m| m.transaction_id == transaction_id)
            .cloned()
            .collect()
    }
}

/// In-memory storage implementation for testing and development.
///
/// All clones share one state behind a single lock, so every
/// `modify_transaction` call is serialized and atomic.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    state: Arc<RwLock<StorageState>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StorageState::default())),
        }
    }

    /// Register a ledger entry or invoice that matching may propose
    pub fn add_ledger_candidate(&self, candidate: LedgerCandidate) -> ReconciliationResult<()> {
        self.write()?.candidates.push(candidate);
        Ok(())
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> ReconciliationResult<()> {
        *self.write()? = StorageState::default();
        Ok(())
    }

    fn read(&self) -> ReconciliationResult<RwLockReadGuard<'_, StorageState>> {
        self.state
            .read()
            .map_err(|_| ReconciliationError::Storage("memory storage lock poisoned".to_string()))
    }

    fn write(&self) -> ReconciliationResult<RwLockWriteGuard<'_, StorageState>> {
        self.state
            .write()
            .map_err(|_| ReconciliationError::Storage("memory storage lock poisoned".to_string()))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReconciliationStorage for MemoryStorage {
    async fn insert_transactions(
        &self,
        transactions: &[BankTransaction],
    ) -> ReconciliationResult<usize> {
        let mut state = self.write()?;
        if let Some(duplicate) = transactions
            .iter()
            .find(|t| state.transactions.contains_key(&t.id))
        {
            return Err(ReconciliationError::Storage(format!(
                "Transaction '{}' already exists",
                duplicate.id
            )));
        }

        for transaction in transactions {
            state.transaction_order.push(transaction.id.clone());
            state
                .transactions
                .insert(transaction.id.clone(), transaction.clone());
        }
        Ok(transactions.len())
    }

    async fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> ReconciliationResult<Option<BankTransaction>> {
        Ok(self.read()?.transactions.get(transaction_id).cloned())
    }

    async fn list_transactions(
        &self,
        scope: &AccountScope,
        status: Option<TransactionStatus>,
    ) -> ReconciliationResult<Vec<BankTransaction>> {
        let state = self.read()?;
        let filtered = state
            .transaction_order
            .iter()
            .filter_map(|id| state.transactions.get(id))
            .filter(|t| {
                t.organization_id == scope.organization_id
                    && t.bank_account_id == scope.bank_account_id
                    && status.map_or(true, |s| t.status == s)
            })
            .cloned()
            .collect();
        Ok(filtered)
    }

    async fn list_batch_transactions(
        &self,
        import_batch_id: &str,
    ) -> ReconciliationResult<Vec<BankTransaction>> {
        let state = self.read()?;
        let filtered = state
            .transaction_order
            .iter()
            .filter_map(|id| state.transactions.get(id))
            .filter(|t| t.import_batch_id == import_batch_id)
            .cloned()
            .collect();
        Ok(filtered)
    }

    async fn delete_import_batch(&self, import_batch_id: &str) -> ReconciliationResult<usize> {
        let mut state = self.write()?;

        let doomed: HashSet<String> = state
            .transactions
            .values()
            .filter(|t| t.import_batch_id == import_batch_id)
            .map(|t| t.id.clone())
            .collect();
        if doomed.is_empty() {
            return Err(ReconciliationError::ImportBatchNotFound(
                import_batch_id.to_string(),
            ));
        }
        if let Some(reconciled) = doomed
            .iter()
            .filter_map(|id| state.transactions.get(id))
            .find(|t| t.status == TransactionStatus::Reconciled)
        {
            return Err(ReconciliationError::Validation(format!(
                "Import batch '{}' contains reconciled transaction '{}'",
                import_batch_id, reconciled.id
            )));
        }

        state.transactions.retain(|id, _| !doomed.contains(id));
        state.transaction_order.retain(|id| !doomed.contains(id));
        state
            .matches
            .retain(|_, m| !doomed.contains(&m.transaction_id));
        let StorageState {
            matches,
            match_order,
            ..
        } = &mut *state;
        match_order.retain(|id| matches.contains_key(id));

        Ok(doomed.len())
    }

    async fn list_ledger_candidates(
        &self,
        organization_id: &str,
    ) -> ReconciliationResult<Vec<LedgerCandidate>> {
        Ok(self
            .read()?
            .candidates
            .iter()
            .filter(|c| c.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn upsert_suggestion(
        &self,
        suggestion: &ReconciliationMatch,
    ) -> ReconciliationResult<UpsertOutcome> {
        let mut state = self.write()?;

        if let Some(existing) = state
            .matches
            .values()
            .find(|m| m.pair_key() == suggestion.pair_key())
        {
            return Ok(UpsertOutcome::Existing(existing.clone()));
        }
        if !state.transactions.contains_key(&suggestion.transaction_id) {
            return Err(ReconciliationError::TransactionNotFound(
                suggestion.transaction_id.clone(),
            ));
        }

        state.match_order.push(suggestion.id.clone());
        state
            .matches
            .insert(suggestion.id.clone(), suggestion.clone());
        Ok(UpsertOutcome::Inserted(suggestion.clone()))
    }

    async fn get_match(&self, match_id: &str) -> ReconciliationResult<Option<ReconciliationMatch>> {
        Ok(self.read()?.matches.get(match_id).cloned())
    }

    async fn list_matches(
        &self,
        transaction_id: &str,
    ) -> ReconciliationResult<Vec<ReconciliationMatch>> {
        Ok(self.read()?.matches_of(transaction_id))
    }

    async fn modify_transaction<T, F>(
        &self,
        transaction_id: &str,
        apply: F,
    ) -> ReconciliationResult<T>
    where
        T: Send,
        F: FnOnce(&mut ReconciliationScope) -> ReconciliationResult<T> + Send,
    {
        let mut state = self.write()?;

        let transaction = state
            .transactions
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| ReconciliationError::TransactionNotFound(transaction_id.to_string()))?;
        let mut scope = ReconciliationScope {
            transaction,
            matches: state.matches_of(transaction_id),
        };

        let value = apply(&mut scope)?;

        state
            .transactions
            .insert(scope.transaction.id.clone(), scope.transaction);
        for m in scope.matches {
            state.matches.insert(m.id.clone(), m);
        }
        Ok(value)
    }
}
