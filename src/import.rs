//! Statement import: parsing plus normalization into ledger transactions

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::norma43::{parse_statement, ParsedStatement};
use crate::types::*;

/// Everything produced from one statement file, ready to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportBatch {
    /// Shared by every transaction in the batch
    pub id: String,
    pub scope: AccountScope,
    /// Parsed statement, kept for preview and for surfacing warnings
    pub statement: ParsedStatement,
    pub transactions: Vec<BankTransaction>,
    pub created_at: NaiveDateTime,
}

impl ImportBatch {
    /// Issues the person approving the import must see
    pub fn warnings(&self) -> Vec<String> {
        self.statement.error_messages()
    }
}

/// Map parsed records onto the ledger's bank transaction shape.
///
/// Only type coercion happens here. Every row gets `import_batch_id`, status
/// `pending`, and a running balance when the header provided an opening balance.
pub fn normalize_statement(
    statement: &ParsedStatement,
    scope: &AccountScope,
    import_batch_id: &str,
) -> Vec<BankTransaction> {
    let now = chrono::Utc::now().naive_utc();
    let mut running: Option<BigDecimal> = statement
        .header
        .as_ref()
        .map(|h| h.opening_balance.clone());

    statement
        .transactions
        .iter()
        .map(|record| {
            let balance = running.as_mut().map(|b| {
                *b += &record.amount;
                b.clone()
            });

            BankTransaction {
                id: uuid::Uuid::new_v4().to_string(),
                organization_id: scope.organization_id.clone(),
                bank_account_id: scope.bank_account_id.clone(),
                transaction_date: record.transaction_date,
                value_date: record.value_date,
                description: record.description.clone(),
                reference: record.external_reference(),
                amount: record.amount.clone(),
                balance,
                status: TransactionStatus::Pending,
                matched_entity: None,
                reconciliation_match_id: None,
                import_batch_id: import_batch_id.to_string(),
                created_at: now,
                updated_at: now,
            }
        })
        .collect()
}

/// Turns statement files into import batches without writing anything
#[derive(Debug, Clone, Default)]
pub struct StatementImporter;

impl StatementImporter {
    pub fn new() -> Self {
        Self
    }

    /// Parse and normalize one file.
    ///
    /// Statements with warnings are accepted; a statement whose structure is
    /// broken and that yielded no transactions is refused.
    pub fn prepare(&self, content: &str, scope: &AccountScope) -> ReconciliationResult<ImportBatch> {
        crate::utils::validate_account_scope(scope)?;

        let statement = parse_statement(content);
        if !statement.is_importable() {
            return Err(ReconciliationError::ImportBlocked(
                statement.error_messages().join("; "),
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let transactions = normalize_statement(&statement, scope, &id);

        Ok(ImportBatch {
            id,
            scope: scope.clone(),
            statement,
            transactions,
            created_at: chrono::Utc::now().naive_utc(),
        })
    }
}
