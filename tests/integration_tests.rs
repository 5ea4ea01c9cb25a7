//! Integration tests for reconciliation-core

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use reconciliation_core::{
    is_valid_format, parse_statement, utils::MemoryStorage, AccountScope, BulkAction,
    LedgerCandidate, MatchStatus, MatchType, MatcherConfig, MatchingRule, ReconciliationError,
    ReconciliationMatch, ReconciliationService, ReconciliationStorage, TransactionStatus,
};
use std::str::FromStr;

const HEADER: &str =
    "112100031801234567892501012501312000000001000009783EMPRESA DEMO SL              ";
const CREDIT_150: &str =
    "22    0318250115250115990022000000000150000000012345REF-0001    FRA-001         ";
const CREDIT_150_CONCEPT: &str =
    "2301PAGO CLIENTE ACME                     FRA-001                               ";
const DEBIT_50: &str =
    "22    0318250120250120990021000000000050000000012346REF-0002                    ";
const DEBIT_50_CONCEPT: &str =
    "2301RECIBO LUZ                                                                  ";
const FOOTER: &str =
    "8821000318012345678900001000000000050000000100000000015000200000000110000978    ";
/// Claims two credits totalling 300.00 and a final balance of 1250.00
const MISMATCHED_FOOTER: &str =
    "8821000318012345678900001000000000050000000200000000030000200000000125000978    ";

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn statement(footer: &str) -> String {
    [
        HEADER,
        CREDIT_150,
        CREDIT_150_CONCEPT,
        DEBIT_50,
        DEBIT_50_CONCEPT,
        footer,
    ]
    .join("\r\n")
}

fn scope() -> AccountScope {
    AccountScope::new("org-1", "bank-1")
}

/// Storage seeded with an invoice and two journal entries for `org-1`, plus
/// one entry belonging to another organization
fn seeded_storage() -> MemoryStorage {
    let storage = MemoryStorage::new();
    storage
        .add_ledger_candidate(
            LedgerCandidate::new(
                "inv-1",
                MatchType::Invoice,
                "org-1",
                date(2025, 1, 15),
                "ACME invoice FRA-001",
            )
            .with_credit(dec("150.00")),
        )
        .unwrap();
    storage
        .add_ledger_candidate(
            LedgerCandidate::new(
                "entry-2",
                MatchType::Entry,
                "org-1",
                date(2025, 1, 16),
                "Otro cobro",
            )
            .with_credit(dec("150.00")),
        )
        .unwrap();
    storage
        .add_ledger_candidate(
            LedgerCandidate::new(
                "entry-9",
                MatchType::Entry,
                "org-1",
                date(2025, 1, 21),
                "Electricidad enero",
            )
            .with_debit(dec("50.00")),
        )
        .unwrap();
    storage
        .add_ledger_candidate(
            LedgerCandidate::new(
                "foreign",
                MatchType::Entry,
                "org-2",
                date(2025, 1, 15),
                "ACME invoice FRA-001",
            )
            .with_credit(dec("150.00")),
        )
        .unwrap();
    storage
}

fn find<'a>(matches: &'a [ReconciliationMatch], entity_id: &str) -> &'a ReconciliationMatch {
    matches
        .iter()
        .find(|m| m.matched_entity_id == entity_id)
        .unwrap_or_else(|| panic!("no match for {}", entity_id))
}

#[tokio::test]
async fn test_complete_reconciliation_workflow() {
    let service = ReconciliationService::new(seeded_storage());
    let content = statement(FOOTER);
    assert!(is_valid_format(&content));

    // Import the statement
    let batch = service.import_statement(&content, &scope()).await.unwrap();
    assert!(batch.warnings().is_empty(), "{:?}", batch.warnings());
    assert_eq!(batch.transactions.len(), 2);

    let credit = &batch.transactions[0];
    let debit = &batch.transactions[1];
    assert_eq!(credit.amount, dec("150.00"));
    assert_eq!(credit.description, "PAGO CLIENTE ACME FRA-001");
    assert_eq!(credit.reference.as_deref(), Some("REF-0001"));
    assert_eq!(credit.balance, Some(dec("1150.00")));
    assert_eq!(debit.amount, dec("-50.00"));
    assert_eq!(debit.balance, Some(dec("1100.00")));

    // Suggest matches
    let suggestions = service.suggest_matches(&scope()).await.unwrap();
    assert_eq!(suggestions.len(), 3);
    assert!(suggestions.iter().all(|m| m.matched_entity_id != "foreign"));

    let invoice = find(&suggestions, "inv-1");
    assert_eq!(invoice.transaction_id, credit.id);
    assert_eq!(invoice.match_type, MatchType::Invoice);
    assert_eq!(invoice.confidence, BigDecimal::from(1));
    assert_eq!(
        invoice.matching_rules,
        vec![
            MatchingRule::ExactAmount,
            MatchingRule::DateProximity,
            MatchingRule::DescriptionMatch
        ]
    );
    assert_eq!(find(&suggestions, "entry-2").confidence, dec("0.8"));
    assert_eq!(find(&suggestions, "entry-9").transaction_id, debit.id);

    // Approve the invoice match
    let approved = service.approve(&invoice.id, "alice").await.unwrap();
    assert_eq!(approved.status, MatchStatus::Approved);
    assert_eq!(approved.approved_by.as_deref(), Some("alice"));

    let reconciled = service
        .storage()
        .get_transaction(&credit.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reconciled.status, TransactionStatus::Reconciled);
    assert_eq!(reconciled.reconciliation_match_id.as_deref(), Some(invoice.id.as_str()));
    let entity = reconciled.matched_entity.unwrap();
    assert_eq!(entity.kind, MatchType::Invoice);
    assert_eq!(entity.id, "inv-1");

    // A competing suggestion for the same transaction can no longer be approved
    let competing = find(&suggestions, "entry-2");
    let err = service.approve(&competing.id, "bob").await.unwrap_err();
    assert!(err.is_conflict(), "{}", err);

    // Undo sends the transaction back to pending and keeps the approval for audit
    let pending = service.undo(&credit.id).await.unwrap();
    assert_eq!(pending.status, TransactionStatus::Pending);
    assert!(pending.matched_entity.is_none());

    let history = service.list_matches(&credit.id).await.unwrap();
    let kept = find(&history, "inv-1");
    assert_eq!(kept.status, MatchStatus::Approved);
    assert!(kept.undone_at.is_some());

    // The competing suggestion is approvable again
    service.approve(&competing.id, "bob").await.unwrap();
}

#[tokio::test]
async fn test_suggest_matches_is_idempotent() {
    let service = ReconciliationService::new(seeded_storage());
    let batch = service
        .import_statement(&statement(FOOTER), &scope())
        .await
        .unwrap();

    let first = service.suggest_matches(&scope()).await.unwrap();
    let second = service.suggest_matches(&scope()).await.unwrap();

    let mut first_ids: Vec<_> = first.iter().map(|m| m.id.clone()).collect();
    let mut second_ids: Vec<_> = second.iter().map(|m| m.id.clone()).collect();
    first_ids.sort();
    second_ids.sort();
    assert_eq!(first_ids, second_ids);

    let stored = service
        .list_matches(&batch.transactions[0].id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_suggest_skips_resolved_pairs() {
    let service = ReconciliationService::new(seeded_storage());
    service
        .import_statement(&statement(FOOTER), &scope())
        .await
        .unwrap();

    let suggestions = service.suggest_matches(&scope()).await.unwrap();
    service
        .reject(&find(&suggestions, "entry-2").id)
        .await
        .unwrap();
    service
        .approve(&find(&suggestions, "entry-9").id, "alice")
        .await
        .unwrap();

    // Rejected pairs are not proposed again and reconciled transactions are skipped
    let again = service.suggest_matches(&scope()).await.unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].matched_entity_id, "inv-1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approvals_have_one_winner() {
    let service = ReconciliationService::new(seeded_storage());
    service
        .import_statement(&statement(FOOTER), &scope())
        .await
        .unwrap();
    let suggestions = service.suggest_matches(&scope()).await.unwrap();
    let invoice_id = find(&suggestions, "inv-1").id.clone();
    let entry_id = find(&suggestions, "entry-2").id.clone();

    let first = {
        let service = service.clone();
        tokio::spawn(async move { service.approve(&invoice_id, "alice").await })
    };
    let second = {
        let service = service.clone();
        tokio::spawn(async move { service.approve(&entry_id, "bob").await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(ReconciliationError::is_conflict));

    let transaction_id = &find(&suggestions, "inv-1").transaction_id;
    let approvals = service
        .list_matches(transaction_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.is_active_approval())
        .count();
    assert_eq!(approvals, 1);
}

#[tokio::test]
async fn test_bulk_actions_report_skips() {
    let service = ReconciliationService::new(seeded_storage());
    let batch = service
        .import_statement(&statement(FOOTER), &scope())
        .await
        .unwrap();
    service.suggest_matches(&scope()).await.unwrap();

    let credit_id = batch.transactions[0].id.clone();
    let debit_id = batch.transactions[1].id.clone();
    let ids = vec![
        credit_id.clone(),
        debit_id.clone(),
        credit_id.clone(),
        "ghost".to_string(),
    ];

    let confirm = BulkAction::Confirm {
        approver_id: "alice".to_string(),
    };
    let outcome = service.bulk_action(&ids, &confirm).await.unwrap();
    assert_eq!(outcome.affected_count, 2);
    assert_eq!(outcome.skipped_count(), 1);
    assert_eq!(outcome.skipped[0].transaction_id, "ghost");

    // The credit picked its best suggestion
    let credit = service
        .storage()
        .get_transaction(&credit_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(credit.matched_entity.unwrap().id, "inv-1");

    // Confirming again conflicts on both
    let outcome = service.bulk_action(&ids, &confirm).await.unwrap();
    assert_eq!(outcome.affected_count, 0);
    assert_eq!(outcome.skipped_count(), 3);

    let outcome = service
        .bulk_action(&ids, &BulkAction::Unmatch)
        .await
        .unwrap();
    assert_eq!(outcome.affected_count, 2);

    // Only the credit still has an open suggestion (entry-2)
    let outcome = service
        .bulk_action(&ids, &BulkAction::Reject)
        .await
        .unwrap();
    assert_eq!(outcome.affected_count, 1);
    assert_eq!(outcome.skipped_count(), 2);
}

#[tokio::test]
async fn test_bulk_action_validates_input() {
    let service = ReconciliationService::new(MemoryStorage::new());

    let err = service
        .bulk_action(
            &["tx-1".to_string()],
            &BulkAction::Confirm {
                approver_id: " ".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ReconciliationError::Validation(_)));

    let outcome = service
        .bulk_action(&[], &BulkAction::Reject)
        .await
        .unwrap();
    assert_eq!(outcome.affected_count, 0);
    assert_eq!(outcome.skipped_count(), 0);

    let action: BulkAction =
        serde_json::from_str(r#"{"action":"confirm","approver_id":"alice"}"#).unwrap();
    assert_eq!(
        action,
        BulkAction::Confirm {
            approver_id: "alice".to_string()
        }
    );
}

#[tokio::test]
async fn test_revert_import() {
    let service = ReconciliationService::new(seeded_storage());
    let batch = service
        .import_statement(&statement(FOOTER), &scope())
        .await
        .unwrap();
    let suggestions = service.suggest_matches(&scope()).await.unwrap();
    service
        .approve(&find(&suggestions, "inv-1").id, "alice")
        .await
        .unwrap();

    // Refused while a transaction is reconciled
    let err = service.revert_import(&batch.id).await.unwrap_err();
    assert!(matches!(err, ReconciliationError::Validation(_)));

    service.undo(&batch.transactions[0].id).await.unwrap();
    assert_eq!(service.revert_import(&batch.id).await.unwrap(), 2);

    let remaining = service
        .storage()
        .list_transactions(&scope(), None)
        .await
        .unwrap();
    assert!(remaining.is_empty());
    assert_eq!(
        service.revert_import(&batch.id).await.unwrap_err(),
        ReconciliationError::ImportBatchNotFound(batch.id.clone())
    );
}

#[tokio::test]
async fn test_transaction_state_conflicts() {
    let service = ReconciliationService::new(seeded_storage());
    let batch = service
        .import_statement(&statement(FOOTER), &scope())
        .await
        .unwrap();
    let debit_id = &batch.transactions[1].id;

    // Undo requires a reconciled transaction
    let err = service.undo(debit_id).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("Conflict: cannot undo '{}' while it is pending", debit_id)
    );

    // Ignored transactions drop out of matching
    let ignored = service.ignore(debit_id).await.unwrap();
    assert_eq!(ignored.status, TransactionStatus::Ignored);
    assert!(service.ignore(debit_id).await.unwrap_err().is_conflict());

    let suggestions = service.suggest_matches(&scope()).await.unwrap();
    assert!(suggestions.iter().all(|m| &m.transaction_id != debit_id));

    assert_eq!(
        service.undo("ghost").await.unwrap_err(),
        ReconciliationError::TransactionNotFound("ghost".to_string())
    );
    assert_eq!(
        service.approve("ghost", "alice").await.unwrap_err(),
        ReconciliationError::MatchNotFound("ghost".to_string())
    );
}

#[tokio::test]
async fn test_import_with_warnings_and_blocked_import() {
    let service = ReconciliationService::new(MemoryStorage::new());

    // Footer totals disagree: imported, but every discrepancy is reported
    let content = statement(MISMATCHED_FOOTER);
    let preview = service.preview(&content);
    assert_eq!(preview.transactions.len(), 2);
    assert!(preview.has_issue_containing("Total de movimientos no coincide"));
    assert!(preview.has_issue_containing("Total de abonos no coincide"));
    assert!(preview.has_issue_containing("Saldo final no coincide"));
    assert!(!preview.has_issue_containing("Total de cargos no coincide"));

    let batch = service.import_statement(&content, &scope()).await.unwrap();
    assert_eq!(batch.transactions.len(), 2);
    assert_eq!(batch.warnings().len(), 3);

    // No header means nothing to import
    let headless = [CREDIT_150, FOOTER].join("\n");
    let err = service
        .import_statement(&headless, &scope())
        .await
        .unwrap_err();
    assert!(matches!(err, ReconciliationError::ImportBlocked(_)));

    let err = service
        .import_statement(&content, &AccountScope::new("", "bank-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconciliationError::Validation(_)));
}

#[tokio::test]
async fn test_parse_statement_without_storage() {
    let parsed = parse_statement(&statement(FOOTER));
    let header = parsed.header.as_ref().unwrap();

    assert_eq!(header.bank_code, "2100");
    assert_eq!(header.account_number, "0123456789");
    assert_eq!(header.opening_balance, dec("1000.00"));
    assert_eq!(header.closing_balance, dec("1100.00"));
    assert_eq!(header.currency_code, "978");
    assert_eq!(header.account_name.as_deref(), Some("EMPRESA DEMO SL"));
    assert_eq!(parsed.summary.transactions_count, 2);
    assert!(parsed.errors.is_empty());
    assert!(!is_valid_format(CREDIT_150));
}

#[tokio::test]
async fn test_custom_matcher_config() {
    let invalid = MatcherConfig {
        suggestion_threshold: dec("1.5"),
        ..MatcherConfig::default()
    };
    assert!(matches!(
        ReconciliationService::with_config(MemoryStorage::new(), invalid),
        Err(ReconciliationError::Validation(_))
    ));

    let strict = MatcherConfig {
        suggestion_threshold: dec("0.9"),
        ..MatcherConfig::default()
    };
    let service = ReconciliationService::with_config(seeded_storage(), strict).unwrap();
    service
        .import_statement(&statement(FOOTER), &scope())
        .await
        .unwrap();

    let suggestions = service.suggest_matches(&scope()).await.unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].matched_entity_id, "inv-1");
}
