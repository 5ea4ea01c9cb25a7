//! Import a Norma 43 statement and reconcile it against the ledger

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use reconciliation_core::utils::MemoryStorage;
use reconciliation_core::{
    AccountScope, BulkAction, LedgerCandidate, MatchType, ReconciliationService,
    ReconciliationStorage, TransactionStatus,
};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

const STATEMENT: &str = "\
112100031801234567892501012501312000000001000009783EMPRESA DEMO SL              
22    0318250115250115990022000000000150000000012345REF-0001    FRA-001         
2301PAGO CLIENTE ACME                     FRA-001                               
22    0318250120250120990021000000000050000000012346REF-0002                    
2301RECIBO LUZ                                                                  
8821000318012345678900001000000000050000000100000000015000200000000110000978    ";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("🏦 Reconciliation Core - Import and Reconcile Example\n");

    // Seed the ledger with what the accountant already booked
    let storage = MemoryStorage::new();
    storage.add_ledger_candidate(
        LedgerCandidate::new(
            "inv-1",
            MatchType::Invoice,
            "org-1",
            NaiveDate::from_ymd_opt(2025, 1, 15).ok_or("invalid date")?,
            "ACME invoice FRA-001",
        )
        .with_credit(BigDecimal::from_str("150.00")?),
    )?;
    storage.add_ledger_candidate(
        LedgerCandidate::new(
            "entry-9",
            MatchType::Entry,
            "org-1",
            NaiveDate::from_ymd_opt(2025, 1, 21).ok_or("invalid date")?,
            "Electricidad enero",
        )
        .with_debit(BigDecimal::from_str("50.00")?),
    )?;

    let service = ReconciliationService::new(storage);
    let scope = AccountScope::new("org-1", "bank-1");

    // 1. Preview and import
    println!("📄 Previewing statement...");
    let preview = service.preview(STATEMENT);
    if let Some(header) = &preview.header {
        println!(
            "  Account {}-{}-{} ({} to {})",
            header.bank_code, header.office_code, header.account_number, header.start_date,
            header.end_date
        );
        println!(
            "  Opening {} / closing {}",
            header.opening_balance, header.closing_balance
        );
    }
    for issue in &preview.errors {
        println!("  ⚠ {}", issue);
    }

    let batch = service.import_statement(STATEMENT, &scope).await?;
    println!("  ✓ Imported batch {}", batch.id);
    for tx in &batch.transactions {
        println!(
            "    {} {:>10} {}",
            tx.transaction_date, tx.amount, tx.description
        );
    }
    println!();

    // 2. Suggest matches
    println!("🔍 Suggesting matches...");
    let suggestions = service.suggest_matches(&scope).await?;
    for suggestion in &suggestions {
        println!(
            "  {} -> {} {} (confidence {})",
            suggestion.transaction_id,
            suggestion.match_type,
            suggestion.matched_entity_id,
            suggestion.confidence
        );
    }
    println!();

    // 3. Confirm everything in one go
    println!("✅ Confirming suggestions...");
    let ids: Vec<String> = batch.transactions.iter().map(|t| t.id.clone()).collect();
    let outcome = service
        .bulk_action(
            &ids,
            &BulkAction::Confirm {
                approver_id: "demo-user".to_string(),
            },
        )
        .await?;
    println!(
        "  Reconciled {} transaction(s), skipped {}",
        outcome.affected_count,
        outcome.skipped_count()
    );

    // 4. Undo one of them
    if let Some(first) = ids.first() {
        service.undo(first).await?;
        println!("  ↩ Sent {} back to pending", first);
    }

    let pending = service
        .storage()
        .list_transactions(&scope, Some(TransactionStatus::Pending))
        .await?;
    println!("\n📊 {} transaction(s) still pending", pending.len());

    Ok(())
}
