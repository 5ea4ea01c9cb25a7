//! Match and transaction state transitions
//!
//! Pure functions over a [`ReconciliationScope`]. Storage runs them inside its
//! own atomic read-modify-write, so the precondition checks here are re-done
//! against the current stored state on every call.
//!
//! ```text
//! match:        suggested ──► approved
//!                   └──────► rejected
//! transaction:  pending ◄──► reconciled
//!                   └──────► ignored
//! ```

use chrono::NaiveDateTime;

use crate::traits::ReconciliationScope;
use crate::types::*;

fn match_index(scope: &ReconciliationScope, match_id: &str) -> ReconciliationResult<usize> {
    scope
        .matches
        .iter()
        .position(|m| m.id == match_id)
        .ok_or_else(|| ReconciliationError::MatchNotFound(match_id.to_string()))
}

/// Approve a suggested match and reconcile its transaction
pub fn approve(
    scope: &mut ReconciliationScope,
    match_id: &str,
    approver_id: &str,
    at: NaiveDateTime,
) -> ReconciliationResult<ReconciliationMatch> {
    let index = match_index(scope, match_id)?;

    let status = scope.matches[index].status;
    if status != MatchStatus::Suggested {
        return Err(ReconciliationError::conflict(
            TransitionAction::Approve,
            match_id,
            status,
        ));
    }
    if scope.transaction.status != TransactionStatus::Pending {
        return Err(ReconciliationError::conflict(
            TransitionAction::Approve,
            &scope.transaction.id,
            scope.transaction.status,
        ));
    }
    if let Some(active) = scope.active_approval() {
        return Err(ReconciliationError::conflict(
            TransitionAction::Approve,
            &scope.transaction.id,
            format!("linked to match '{}'", active.id),
        ));
    }

    let approved = &mut scope.matches[index];
    approved.status = MatchStatus::Approved;
    approved.approved_by = Some(approver_id.to_string());
    approved.approved_at = Some(at);
    approved.updated_at = at;

    let transaction = &mut scope.transaction;
    transaction.status = TransactionStatus::Reconciled;
    transaction.matched_entity = Some(MatchedEntity {
        kind: approved.match_type,
        id: approved.matched_entity_id.clone(),
    });
    transaction.reconciliation_match_id = Some(approved.id.clone());
    transaction.updated_at = at;

    Ok(approved.clone())
}

/// Approve the highest-confidence open suggestion of a pending transaction
pub fn approve_best(
    scope: &mut ReconciliationScope,
    approver_id: &str,
    at: NaiveDateTime,
) -> ReconciliationResult<ReconciliationMatch> {
    if scope.transaction.status != TransactionStatus::Pending {
        return Err(ReconciliationError::conflict(
            TransitionAction::Approve,
            &scope.transaction.id,
            scope.transaction.status,
        ));
    }
    let best = scope
        .open_suggestions()
        .first()
        .map(|m| m.id.clone())
        .ok_or_else(|| {
            ReconciliationError::conflict(
                TransitionAction::Approve,
                &scope.transaction.id,
                "without suggestions",
            )
        })?;
    approve(scope, &best, approver_id, at)
}

/// Reject a suggested match; the transaction stays as it is
pub fn reject(
    scope: &mut ReconciliationScope,
    match_id: &str,
    at: NaiveDateTime,
) -> ReconciliationResult<ReconciliationMatch> {
    let index = match_index(scope, match_id)?;

    let rejected = &mut scope.matches[index];
    if rejected.status != MatchStatus::Suggested {
        return Err(ReconciliationError::conflict(
            TransitionAction::Reject,
            match_id,
            rejected.status,
        ));
    }
    rejected.status = MatchStatus::Rejected;
    rejected.updated_at = at;

    Ok(rejected.clone())
}

/// Reject every open suggestion of a pending transaction, returning how many
/// were rejected
pub fn reject_open_suggestions(
    scope: &mut ReconciliationScope,
    at: NaiveDateTime,
) -> ReconciliationResult<usize> {
    if scope.transaction.status != TransactionStatus::Pending {
        return Err(ReconciliationError::conflict(
            TransitionAction::Reject,
            &scope.transaction.id,
            scope.transaction.status,
        ));
    }

    let mut rejected = 0;
    for m in scope
        .matches
        .iter_mut()
        .filter(|m| m.status == MatchStatus::Suggested)
    {
        m.status = MatchStatus::Rejected;
        m.updated_at = at;
        rejected += 1;
    }

    if rejected == 0 {
        return Err(ReconciliationError::conflict(
            TransitionAction::Reject,
            &scope.transaction.id,
            "without suggestions",
        ));
    }
    Ok(rejected)
}

/// Send a reconciled transaction back to pending. The approved match is kept
/// for audit and stamped as undone.
pub fn undo(
    scope: &mut ReconciliationScope,
    at: NaiveDateTime,
) -> ReconciliationResult<BankTransaction> {
    if scope.transaction.status != TransactionStatus::Reconciled {
        return Err(ReconciliationError::conflict(
            TransitionAction::Undo,
            &scope.transaction.id,
            scope.transaction.status,
        ));
    }

    for m in scope.matches.iter_mut().filter(|m| m.is_active_approval()) {
        m.undone_at = Some(at);
        m.updated_at = at;
    }

    let transaction = &mut scope.transaction;
    transaction.status = TransactionStatus::Pending;
    transaction.matched_entity = None;
    transaction.reconciliation_match_id = None;
    transaction.updated_at = at;

    Ok(transaction.clone())
}

/// Exclude a pending transaction from reconciliation
pub fn ignore(
    scope: &mut ReconciliationScope,
    at: NaiveDateTime,
) -> ReconciliationResult<BankTransaction> {
    let transaction = &mut scope.transaction;
    if transaction.status != TransactionStatus::Pending {
        return Err(ReconciliationError::conflict(
            TransitionAction::Ignore,
            &transaction.id,
            transaction.status,
        ));
    }
    transaction.status = TransactionStatus::Ignored;
    transaction.updated_at = at;

    Ok(transaction.clone())
}
