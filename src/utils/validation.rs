//! Validation utilities

use std::collections::HashSet;

use crate::types::*;

/// Validate that an identifier is usable as a storage key
pub fn validate_id(kind: &str, id: &str) -> ReconciliationResult<()> {
    if id.trim().is_empty() {
        return Err(ReconciliationError::Validation(format!(
            "{} cannot be empty",
            kind
        )));
    }

    if id.len() > 64 {
        return Err(ReconciliationError::Validation(format!(
            "{} cannot exceed 64 characters",
            kind
        )));
    }

    Ok(())
}

/// Validate the organization/bank account pair of an import or matching run
pub fn validate_account_scope(scope: &AccountScope) -> ReconciliationResult<()> {
    validate_id("Organization ID", &scope.organization_id)?;
    validate_id("Bank account ID", &scope.bank_account_id)
}

/// Validate the identity recorded on approved matches
pub fn validate_approver_id(approver_id: &str) -> ReconciliationResult<()> {
    validate_id("Approver ID", approver_id)
}

/// Validate the ids of a bulk request and drop repeats, keeping first-seen order
pub fn dedupe_ids(ids: &[String]) -> ReconciliationResult<Vec<&str>> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        validate_id("Transaction ID", id)?;
        if seen.insert(id.as_str()) {
            unique.push(id.as_str());
        }
    }
    Ok(unique)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("Approver ID", "alice").is_ok());
        assert!(validate_id("Approver ID", "  ").is_err());
        assert!(validate_id("Approver ID", &"x".repeat(65)).is_err());
    }

    #[test]
    fn test_dedupe_keeps_order() {
        let ids = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(dedupe_ids(&ids).unwrap(), vec!["b", "a"]);
        assert!(dedupe_ids(&["".to_string()]).is_err());
        assert!(dedupe_ids(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_account_scope() {
        assert!(validate_account_scope(&AccountScope::new("org", "bank")).is_ok());
        assert!(matches!(
            validate_account_scope(&AccountScope::new("org", "")),
            Err(ReconciliationError::Validation(msg)) if msg == "Bank account ID cannot be empty"
        ));
    }
}
