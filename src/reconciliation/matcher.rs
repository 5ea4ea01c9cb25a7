//! Weighted confidence scoring between bank transactions and ledger candidates

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::*;

/// Tunable weights and thresholds for the matcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Weight of [`MatchingRule::ExactAmount`]
    pub exact_amount_weight: BigDecimal,
    /// Weight of [`MatchingRule::DateProximity`]
    pub date_proximity_weight: BigDecimal,
    /// Weight of [`MatchingRule::DescriptionMatch`]
    pub description_weight: BigDecimal,
    /// Amounts closer than this are considered equal
    pub amount_tolerance: BigDecimal,
    /// Largest day difference still counted as close
    pub date_window_days: i64,
    /// Minimum accumulated score for a pair to be suggested
    pub suggestion_threshold: BigDecimal,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            exact_amount_weight: decimal("0.5"),
            date_proximity_weight: decimal("0.3"),
            description_weight: decimal("0.2"),
            amount_tolerance: decimal("0.01"),
            date_window_days: 3,
            suggestion_threshold: decimal("0.5"),
        }
    }
}

impl MatcherConfig {
    /// Reject settings that would make every or no pair match
    pub fn validate(&self) -> ReconciliationResult<()> {
        let zero = BigDecimal::from(0);
        let weights = [
            &self.exact_amount_weight,
            &self.date_proximity_weight,
            &self.description_weight,
        ];
        if weights.iter().any(|w| **w < zero) {
            return Err(ReconciliationError::Validation(
                "Matching rule weights cannot be negative".to_string(),
            ));
        }
        if self.amount_tolerance <= zero {
            return Err(ReconciliationError::Validation(
                "Amount tolerance must be positive".to_string(),
            ));
        }
        if self.date_window_days < 0 {
            return Err(ReconciliationError::Validation(
                "Date window cannot be negative".to_string(),
            ));
        }
        if self.suggestion_threshold <= zero || self.suggestion_threshold > BigDecimal::from(1) {
            return Err(ReconciliationError::Validation(
                "Suggestion threshold must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

fn decimal(value: &str) -> BigDecimal {
    // Only called with literals above
    BigDecimal::from_str(value).unwrap_or_default()
}

/// Score of a single (transaction, candidate) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    /// Accumulated weight, capped at 1
    pub confidence: BigDecimal,
    /// Rules that fired, in evaluation order
    pub rules: Vec<MatchingRule>,
}

/// Scores pending transactions against ledger candidates
#[derive(Debug, Clone, Default)]
pub struct ReconciliationMatcher {
    config: MatcherConfig,
}

impl ReconciliationMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Raw score of a pair, regardless of threshold
    pub fn score(&self, transaction: &BankTransaction, candidate: &LedgerCandidate) -> MatchScore {
        let mut confidence = BigDecimal::from(0);
        let mut rules = Vec::new();

        if self.amounts_match(transaction, candidate) {
            confidence += &self.config.exact_amount_weight;
            rules.push(MatchingRule::ExactAmount);
        }
        if self.dates_close(transaction, candidate) {
            confidence += &self.config.date_proximity_weight;
            rules.push(MatchingRule::DateProximity);
        }
        if descriptions_overlap(&transaction.description, &candidate.description) {
            confidence += &self.config.description_weight;
            rules.push(MatchingRule::DescriptionMatch);
        }

        let one = BigDecimal::from(1);
        if confidence > one {
            confidence = one;
        }

        MatchScore { confidence, rules }
    }

    /// Score of a pair, or `None` when it stays under the threshold
    pub fn evaluate(
        &self,
        transaction: &BankTransaction,
        candidate: &LedgerCandidate,
    ) -> Option<MatchScore> {
        let score = self.score(transaction, candidate);
        if score.confidence >= self.config.suggestion_threshold {
            Some(score)
        } else {
            None
        }
    }

    /// Nested scoring pass over pending transactions and candidates of the
    /// same organization. Produces fresh suggestions; deduplication against
    /// stored matches is the storage layer's job.
    pub fn suggest(
        &self,
        transactions: &[BankTransaction],
        candidates: &[LedgerCandidate],
    ) -> Vec<ReconciliationMatch> {
        let mut suggestions = Vec::new();

        for transaction in transactions.iter().filter(|t| t.is_pending()) {
            for candidate in candidates
                .iter()
                .filter(|c| c.organization_id == transaction.organization_id)
            {
                if let Some(score) = self.evaluate(transaction, candidate) {
                    suggestions.push(ReconciliationMatch::suggestion(
                        transaction.id.clone(),
                        candidate.kind,
                        candidate.id.clone(),
                        score.confidence,
                        score.rules,
                    ));
                }
            }
        }

        suggestions
    }

    fn amounts_match(&self, transaction: &BankTransaction, candidate: &LedgerCandidate) -> bool {
        let side = if transaction.is_credit() {
            &candidate.credit
        } else {
            &candidate.debit
        };
        (transaction.amount.abs() - side).abs() < self.config.amount_tolerance
    }

    fn dates_close(&self, transaction: &BankTransaction, candidate: &LedgerCandidate) -> bool {
        (transaction.transaction_date - candidate.date).num_days().abs()
            <= self.config.date_window_days
    }
}

/// The leading token of either description appears, case-insensitively,
/// inside the other one
pub fn descriptions_overlap(left: &str, right: &str) -> bool {
    let left = left.to_lowercase();
    let right = right.to_lowercase();
    let leads_into = |from: &str, into: &str| {
        from.split_whitespace()
            .next()
            .is_some_and(|token| into.contains(token))
    };
    leads_into(&left, &right) || leads_into(&right, &left)
}
