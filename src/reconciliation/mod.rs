//! Reconciliation of imported bank transactions against the ledger
//!
//! [`matcher`] proposes candidate pairs, [`transitions`] holds the match and
//! transaction state machine, and [`service`] runs both over a storage backend.

pub mod matcher;
pub mod service;
pub mod transitions;

pub use matcher::{descriptions_overlap, MatchScore, MatcherConfig, ReconciliationMatcher};
pub use service::{BulkAction, BulkActionOutcome, ReconciliationService, SkippedTransaction};
