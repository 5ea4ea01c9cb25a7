//! # Reconciliation Core
//!
//! Bank statement ingestion and reconciliation for Spanish bank accounts.
//!
//! ## Features
//!
//! - **Norma 43 parsing**: AEB Cuaderno 43 fixed-width statements with per-line error reporting
//! - **Statement validation**: footer counts, debit/credit totals and final balance checks
//! - **Import batches**: normalization into pending bank transactions, revertible as a unit
//! - **Matching**: confidence-scored suggestions against ledger entries and invoices
//! - **Lifecycle**: approve, reject, undo, ignore and bulk actions with conflict detection
//! - **Storage abstraction**: database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use reconciliation_core::{parse_statement, is_valid_format};
//!
//! let content = "not a statement";
//! assert!(!is_valid_format(content));
//!
//! let parsed = parse_statement(content);
//! assert!(parsed.header.is_none());
//! assert!(!parsed.is_importable());
//! ```

pub mod import;
pub mod norma43;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use import::{ImportBatch, StatementImporter};
pub use norma43::{is_valid_format, parse_statement, parse_statement_bytes, ParsedStatement};
pub use reconciliation::{
    BulkAction, BulkActionOutcome, MatcherConfig, ReconciliationMatcher, ReconciliationService,
};
pub use traits::*;
pub use types::*;
