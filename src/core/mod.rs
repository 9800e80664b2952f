//! Reconciliation logic: date resolution, title matching and the two periodic checks.

pub mod date_resolver;
pub mod expiry;
pub mod restock;
pub mod similarity;

pub use date_resolver::DateResolver;
pub use expiry::{ExpiryReconciler, ExpiryReport, RecordFailure};
pub use restock::{RestockReconciler, RestockReport};
pub use similarity::SimilarityScorer;
