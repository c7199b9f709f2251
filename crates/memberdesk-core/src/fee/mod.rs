//! Fee status derivation.
//!
//! Classifies a customer's billing standing from their last payment and
//! next due dates. Nothing here is stored: statuses are recomputed from
//! the source dates every time they are needed.

pub mod classifier;
pub mod summary;

pub use classifier::{classify, parse_date, FeeStatus, FeeStatusKind};
pub use summary::FeeSummary;
