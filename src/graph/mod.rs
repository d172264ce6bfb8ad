//! Graph layer — SQLite-backed referral store, traversal, categorization,
//! and aggregation.

pub mod aggregate;
pub mod categorize;
pub mod store;
pub mod traversal;

pub use aggregate::Aggregator;
pub use categorize::Categorizer;
pub use store::ReferralStore;
pub use traversal::{TreeWalker, MAX_REFERRAL_DEPTH};
