//! Reftree — referral-tree commission engine.
//!
//! Provides a SQLite-backed sponsor graph, depth-bounded downline/upline
//! traversal (up to 120 levels), direct/indirect categorization, windowed
//! team analytics, per-level commission distribution, and a wallet ledger
//! with TDS-aware payouts.

pub mod cli;
pub mod commission;
pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod id;
pub mod observability;
pub mod types;
pub mod wallet;
