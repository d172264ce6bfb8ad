//! Error types for reftree.
//!
//! A single crate-wide error enum keeps `?` propagation uniform across the
//! store, traversal, commission, and wallet layers.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum ReftreeError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A stored row contains a value the domain types cannot represent
    /// (e.g. an unknown KYC status string written by a foreign tool).
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("member not found: {0}")]
    MemberNotFound(String),

    #[error("package not found: {0}")]
    PackageNotFound(String),

    #[error("member {0} cannot sponsor themselves")]
    SelfSponsor(String),

    #[error("sponsoring {member} under {sponsor} would close a referral cycle")]
    CycleDetected { member: String, sponsor: String },

    #[error("insufficient balance: available {available} cents, requested {requested} cents")]
    InsufficientBalance { available: i64, requested: i64 },

    #[error("payout requires approved KYC (member {0})")]
    KycNotApproved(String),

    #[error("payout request {0} is not pending")]
    PayoutNotPending(i64),

    #[error("invalid {what}: {value}")]
    Invalid { what: &'static str, value: String },
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, ReftreeError>;
