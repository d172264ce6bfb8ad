//! Core domain types for reftree.
//!
//! All monetary values are integer cents (`i64`); all timestamps are Unix
//! epoch seconds. Percentage rates live elsewhere (basis points in the
//! commission plan) so nothing in this module ever touches floats.

use serde::{Deserialize, Serialize};

/// `Display` via `as_str` for the string-backed enums in this module.
macro_rules! fmt_as_str {
    () => {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.as_str())
        }
    };
}

// ---------------------------------------------------------------------------
// KycStatus
// ---------------------------------------------------------------------------

/// KYC verification state of a member.
///
/// The review workflow itself (document upload, admin approval) is an
/// external collaborator; the engine only stores the outcome and gates
/// payouts on [`KycStatus::Approved`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Unverified,
    Pending,
    Approved,
    Rejected,
}

impl KycStatus {
    /// Canonical string representation (matches the DB column values).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parse from a loose string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "unverified" => Some(Self::Unverified),
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for KycStatus {
    fmt_as_str!();
}

// ---------------------------------------------------------------------------
// PackageTier
// ---------------------------------------------------------------------------

/// Purchasable package tiers, ordered from cheapest to most capable.
///
/// The tier a member owns bounds how deep in their downline they may earn
/// from (the earning depth is configured per tier, see `config`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PackageTier {
    Starter,
    Silver,
    Gold,
    Super,
}

impl PackageTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Super => "super",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "starter" => Some(Self::Starter),
            "silver" => Some(Self::Silver),
            "gold" => Some(Self::Gold),
            "super" => Some(Self::Super),
            _ => None,
        }
    }
}

impl std::fmt::Display for PackageTier {
    fmt_as_str!();
}

// ---------------------------------------------------------------------------
// Member
// ---------------------------------------------------------------------------

/// A registered member of the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Referral code, also the primary key (see `id::referral_code`).
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Unix epoch seconds.
    pub joined_at: i64,
    pub kyc_status: KycStatus,
}

// ---------------------------------------------------------------------------
// Package / Purchase
// ---------------------------------------------------------------------------

/// A purchasable package tier granting commission eligibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub name: String,
    pub tier: PackageTier,
    pub price_cents: i64,
    pub active: bool,
}

/// A completed package purchase. `price_cents` is a snapshot of the
/// package price at purchase time — later repricing never changes what
/// was distributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: i64,
    pub member_id: String,
    pub package_id: String,
    pub price_cents: i64,
    pub purchased_at: i64,
}

// ---------------------------------------------------------------------------
// Commission
// ---------------------------------------------------------------------------

/// One per-level payment produced by distributing a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub id: i64,
    pub purchase_id: i64,
    /// The ancestor who earned this payment.
    pub beneficiary_id: String,
    /// The member whose purchase triggered it.
    pub buyer_id: String,
    /// Distance from buyer to beneficiary in the referral tree (1 = direct
    /// sponsor).
    pub level: u32,
    pub amount_cents: i64,
    pub created_at: i64,
}

// ---------------------------------------------------------------------------
// Wallet ledger
// ---------------------------------------------------------------------------

/// Kind of a wallet ledger entry. Credits increase the balance, debits
/// decrease it; `Adjustment` carries a signed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    CommissionCredit,
    PayoutDebit,
    TdsDebit,
    Adjustment,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CommissionCredit => "commission_credit",
            Self::PayoutDebit => "payout_debit",
            Self::TdsDebit => "tds_debit",
            Self::Adjustment => "adjustment",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "commission_credit" => Some(Self::CommissionCredit),
            "payout_debit" => Some(Self::PayoutDebit),
            "tds_debit" => Some(Self::TdsDebit),
            "adjustment" => Some(Self::Adjustment),
            _ => None,
        }
    }

    /// Sign applied when summing a balance: +1 for credits, -1 for debits,
    /// +1 for adjustments (their stored amount is already signed).
    pub fn sign(&self) -> i64 {
        match self {
            Self::CommissionCredit | Self::Adjustment => 1,
            Self::PayoutDebit | Self::TdsDebit => -1,
        }
    }
}

impl std::fmt::Display for LedgerKind {
    fmt_as_str!();
}

/// One row of a member's wallet ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub member_id: String,
    pub kind: LedgerKind,
    pub amount_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: i64,
}

// ---------------------------------------------------------------------------
// Payouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Approved,
    Rejected,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for PayoutStatus {
    fmt_as_str!();
}

/// A payout request. `gross = tds + net`; the ledger is only debited when
/// the request is approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: i64,
    pub member_id: String,
    pub gross_cents: i64,
    pub tds_cents: i64,
    pub net_cents: i64,
    pub status: PayoutStatus,
    pub requested_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<i64>,
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

const DAY_SECS: i64 = 86_400;

/// Recency window for categorization and aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    /// Last 7 days.
    Days7,
    /// Last 30 days.
    Days30,
    /// No cutoff.
    Lifetime,
}

impl Window {
    /// Inclusive lower bound for the window, or `None` for lifetime.
    pub fn cutoff(&self, now: i64) -> Option<i64> {
        match self {
            Self::Days7 => Some(now - 7 * DAY_SECS),
            Self::Days30 => Some(now - 30 * DAY_SECS),
            Self::Lifetime => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Days7 => "7d",
            Self::Days30 => "30d",
            Self::Lifetime => "lifetime",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "7" | "7d" | "week" => Some(Self::Days7),
            "30" | "30d" | "month" => Some(Self::Days30),
            "lifetime" | "all" => Some(Self::Lifetime),
            _ => None,
        }
    }
}

impl std::fmt::Display for Window {
    fmt_as_str!();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
