//! Commission distribution.
//!
//! Distributing a purchase walks the buyer's upline (at most
//! [`MAX_REFERRAL_DEPTH`] levels) and pays each eligible ancestor a
//! per-level share of the purchase price. All math is integer cents with
//! floor rounding; rates are basis points.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::TierDepths;
use crate::error::{ReftreeError, Result};
use crate::graph::store::ReferralStore;
use crate::graph::traversal::{TreeWalker, MAX_REFERRAL_DEPTH};
use crate::types::{Commission, LedgerKind, Purchase};

/// Denominator for basis-point rates: 10_000 bps = 100%.
pub const BPS_DENOM: i64 = 10_000;

// ---------------------------------------------------------------------------
// CommissionPlan
// ---------------------------------------------------------------------------

/// Per-level rate schedule in basis points. Index 0 is level 1 (the
/// buyer's direct sponsor); levels past the end of the schedule pay zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommissionPlan {
    pub level_bps: Vec<u32>,
}

impl CommissionPlan {
    pub fn new(level_bps: Vec<u32>) -> Self {
        Self { level_bps }
    }

    /// Rate for a 1-based level; zero past the schedule.
    pub fn rate_for(&self, level: u32) -> u32 {
        if level == 0 {
            return 0;
        }
        self.level_bps
            .get((level - 1) as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Deepest level this plan pays, clamped to [`MAX_REFERRAL_DEPTH`].
    pub fn depth(&self) -> u32 {
        (self.level_bps.len() as u32).min(MAX_REFERRAL_DEPTH)
    }

    /// Sum of all level rates.
    pub fn total_bps(&self) -> u64 {
        self.level_bps.iter().map(|&b| b as u64).sum()
    }

    /// A plan paying out more than 100% could distribute more than the
    /// purchase price; refuse it up front.
    pub fn validate(&self) -> Result<()> {
        if self.level_bps.is_empty() {
            return Err(ReftreeError::Config(
                "commission plan has no levels".to_string(),
            ));
        }
        let total = self.total_bps();
        if total > BPS_DENOM as u64 {
            return Err(ReftreeError::Config(format!(
                "commission plan totals {total} bps, more than {BPS_DENOM}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Distribution outcome
// ---------------------------------------------------------------------------

/// Result of distributing one purchase.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionOutcome {
    pub purchase_id: i64,
    pub commissions: Vec<Commission>,
    pub total_cents: i64,
    /// Ancestors skipped for lacking a package tier deep enough to earn
    /// at their level. Skipped levels are consumed, not rolled up.
    pub levels_skipped: usize,
}

// ---------------------------------------------------------------------------
// CommissionEngine
// ---------------------------------------------------------------------------

/// Applies a [`CommissionPlan`] to purchases against a store.
pub struct CommissionEngine<'a> {
    store: &'a ReferralStore,
    plan: CommissionPlan,
    depths: TierDepths,
}

impl<'a> CommissionEngine<'a> {
    pub fn new(store: &'a ReferralStore, plan: CommissionPlan, depths: TierDepths) -> Result<Self> {
        plan.validate()?;
        Ok(Self {
            store,
            plan,
            depths,
        })
    }

    /// Distribute commissions for `purchase` to the buyer's upline.
    ///
    /// For each ancestor at level L: if the ancestor owns a package whose
    /// tier earns at least L levels deep, they receive
    /// `price * rate_bps[L] / 10_000` (floor), capped at whatever remains
    /// of the price. Ineligible ancestors consume their level and earn
    /// nothing. Each payment writes a `commissions` row and a matching
    /// wallet credit; the whole distribution is one transaction.
    pub fn distribute(&self, purchase: &Purchase, now: i64) -> Result<DistributionOutcome> {
        let walker = TreeWalker::new(self.store);
        let upline = walker.find_upline(&purchase.member_id, self.plan.depth())?;

        let tx = self.store.conn.unchecked_transaction()?;
        let mut commissions = Vec::new();
        let mut total_cents: i64 = 0;
        let mut levels_skipped = 0usize;

        for entry in &upline {
            let level = entry.depth;
            let rate = self.plan.rate_for(level);
            if rate == 0 {
                continue;
            }

            let eligible = match self.store.best_tier_of(&entry.member.id)? {
                Some(tier) => self.depths.depth_for(tier) >= level,
                None => false,
            };
            if !eligible {
                debug!(
                    beneficiary = %entry.member.id,
                    level,
                    "ancestor not eligible at this level, skipping"
                );
                levels_skipped += 1;
                continue;
            }

            let raw = purchase.price_cents * rate as i64 / BPS_DENOM;
            let remaining = purchase.price_cents - total_cents;
            let amount = raw.min(remaining);
            if amount <= 0 {
                continue;
            }

            let mut stmt = tx.prepare_cached(
                "INSERT INTO commissions
                   (purchase_id, beneficiary_id, buyer_id, level, amount_cents, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            stmt.execute(rusqlite::params![
                purchase.id,
                entry.member.id,
                purchase.member_id,
                level,
                amount,
                now,
            ])?;
            let commission_id = tx.last_insert_rowid();

            let mut ledger = tx.prepare_cached(
                "INSERT INTO wallet_ledger (member_id, kind, amount_cents, note, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            ledger.execute(rusqlite::params![
                entry.member.id,
                LedgerKind::CommissionCredit.as_str(),
                amount,
                format!("level {level} commission on purchase {}", purchase.id),
                now,
            ])?;

            total_cents += amount;
            commissions.push(Commission {
                id: commission_id,
                purchase_id: purchase.id,
                beneficiary_id: entry.member.id.clone(),
                buyer_id: purchase.member_id.clone(),
                level,
                amount_cents: amount,
                created_at: now,
            });
        }

        tx.commit()?;

        info!(
            purchase_id = purchase.id,
            buyer = %purchase.member_id,
            paid = commissions.len(),
            skipped = levels_skipped,
            total_cents,
            "distributed commissions"
        );

        Ok(DistributionOutcome {
            purchase_id: purchase.id,
            commissions,
            total_cents,
            levels_skipped,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
