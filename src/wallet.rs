//! Wallet ledger and payout workflow.
//!
//! The wallet is an append-only ledger: credits and debits are never
//! updated or deleted, a member's balance is a sum over their entries.
//! Payouts go through a request/settle cycle — a pending request holds
//! its gross amount against the available balance, and the ledger is
//! only debited when the request is approved.

use rusqlite::params;
use tracing::info;

use crate::db::converters::{row_to_ledger_entry, row_to_payout_request};
use crate::error::{ReftreeError, Result};
use crate::graph::store::ReferralStore;
use crate::types::{KycStatus, LedgerEntry, LedgerKind, PayoutRequest, PayoutStatus};

/// Denominator for basis-point rates.
const BPS_DENOM: i64 = 10_000;

// ---------------------------------------------------------------------------
// SQL constants
// ---------------------------------------------------------------------------

const PENDING_HOLDS_SQL: &str = "\
SELECT COALESCE(SUM(gross_cents), 0)
FROM payout_requests
WHERE member_id = ?1 AND status = 'pending'";

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// Wallet operations bound to a store.
pub struct Wallet<'a> {
    store: &'a ReferralStore,
    /// Tax withheld at source on payouts, in basis points of gross.
    tds_bps: u32,
}

impl<'a> Wallet<'a> {
    pub fn new(store: &'a ReferralStore, tds_bps: u32) -> Self {
        Self { store, tds_bps }
    }

    // -------------------------------------------------------------------
    // Ledger
    // -------------------------------------------------------------------

    /// Ledger balance: credits minus debits over all entries. Adjustments
    /// carry their own sign.
    pub fn balance(&self, member_id: &str) -> Result<i64> {
        Ok(self
            .ledger_of(member_id)?
            .iter()
            .map(|e| e.kind.sign() * e.amount_cents)
            .sum())
    }

    /// Gross cents held by pending payout requests.
    pub fn pending_holds(&self, member_id: &str) -> Result<i64> {
        let mut stmt = self.store.conn.prepare_cached(PENDING_HOLDS_SQL)?;
        Ok(stmt.query_row(params![member_id], |row| row.get(0))?)
    }

    /// What the member can still request: balance minus pending holds.
    pub fn available(&self, member_id: &str) -> Result<i64> {
        Ok(self.balance(member_id)? - self.pending_holds(member_id)?)
    }

    /// Full ledger of a member, oldest first.
    pub fn ledger_of(&self, member_id: &str) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self.store.conn.prepare_cached(
            "SELECT * FROM wallet_ledger WHERE member_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_and_then(params![member_id], row_to_ledger_entry)?;
        rows.collect()
    }

    /// Manual signed correction (admin action). A debit must fit inside
    /// the available balance, not just the ledger balance — funds held by
    /// pending payout requests are spoken for, and removing them would let
    /// a later settle push the balance below zero.
    pub fn record_adjustment(
        &self,
        member_id: &str,
        amount_cents: i64,
        note: &str,
        now: i64,
    ) -> Result<LedgerEntry> {
        self.store.require_member(member_id)?;
        if amount_cents < 0 {
            let available = self.available(member_id)?;
            if available + amount_cents < 0 {
                return Err(ReftreeError::InsufficientBalance {
                    available,
                    requested: -amount_cents,
                });
            }
        }
        self.insert_entry(member_id, LedgerKind::Adjustment, amount_cents, Some(note), now)
    }

    fn insert_entry(
        &self,
        member_id: &str,
        kind: LedgerKind,
        amount_cents: i64,
        note: Option<&str>,
        now: i64,
    ) -> Result<LedgerEntry> {
        let mut stmt = self.store.conn.prepare_cached(
            "INSERT INTO wallet_ledger (member_id, kind, amount_cents, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        stmt.execute(params![member_id, kind.as_str(), amount_cents, note, now])?;
        Ok(LedgerEntry {
            id: self.store.conn.last_insert_rowid(),
            member_id: member_id.to_string(),
            kind,
            amount_cents,
            note: note.map(str::to_string),
            created_at: now,
        })
    }

    // -------------------------------------------------------------------
    // Payouts
    // -------------------------------------------------------------------

    /// TDS withheld on a gross payout amount, floor-rounded.
    pub fn tds_on(&self, gross_cents: i64) -> i64 {
        gross_cents * self.tds_bps as i64 / BPS_DENOM
    }

    /// Open a payout request for `gross_cents`.
    ///
    /// Requires the member's KYC to be approved and their available
    /// balance (ledger balance minus other pending holds) to cover the
    /// gross. The request is recorded as Pending; nothing is debited yet.
    pub fn request_payout(
        &self,
        member_id: &str,
        gross_cents: i64,
        now: i64,
    ) -> Result<PayoutRequest> {
        let member = self.store.require_member(member_id)?;
        if member.kyc_status != KycStatus::Approved {
            return Err(ReftreeError::KycNotApproved(member_id.to_string()));
        }
        if gross_cents <= 0 {
            return Err(ReftreeError::Invalid {
                what: "payout amount",
                value: format!("{gross_cents} cents"),
            });
        }
        let available = self.available(member_id)?;
        if available < gross_cents {
            return Err(ReftreeError::InsufficientBalance {
                available,
                requested: gross_cents,
            });
        }

        let tds_cents = self.tds_on(gross_cents);
        let net_cents = gross_cents - tds_cents;
        let mut stmt = self.store.conn.prepare_cached(
            "INSERT INTO payout_requests
               (member_id, gross_cents, tds_cents, net_cents, status, requested_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
        )?;
        stmt.execute(params![member_id, gross_cents, tds_cents, net_cents, now])?;
        let id = self.store.conn.last_insert_rowid();

        info!(member = %member_id, gross_cents, tds_cents, "payout requested");
        Ok(PayoutRequest {
            id,
            member_id: member_id.to_string(),
            gross_cents,
            tds_cents,
            net_cents,
            status: PayoutStatus::Pending,
            requested_at: now,
            settled_at: None,
        })
    }

    pub fn get_payout(&self, id: i64) -> Result<Option<PayoutRequest>> {
        let mut stmt = self
            .store
            .conn
            .prepare_cached("SELECT * FROM payout_requests WHERE id = ?1")?;
        let mut rows = stmt.query_and_then(params![id], row_to_payout_request)?;
        rows.next().transpose()
    }

    pub fn payouts_of(&self, member_id: &str) -> Result<Vec<PayoutRequest>> {
        let mut stmt = self.store.conn.prepare_cached(
            "SELECT * FROM payout_requests WHERE member_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_and_then(params![member_id], row_to_payout_request)?;
        rows.collect()
    }

    /// Settle a pending payout request.
    ///
    /// Approval debits the ledger (PayoutDebit for the net, TdsDebit for
    /// the withheld tax) and marks the request Approved, atomically.
    /// Rejection just releases the hold; the ledger is untouched.
    pub fn settle_payout(&self, request_id: i64, approve: bool, now: i64) -> Result<PayoutRequest> {
        let mut request = self
            .get_payout(request_id)?
            .ok_or(ReftreeError::PayoutNotPending(request_id))?;
        if request.status != PayoutStatus::Pending {
            return Err(ReftreeError::PayoutNotPending(request_id));
        }

        let status = if approve {
            PayoutStatus::Approved
        } else {
            PayoutStatus::Rejected
        };

        let tx = self.store.conn.unchecked_transaction()?;
        if approve {
            let mut debit = tx.prepare_cached(
                "INSERT INTO wallet_ledger (member_id, kind, amount_cents, note, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            debit.execute(params![
                request.member_id,
                LedgerKind::PayoutDebit.as_str(),
                request.net_cents,
                format!("payout {request_id} net"),
                now,
            ])?;
            if request.tds_cents > 0 {
                debit.execute(params![
                    request.member_id,
                    LedgerKind::TdsDebit.as_str(),
                    request.tds_cents,
                    format!("payout {request_id} tds"),
                    now,
                ])?;
            }
        }
        {
            let mut update = tx.prepare_cached(
                "UPDATE payout_requests SET status = ?2, settled_at = ?3 WHERE id = ?1",
            )?;
            update.execute(params![request_id, status.as_str(), now])?;
        }
        tx.commit()?;

        info!(request_id, status = %status, "payout settled");
        request.status = status;
        request.settled_at = Some(now);
        Ok(request)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
