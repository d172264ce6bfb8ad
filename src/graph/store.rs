//! SQLite CRUD layer for the referral graph.
//!
//! Uses `rusqlite` with `prepare_cached` so the first call compiles each
//! statement and subsequent calls reuse it from the connection's cache.

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::converters::{row_to_commission, row_to_member, row_to_package, row_to_purchase};
use crate::db::schema::initialize_database;
use crate::error::{ReftreeError, Result};
use crate::types::{Commission, KycStatus, Member, Package, PackageTier, Purchase};

// ---------------------------------------------------------------------------
// TreeStats
// ---------------------------------------------------------------------------

/// Aggregate statistics about the stored referral graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TreeStats {
    pub members: usize,
    pub edges: usize,
    /// Members with at least one purchase.
    pub buyers: usize,
}

// ---------------------------------------------------------------------------
// SQL constants
// ---------------------------------------------------------------------------

const UPSERT_MEMBER_SQL: &str = "\
INSERT INTO members (id, name, email, joined_at, kyc_status)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(id) DO UPDATE SET
  name = excluded.name,
  email = excluded.email,
  kyc_status = excluded.kyc_status";

const UPSERT_EDGE_SQL: &str = "\
INSERT INTO referral_edges (member_id, sponsor_id)
VALUES (?1, ?2)
ON CONFLICT(member_id) DO UPDATE SET
  sponsor_id = excluded.sponsor_id";

const UPSERT_PACKAGE_SQL: &str = "\
INSERT INTO packages (id, name, tier, price_cents, active)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(id) DO UPDATE SET
  name = excluded.name,
  tier = excluded.tier,
  price_cents = excluded.price_cents,
  active = excluded.active";

// Highest tier first; tier ranks mirror the PackageTier ordering.
const BEST_TIER_SQL: &str = "\
SELECT p.tier FROM purchases pu
JOIN packages p ON p.id = pu.package_id
WHERE pu.member_id = ?1
ORDER BY CASE p.tier
  WHEN 'super' THEN 3
  WHEN 'gold' THEN 2
  WHEN 'silver' THEN 1
  ELSE 0
END DESC
LIMIT 1";

// ---------------------------------------------------------------------------
// ReferralStore
// ---------------------------------------------------------------------------

/// Typed CRUD wrapper around the reftree SQLite database.
pub struct ReferralStore {
    pub conn: Connection,
}

impl std::fmt::Debug for ReferralStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferralStore").finish_non_exhaustive()
    }
}

impl ReferralStore {
    /// Open (or create) the database at `db_path`, apply the schema, and
    /// return a ready-to-use store.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = initialize_database(db_path)?;
        Ok(Self { conn })
    }

    /// Wrap an already-open connection. Useful in tests where the caller
    /// has already called `initialize_database(":memory:")`.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// In-memory store with the schema applied. Test convenience.
    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    // -------------------------------------------------------------------
    // Members
    // -------------------------------------------------------------------

    /// Insert or update a member. `joined_at` is never updated — join time
    /// is immutable once recorded.
    pub fn upsert_member(&self, member: &Member) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(UPSERT_MEMBER_SQL)?;
        stmt.execute(params![
            member.id,
            member.name,
            member.email,
            member.joined_at,
            member.kyc_status.as_str(),
        ])?;
        Ok(())
    }

    pub fn get_member(&self, id: &str) -> Result<Option<Member>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM members WHERE id = ?1")?;
        let mut rows = stmt.query_and_then(params![id], row_to_member)?;
        rows.next().transpose()
    }

    /// Fetch a member or fail with [`ReftreeError::MemberNotFound`].
    pub fn require_member(&self, id: &str) -> Result<Member> {
        self.get_member(id)?
            .ok_or_else(|| ReftreeError::MemberNotFound(id.to_string()))
    }

    pub fn set_kyc_status(&self, id: &str, status: KycStatus) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached("UPDATE members SET kyc_status = ?2 WHERE id = ?1")?;
        let updated = stmt.execute(params![id, status.as_str()])?;
        if updated == 0 {
            return Err(ReftreeError::MemberNotFound(id.to_string()));
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Sponsor edges
    // -------------------------------------------------------------------

    /// Link `member_id` under `sponsor_id`, replacing any existing sponsor.
    ///
    /// Rejects self-sponsorship and any edge that would close a referral
    /// cycle: before writing, the sponsor's own upline is walked — if
    /// `member_id` appears in it, the edge is refused.
    pub fn set_sponsor(&self, member_id: &str, sponsor_id: &str) -> Result<()> {
        if member_id == sponsor_id {
            return Err(ReftreeError::SelfSponsor(member_id.to_string()));
        }
        self.require_member(member_id)?;
        self.require_member(sponsor_id)?;

        // Walk up from the sponsor. The walk is bounded by the number of
        // edges, and the visited set terminates it on pre-existing cycles.
        let mut current = sponsor_id.to_string();
        let mut visited = std::collections::HashSet::new();
        while let Some(next) = self.sponsor_of(&current)? {
            if next == member_id {
                return Err(ReftreeError::CycleDetected {
                    member: member_id.to_string(),
                    sponsor: sponsor_id.to_string(),
                });
            }
            if !visited.insert(next.clone()) {
                break;
            }
            current = next;
        }

        let mut stmt = self.conn.prepare_cached(UPSERT_EDGE_SQL)?;
        stmt.execute(params![member_id, sponsor_id])?;
        Ok(())
    }

    /// The direct sponsor of a member, if any.
    pub fn sponsor_of(&self, member_id: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT sponsor_id FROM referral_edges WHERE member_id = ?1")?;
        Ok(stmt
            .query_row(params![member_id], |row| row.get(0))
            .optional()?)
    }

    // -------------------------------------------------------------------
    // Packages & purchases
    // -------------------------------------------------------------------

    pub fn upsert_package(&self, package: &Package) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(UPSERT_PACKAGE_SQL)?;
        stmt.execute(params![
            package.id,
            package.name,
            package.tier.as_str(),
            package.price_cents,
            package.active as i64,
        ])?;
        Ok(())
    }

    pub fn get_package(&self, id: &str) -> Result<Option<Package>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM packages WHERE id = ?1")?;
        let mut rows = stmt.query_and_then(params![id], row_to_package)?;
        rows.next().transpose()
    }

    /// Record a purchase, snapshotting the package's current price.
    ///
    /// Fails if the member is unknown, the package is unknown, or the
    /// package has been deactivated.
    pub fn record_purchase(
        &self,
        member_id: &str,
        package_id: &str,
        purchased_at: i64,
    ) -> Result<Purchase> {
        self.require_member(member_id)?;
        let package = self
            .get_package(package_id)?
            .ok_or_else(|| ReftreeError::PackageNotFound(package_id.to_string()))?;
        if !package.active {
            return Err(ReftreeError::Invalid {
                what: "package",
                value: format!("{package_id} is inactive"),
            });
        }

        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO purchases (member_id, package_id, price_cents, purchased_at)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(params![
            member_id,
            package_id,
            package.price_cents,
            purchased_at
        ])?;

        Ok(Purchase {
            id: self.conn.last_insert_rowid(),
            member_id: member_id.to_string(),
            package_id: package_id.to_string(),
            price_cents: package.price_cents,
            purchased_at,
        })
    }

    pub fn get_purchase(&self, id: i64) -> Result<Option<Purchase>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM purchases WHERE id = ?1")?;
        let mut rows = stmt.query_and_then(params![id], row_to_purchase)?;
        rows.next().transpose()
    }

    pub fn purchases_of(&self, member_id: &str) -> Result<Vec<Purchase>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT * FROM purchases WHERE member_id = ?1 ORDER BY purchased_at ASC, id ASC",
        )?;
        let rows = stmt.query_and_then(params![member_id], row_to_purchase)?;
        rows.collect()
    }

    /// Whether the member has bought at least one package, ever.
    pub fn has_purchased(&self, member_id: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT EXISTS(SELECT 1 FROM purchases WHERE member_id = ?1)")?;
        let exists: i64 = stmt.query_row(params![member_id], |row| row.get(0))?;
        Ok(exists != 0)
    }

    /// Whether the member purchased anything at or after `cutoff`.
    pub fn purchased_since(&self, member_id: &str, cutoff: i64) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT EXISTS(SELECT 1 FROM purchases WHERE member_id = ?1 AND purchased_at >= ?2)",
        )?;
        let exists: i64 = stmt.query_row(params![member_id, cutoff], |row| row.get(0))?;
        Ok(exists != 0)
    }

    /// All commissions a member has earned, oldest first.
    pub fn commissions_of(&self, beneficiary_id: &str) -> Result<Vec<Commission>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT * FROM commissions WHERE beneficiary_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_and_then(params![beneficiary_id], row_to_commission)?;
        rows.collect()
    }

    /// The highest package tier the member owns, if any. Determines how
    /// deep in their downline they may earn from.
    pub fn best_tier_of(&self, member_id: &str) -> Result<Option<PackageTier>> {
        let mut stmt = self.conn.prepare_cached(BEST_TIER_SQL)?;
        let tier_raw: Option<String> = stmt
            .query_row(params![member_id], |row| row.get(0))
            .optional()?;
        match tier_raw {
            None => Ok(None),
            Some(raw) => PackageTier::from_str_loose(&raw)
                .map(Some)
                .ok_or_else(|| ReftreeError::Corrupt(format!("unknown package tier '{raw}'"))),
        }
    }

    // -------------------------------------------------------------------
    // Stats
    // -------------------------------------------------------------------

    pub fn get_stats(&self) -> Result<TreeStats> {
        let members: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM members", [], |row| row.get(0))?;
        let edges: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM referral_edges", [], |row| row.get(0))?;
        let buyers: usize = self.conn.query_row(
            "SELECT COUNT(DISTINCT member_id) FROM purchases",
            [],
            |row| row.get(0),
        )?;
        Ok(TreeStats {
            members,
            edges,
            buyers,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
