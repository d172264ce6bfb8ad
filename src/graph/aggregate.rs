//! Team aggregation and earnings rollups.
//!
//! Produces the per-member team report: per-level member/buyer counts,
//! per-level earnings, and 7/30-day/lifetime earning and join buckets.

use rusqlite::params;
use serde::Serialize;

use crate::error::Result;
use crate::graph::store::ReferralStore;
use crate::graph::traversal::{TreeWalker, MAX_REFERRAL_DEPTH};
use crate::types::Window;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Stats for one level of a member's downline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelStats {
    pub level: u32,
    pub members: usize,
    pub buyers: usize,
    /// What the report's subject earned from purchases at this level.
    pub earned_cents: i64,
}

/// Earnings summed over the standard recency buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EarningsBuckets {
    pub last_7_days_cents: i64,
    pub last_30_days_cents: i64,
    pub lifetime_cents: i64,
}

/// Full team report for one member.
#[derive(Debug, Clone, Serialize)]
pub struct TeamReport {
    pub member_id: String,
    pub team_size: usize,
    pub buyer_count: usize,
    /// One entry per populated level, ordered by level. Levels with no
    /// members and no earnings are omitted.
    pub levels: Vec<LevelStats>,
    pub earnings: EarningsBuckets,
    pub new_members_7_days: usize,
    pub new_members_30_days: usize,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EarnerRank {
    pub member_id: String,
    pub total_cents: i64,
}

// ---------------------------------------------------------------------------
// SQL constants
// ---------------------------------------------------------------------------

const EARNINGS_SINCE_SQL: &str = "\
SELECT COALESCE(SUM(amount_cents), 0)
FROM commissions
WHERE beneficiary_id = ?1 AND created_at >= ?2";

const EARNINGS_LIFETIME_SQL: &str = "\
SELECT COALESCE(SUM(amount_cents), 0)
FROM commissions
WHERE beneficiary_id = ?1";

const EARNINGS_BY_LEVEL_SQL: &str = "\
SELECT level, COALESCE(SUM(amount_cents), 0) AS total
FROM commissions
WHERE beneficiary_id = ?1
GROUP BY level";

const TOP_EARNERS_SQL: &str = "\
SELECT beneficiary_id, SUM(amount_cents) AS total
FROM commissions
GROUP BY beneficiary_id
ORDER BY total DESC, beneficiary_id ASC
LIMIT ?1";

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Rolls up team statistics and earnings for a member.
pub struct Aggregator<'a> {
    store: &'a ReferralStore,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a ReferralStore) -> Self {
        Self { store }
    }

    /// Commission earnings of `member_id` inside `[from, to)`.
    pub fn earnings_between(&self, member_id: &str, from: i64, to: i64) -> Result<i64> {
        let mut stmt = self.store.conn.prepare_cached(
            "SELECT COALESCE(SUM(amount_cents), 0)
             FROM commissions
             WHERE beneficiary_id = ?1 AND created_at >= ?2 AND created_at < ?3",
        )?;
        Ok(stmt.query_row(params![member_id, from, to], |row| row.get(0))?)
    }

    /// Commission earnings of `member_id` within a recency window.
    pub fn earnings_in_window(&self, member_id: &str, now: i64, window: Window) -> Result<i64> {
        match window.cutoff(now) {
            Some(cutoff) => {
                let mut stmt = self.store.conn.prepare_cached(EARNINGS_SINCE_SQL)?;
                Ok(stmt.query_row(params![member_id, cutoff], |row| row.get(0))?)
            }
            None => {
                let mut stmt = self.store.conn.prepare_cached(EARNINGS_LIFETIME_SQL)?;
                Ok(stmt.query_row(params![member_id], |row| row.get(0))?)
            }
        }
    }

    /// Build the full team report for `member_id` at time `now`.
    pub fn team_report(&self, member_id: &str, now: i64) -> Result<TeamReport> {
        let walker = TreeWalker::new(self.store);
        let downline = walker.find_downline(member_id, MAX_REFERRAL_DEPTH)?;

        // Per-level member/buyer counts from the walk.
        let mut members_by_level: Vec<(u32, usize, usize)> = Vec::new();
        let mut team_size = 0usize;
        let mut buyer_count = 0usize;
        let mut new_7 = 0usize;
        let mut new_30 = 0usize;
        let cutoff_7 = Window::Days7.cutoff(now).unwrap_or(i64::MIN);
        let cutoff_30 = Window::Days30.cutoff(now).unwrap_or(i64::MIN);

        for entry in &downline {
            team_size += 1;
            let buyer = self.store.has_purchased(&entry.member.id)?;
            if buyer {
                buyer_count += 1;
            }
            if entry.member.joined_at >= cutoff_7 {
                new_7 += 1;
            }
            if entry.member.joined_at >= cutoff_30 {
                new_30 += 1;
            }
            match members_by_level.last_mut() {
                Some(slot) if slot.0 == entry.depth => {
                    slot.1 += 1;
                    if buyer {
                        slot.2 += 1;
                    }
                }
                // Results are ordered by depth, so a new depth starts a slot.
                _ => members_by_level.push((entry.depth, 1, usize::from(buyer))),
            }
        }

        // Per-level earnings from the commissions table.
        let mut earned_by_level: std::collections::HashMap<u32, i64> =
            std::collections::HashMap::new();
        let mut stmt = self.store.conn.prepare_cached(EARNINGS_BY_LEVEL_SQL)?;
        let rows = stmt.query_map(params![member_id], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (level, total) = row?;
            earned_by_level.insert(level, total);
        }

        let mut levels: Vec<LevelStats> = members_by_level
            .into_iter()
            .map(|(level, members, buyers)| LevelStats {
                level,
                members,
                buyers,
                earned_cents: earned_by_level.remove(&level).unwrap_or(0),
            })
            .collect();
        // Earnings can exist at levels whose members have since left the
        // downline (re-parenting); surface them anyway.
        for (level, earned_cents) in earned_by_level {
            levels.push(LevelStats {
                level,
                members: 0,
                buyers: 0,
                earned_cents,
            });
        }
        levels.sort_by_key(|l| l.level);

        let earnings = EarningsBuckets {
            last_7_days_cents: self.earnings_in_window(member_id, now, Window::Days7)?,
            last_30_days_cents: self.earnings_in_window(member_id, now, Window::Days30)?,
            lifetime_cents: self.earnings_in_window(member_id, now, Window::Lifetime)?,
        };

        Ok(TeamReport {
            member_id: member_id.to_string(),
            team_size,
            buyer_count,
            levels,
            earnings,
            new_members_7_days: new_7,
            new_members_30_days: new_30,
        })
    }

    /// Leaderboard: members ranked by lifetime commission earnings.
    pub fn top_earners(&self, limit: usize) -> Result<Vec<EarnerRank>> {
        let mut stmt = self.store.conn.prepare_cached(TOP_EARNERS_SQL)?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(EarnerRank {
                member_id: row.get(0)?,
                total_cents: row.get(1)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
