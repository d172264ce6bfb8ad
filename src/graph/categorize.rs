//! Downline categorization.
//!
//! Splits a member's downline into direct (depth 1) and indirect
//! (depth >= 2) referrals, cross-classified by buyer status and by a
//! recency window on joins and purchases.

use serde::Serialize;

use crate::error::Result;
use crate::graph::store::ReferralStore;
use crate::graph::traversal::{TreeWalker, MAX_REFERRAL_DEPTH};
use crate::types::{Member, Window};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Whether a downline member is a direct or indirect referral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralCategory {
    /// Depth 1: sponsored directly.
    Direct,
    /// Depth >= 2: referred through an intermediate member.
    Indirect,
}

impl ReferralCategory {
    pub fn from_depth(depth: u32) -> Self {
        if depth == 1 {
            Self::Direct
        } else {
            Self::Indirect
        }
    }
}

/// One downline member with classification flags.
#[derive(Debug, Clone, Serialize)]
pub struct CategorizedMember {
    pub member: Member,
    pub depth: u32,
    pub category: ReferralCategory,
    /// Has at least one purchase, ever.
    pub buyer: bool,
    /// Joined within the window.
    pub joined_in_window: bool,
    /// Purchased within the window.
    pub purchased_in_window: bool,
}

/// Counts rolled up from a categorized downline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DownlineBreakdown {
    pub direct_total: usize,
    pub direct_buyers: usize,
    pub indirect_total: usize,
    pub indirect_buyers: usize,
    /// Downline members who joined within the window.
    pub joined_in_window: usize,
    /// Downline members who purchased within the window.
    pub purchased_in_window: usize,
}

// ---------------------------------------------------------------------------
// Categorizer
// ---------------------------------------------------------------------------

/// Classifies a member's downline. `now` is passed by the caller so
/// results are reproducible.
pub struct Categorizer<'a> {
    store: &'a ReferralStore,
}

impl<'a> Categorizer<'a> {
    pub fn new(store: &'a ReferralStore) -> Self {
        Self { store }
    }

    /// Classify every downline member of `member_id` within the window.
    ///
    /// For [`Window::Lifetime`] the window flags are true for every buyer
    /// / every member respectively (no cutoff).
    pub fn categorize(
        &self,
        member_id: &str,
        now: i64,
        window: Window,
    ) -> Result<Vec<CategorizedMember>> {
        let walker = TreeWalker::new(self.store);
        let downline = walker.find_downline(member_id, MAX_REFERRAL_DEPTH)?;
        let cutoff = window.cutoff(now);

        let mut out = Vec::with_capacity(downline.len());
        for entry in downline {
            let buyer = self.store.has_purchased(&entry.member.id)?;
            let joined_in_window = match cutoff {
                Some(c) => entry.member.joined_at >= c,
                None => true,
            };
            let purchased_in_window = match cutoff {
                Some(c) => self.store.purchased_since(&entry.member.id, c)?,
                None => buyer,
            };
            out.push(CategorizedMember {
                category: ReferralCategory::from_depth(entry.depth),
                depth: entry.depth,
                member: entry.member,
                buyer,
                joined_in_window,
                purchased_in_window,
            });
        }
        Ok(out)
    }

    /// Roll the classification up into counts.
    pub fn breakdown(&self, member_id: &str, now: i64, window: Window) -> Result<DownlineBreakdown> {
        let mut counts = DownlineBreakdown::default();
        for entry in self.categorize(member_id, now, window)? {
            match entry.category {
                ReferralCategory::Direct => {
                    counts.direct_total += 1;
                    if entry.buyer {
                        counts.direct_buyers += 1;
                    }
                }
                ReferralCategory::Indirect => {
                    counts.indirect_total += 1;
                    if entry.buyer {
                        counts.indirect_buyers += 1;
                    }
                }
            }
            if entry.joined_in_window {
                counts.joined_in_window += 1;
            }
            if entry.purchased_in_window {
                counts.purchased_in_window += 1;
            }
        }
        Ok(counts)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
