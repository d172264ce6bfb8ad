//! Referral-tree traversal using SQLite recursive CTEs.
//!
//! Downline and upline walks run as recursive CTEs with an in-path cycle
//! guard (delimited `instr` check on the visited path) so cyclic data can
//! never hang a query.
//! Cycle auditing uses Tarjan's SCC algorithm in Rust — it needs mutable
//! state (stack, index counters) that a CTE cannot express.

use std::collections::{HashMap, HashSet};

use rusqlite::params;

use crate::db::converters::row_to_member;
use crate::error::Result;
use crate::graph::store::ReferralStore;
use crate::types::Member;

/// Hard bound on referral-tree depth. No traversal, distribution, or
/// report ever looks past this many levels.
pub const MAX_REFERRAL_DEPTH: u32 = 120;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A member annotated with their distance from the walk's starting point.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MemberAtDepth {
    pub member: Member,
    /// 1 = direct referral (downline) or direct sponsor (upline).
    pub depth: u32,
}

/// A strongly connected component (circular referral chain) in the graph.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CycleInfo {
    pub member_ids: Vec<String>,
    pub size: usize,
}

// ---------------------------------------------------------------------------
// SQL constants
// ---------------------------------------------------------------------------

// Path entries are wrapped in '->' on both sides so the in-path check
// matches whole ids only; a bare instr() would also hit ids that are
// substrings of other ids and wrongly prune their subtrees.
const FIND_DOWNLINE_SQL: &str = "\
WITH RECURSIVE downline(id, depth, path) AS (
    -- Base: direct referrals
    SELECT member_id, 1, '->' || sponsor_id || '->' || member_id || '->'
    FROM referral_edges
    WHERE sponsor_id = ?1

    UNION

    -- Recursive: follow referral edges outward, with cycle detection
    SELECT e.member_id, d.depth + 1, d.path || e.member_id || '->'
    FROM downline d
    JOIN referral_edges e ON e.sponsor_id = d.id
    WHERE d.depth < ?2
      AND instr(d.path, '->' || e.member_id || '->') = 0
)
SELECT DISTINCT m.*, d.depth
FROM downline d
JOIN members m ON m.id = d.id
ORDER BY d.depth ASC, m.id ASC";

const FIND_UPLINE_SQL: &str = "\
WITH RECURSIVE upline(id, depth, path) AS (
    -- Base: direct sponsor
    SELECT sponsor_id, 1, '<-' || member_id || '<-' || sponsor_id || '<-'
    FROM referral_edges
    WHERE member_id = ?1

    UNION

    -- Recursive: climb sponsor links, with cycle detection
    SELECT e.sponsor_id, u.depth + 1, u.path || e.sponsor_id || '<-'
    FROM upline u
    JOIN referral_edges e ON e.member_id = u.id
    WHERE u.depth < ?2
      AND instr(u.path, '<-' || e.sponsor_id || '<-') = 0
)
SELECT m.*, u.depth
FROM upline u
JOIN members m ON m.id = u.id
ORDER BY u.depth ASC";

// ---------------------------------------------------------------------------
// TreeWalker
// ---------------------------------------------------------------------------

/// Referral-tree traversal bound to a store.
///
/// All walks are clamped to [`MAX_REFERRAL_DEPTH`] and terminate on
/// cyclic data.
pub struct TreeWalker<'a> {
    store: &'a ReferralStore,
}

impl<'a> TreeWalker<'a> {
    pub fn new(store: &'a ReferralStore) -> Self {
        Self { store }
    }

    // -------------------------------------------------------------------
    // find_downline
    // -------------------------------------------------------------------

    /// All descendants of `member_id` up to `max_depth` levels, annotated
    /// with depth and ordered depth-first by level.
    ///
    /// `max_depth` is clamped to [`MAX_REFERRAL_DEPTH`]; 0 returns nothing.
    pub fn find_downline(&self, member_id: &str, max_depth: u32) -> Result<Vec<MemberAtDepth>> {
        let depth = max_depth.min(MAX_REFERRAL_DEPTH);
        if depth == 0 {
            return Ok(Vec::new());
        }
        let mut stmt = self.store.conn.prepare_cached(FIND_DOWNLINE_SQL)?;
        let rows = stmt.query_and_then(params![member_id, depth], |row| {
            let member = row_to_member(row)?;
            let depth: u32 = row.get("depth")?;
            Ok::<_, crate::error::ReftreeError>(MemberAtDepth { member, depth })
        })?;

        rows.collect()
    }

    /// Direct referrals only (depth 1).
    pub fn direct_referrals(&self, member_id: &str) -> Result<Vec<Member>> {
        let results = self.find_downline(member_id, 1)?;
        Ok(results.into_iter().map(|r| r.member).collect())
    }

    // -------------------------------------------------------------------
    // find_upline
    // -------------------------------------------------------------------

    /// The ancestor chain of `member_id` (sponsor, sponsor's sponsor, …),
    /// ordered by level, up to `max_depth` levels or the tree root.
    pub fn find_upline(&self, member_id: &str, max_depth: u32) -> Result<Vec<MemberAtDepth>> {
        let depth = max_depth.min(MAX_REFERRAL_DEPTH);
        if depth == 0 {
            return Ok(Vec::new());
        }
        let mut stmt = self.store.conn.prepare_cached(FIND_UPLINE_SQL)?;
        let rows = stmt.query_and_then(params![member_id, depth], |row| {
            let member = row_to_member(row)?;
            let depth: u32 = row.get("depth")?;
            Ok::<_, crate::error::ReftreeError>(MemberAtDepth { member, depth })
        })?;

        rows.collect()
    }

    // -------------------------------------------------------------------
    // sponsor_chain
    // -------------------------------------------------------------------

    /// The upline path from `member_id` to a claimed ancestor, inclusive
    /// of both ends, or `None` if `ancestor_id` is not actually in the
    /// member's upline within [`MAX_REFERRAL_DEPTH`] levels.
    pub fn sponsor_chain(&self, member_id: &str, ancestor_id: &str) -> Result<Option<Vec<Member>>> {
        let start = match self.store.get_member(member_id)? {
            Some(m) => m,
            None => return Ok(None),
        };
        if member_id == ancestor_id {
            return Ok(Some(vec![start]));
        }

        let mut chain = vec![start];
        for entry in self.find_upline(member_id, MAX_REFERRAL_DEPTH)? {
            let found = entry.member.id == ancestor_id;
            chain.push(entry.member);
            if found {
                return Ok(Some(chain));
            }
        }
        Ok(None)
    }

    // -------------------------------------------------------------------
    // detect_cycles
    // -------------------------------------------------------------------

    /// Audit the full edge set for circular referral chains using Tarjan's
    /// SCC algorithm. Returns components of size >= 2.
    ///
    /// `set_sponsor` refuses cycle-closing edges, so a healthy database
    /// returns nothing here; this exists to validate bulk-imported data
    /// that bypassed the store API.
    pub fn detect_cycles(&self) -> Result<Vec<CycleInfo>> {
        let mut stmt = self
            .store
            .conn
            .prepare_cached("SELECT sponsor_id, member_id FROM referral_edges")?;
        let edge_pairs: Vec<(String, String)> = stmt
            .query_map([], |row| {
                let sponsor: String = row.get(0)?;
                let member: String = row.get(1)?;
                Ok((sponsor, member))
            })?
            .filter_map(|r| r.ok())
            .collect();

        let mut adj: HashMap<String, Vec<String>> = HashMap::new();
        let mut all_nodes: HashSet<String> = HashSet::new();
        for (sponsor, member) in &edge_pairs {
            all_nodes.insert(sponsor.clone());
            all_nodes.insert(member.clone());
            adj.entry(sponsor.clone()).or_default().push(member.clone());
        }

        let mut index_counter: u32 = 0;
        let mut node_index: HashMap<String, u32> = HashMap::new();
        let mut node_lowlink: HashMap<String, u32> = HashMap::new();
        let mut on_stack: HashSet<String> = HashSet::new();
        let mut stack: Vec<String> = Vec::new();
        let mut sccs: Vec<Vec<String>> = Vec::new();

        #[allow(clippy::too_many_arguments)]
        fn strong_connect(
            v: &str,
            adj: &HashMap<String, Vec<String>>,
            index_counter: &mut u32,
            node_index: &mut HashMap<String, u32>,
            node_lowlink: &mut HashMap<String, u32>,
            on_stack: &mut HashSet<String>,
            stack: &mut Vec<String>,
            sccs: &mut Vec<Vec<String>>,
        ) {
            node_index.insert(v.to_string(), *index_counter);
            node_lowlink.insert(v.to_string(), *index_counter);
            *index_counter += 1;
            stack.push(v.to_string());
            on_stack.insert(v.to_string());

            if let Some(neighbors) = adj.get(v) {
                for w in neighbors {
                    if !node_index.contains_key(w.as_str()) {
                        strong_connect(
                            w,
                            adj,
                            index_counter,
                            node_index,
                            node_lowlink,
                            on_stack,
                            stack,
                            sccs,
                        );
                        let w_low = *node_lowlink.get(w.as_str()).unwrap();
                        let v_low = node_lowlink.get_mut(v).unwrap();
                        if w_low < *v_low {
                            *v_low = w_low;
                        }
                    } else if on_stack.contains(w.as_str()) {
                        let w_idx = *node_index.get(w.as_str()).unwrap();
                        let v_low = node_lowlink.get_mut(v).unwrap();
                        if w_idx < *v_low {
                            *v_low = w_idx;
                        }
                    }
                }
            }

            if node_lowlink.get(v) == node_index.get(v) {
                let mut scc: Vec<String> = Vec::new();
                loop {
                    let w = stack.pop().unwrap();
                    on_stack.remove(&w);
                    scc.push(w.clone());
                    if w == v {
                        break;
                    }
                }
                sccs.push(scc);
            }
        }

        for node in &all_nodes {
            if !node_index.contains_key(node.as_str()) {
                strong_connect(
                    node,
                    &adj,
                    &mut index_counter,
                    &mut node_index,
                    &mut node_lowlink,
                    &mut on_stack,
                    &mut stack,
                    &mut sccs,
                );
            }
        }

        Ok(sccs
            .into_iter()
            .filter(|scc| scc.len() >= 2)
            .map(|member_ids| {
                let size = member_ids.len();
                CycleInfo { member_ids, size }
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KycStatus;

    fn setup() -> ReferralStore {
        ReferralStore::in_memory().expect("in-memory store should open")
    }

    fn make_member(id: &str) -> Member {
        Member {
            id: id.to_string(),
            name: format!("member {id}"),
            email: None,
            joined_at: 1,
            kyc_status: KycStatus::Unverified,
        }
    }

    /// Seed a linear chain: root sponsors a, a sponsors b, b sponsors c.
    fn seed_chain(store: &ReferralStore) {
        for id in ["root", "a", "b", "c"] {
            store.upsert_member(&make_member(id)).unwrap();
        }
        store.set_sponsor("a", "root").unwrap();
        store.set_sponsor("b", "a").unwrap();
        store.set_sponsor("c", "b").unwrap();
    }

    /// Seed a branching tree: root has two directs, each with one child.
    ///
    ///          root
    ///         /    \
    ///        l1     r1
    ///        |      |
    ///        l2     r2
    fn seed_tree(store: &ReferralStore) {
        for id in ["root", "l1", "r1", "l2", "r2"] {
            store.upsert_member(&make_member(id)).unwrap();
        }
        store.set_sponsor("l1", "root").unwrap();
        store.set_sponsor("r1", "root").unwrap();
        store.set_sponsor("l2", "l1").unwrap();
        store.set_sponsor("r2", "r1").unwrap();
    }

    /// Force a cyclic edge set directly, bypassing set_sponsor's guard.
    fn seed_cycle_raw(store: &ReferralStore, ids: &[&str]) {
        for id in ids {
            store.upsert_member(&make_member(id)).unwrap();
        }
        for pair in ids.windows(2) {
            store
                .conn
                .execute(
                    "INSERT INTO referral_edges (member_id, sponsor_id) VALUES (?1, ?2)",
                    params![pair[1], pair[0]],
                )
                .unwrap();
        }
        store
            .conn
            .execute(
                "INSERT INTO referral_edges (member_id, sponsor_id) VALUES (?1, ?2)",
                params![ids[0], ids[ids.len() - 1]],
            )
            .unwrap();
    }

    // -- find_downline ----------------------------------------------------

    #[test]
    fn downline_follows_chain_with_depths() {
        let store = setup();
        seed_chain(&store);
        let walker = TreeWalker::new(&store);

        let downline = walker.find_downline("root", 10).unwrap();
        assert_eq!(downline.len(), 3);
        assert_eq!(downline[0].member.id, "a");
        assert_eq!(downline[0].depth, 1);
        assert_eq!(downline[1].member.id, "b");
        assert_eq!(downline[1].depth, 2);
        assert_eq!(downline[2].member.id, "c");
        assert_eq!(downline[2].depth, 3);
    }

    #[test]
    fn downline_respects_max_depth() {
        let store = setup();
        seed_chain(&store);
        let walker = TreeWalker::new(&store);

        let downline = walker.find_downline("root", 1).unwrap();
        assert_eq!(downline.len(), 1);
        assert_eq!(downline[0].member.id, "a");
    }

    #[test]
    fn downline_depth_zero_is_empty() {
        let store = setup();
        seed_chain(&store);
        let walker = TreeWalker::new(&store);

        assert!(walker.find_downline("root", 0).unwrap().is_empty());
    }

    #[test]
    fn downline_clamps_requested_depth() {
        let store = setup();
        seed_chain(&store);
        let walker = TreeWalker::new(&store);

        // Requesting far beyond the bound behaves the same as the bound.
        let huge = walker.find_downline("root", u32::MAX).unwrap();
        let capped = walker.find_downline("root", MAX_REFERRAL_DEPTH).unwrap();
        assert_eq!(huge.len(), capped.len());
    }

    #[test]
    fn downline_of_leaf_is_empty() {
        let store = setup();
        seed_chain(&store);
        let walker = TreeWalker::new(&store);

        assert!(walker.find_downline("c", 10).unwrap().is_empty());
    }

    #[test]
    fn downline_of_unknown_member_is_empty() {
        let store = setup();
        seed_chain(&store);
        let walker = TreeWalker::new(&store);

        assert!(walker.find_downline("ghost", 10).unwrap().is_empty());
    }

    #[test]
    fn downline_covers_branches() {
        let store = setup();
        seed_tree(&store);
        let walker = TreeWalker::new(&store);

        let downline = walker.find_downline("root", 10).unwrap();
        assert_eq!(downline.len(), 4);
        let at_depth_1: Vec<&str> = downline
            .iter()
            .filter(|e| e.depth == 1)
            .map(|e| e.member.id.as_str())
            .collect();
        assert_eq!(at_depth_1, vec!["l1", "r1"]);
        let at_depth_2: Vec<&str> = downline
            .iter()
            .filter(|e| e.depth == 2)
            .map(|e| e.member.id.as_str())
            .collect();
        assert_eq!(at_depth_2, vec!["l2", "r2"]);
    }

    #[test]
    fn downline_keeps_ids_that_are_substrings_of_others() {
        let store = setup();
        // "a" is a substring of "ab"; the cycle guard must not prune it.
        for id in ["root", "ab", "a"] {
            store.upsert_member(&make_member(id)).unwrap();
        }
        store.set_sponsor("ab", "root").unwrap();
        store.set_sponsor("a", "ab").unwrap();
        let walker = TreeWalker::new(&store);

        let downline = walker.find_downline("root", 10).unwrap();
        assert_eq!(downline.len(), 2);
        assert_eq!(downline[0].member.id, "ab");
        assert_eq!(downline[1].member.id, "a");
        assert_eq!(downline[1].depth, 2);
    }

    #[test]
    fn downline_terminates_on_cyclic_data() {
        let store = setup();
        seed_cycle_raw(&store, &["x", "y", "z"]);
        let walker = TreeWalker::new(&store);

        // The in-path guard stops recursion; the call must return.
        let downline = walker.find_downline("x", 50).unwrap();
        assert!(!downline.is_empty());
        assert!(downline.iter().any(|e| e.member.id == "y"));
    }

    #[test]
    fn direct_referrals_only_depth_one() {
        let store = setup();
        seed_tree(&store);
        let walker = TreeWalker::new(&store);

        let directs = walker.direct_referrals("root").unwrap();
        let ids: Vec<&str> = directs.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["l1", "r1"]);
    }

    // -- find_upline ------------------------------------------------------

    #[test]
    fn upline_climbs_to_root() {
        let store = setup();
        seed_chain(&store);
        let walker = TreeWalker::new(&store);

        let upline = walker.find_upline("c", 10).unwrap();
        assert_eq!(upline.len(), 3);
        assert_eq!(upline[0].member.id, "b");
        assert_eq!(upline[0].depth, 1);
        assert_eq!(upline[1].member.id, "a");
        assert_eq!(upline[2].member.id, "root");
        assert_eq!(upline[2].depth, 3);
    }

    #[test]
    fn upline_respects_max_depth() {
        let store = setup();
        seed_chain(&store);
        let walker = TreeWalker::new(&store);

        let upline = walker.find_upline("c", 2).unwrap();
        assert_eq!(upline.len(), 2);
        assert_eq!(upline.last().unwrap().member.id, "a");
    }

    #[test]
    fn upline_of_root_is_empty() {
        let store = setup();
        seed_chain(&store);
        let walker = TreeWalker::new(&store);

        assert!(walker.find_upline("root", 10).unwrap().is_empty());
    }

    #[test]
    fn upline_keeps_ids_that_are_substrings_of_others() {
        let store = setup();
        // Ancestor "a" is a substring of the intermediate "ab".
        for id in ["a", "ab", "x"] {
            store.upsert_member(&make_member(id)).unwrap();
        }
        store.set_sponsor("ab", "a").unwrap();
        store.set_sponsor("x", "ab").unwrap();
        let walker = TreeWalker::new(&store);

        let upline = walker.find_upline("x", 10).unwrap();
        assert_eq!(upline.len(), 2);
        assert_eq!(upline[0].member.id, "ab");
        assert_eq!(upline[1].member.id, "a");
        assert_eq!(upline[1].depth, 2);
    }

    #[test]
    fn upline_terminates_on_cyclic_data() {
        let store = setup();
        seed_cycle_raw(&store, &["x", "y", "z"]);
        let walker = TreeWalker::new(&store);

        let upline = walker.find_upline("x", 50).unwrap();
        assert!(!upline.is_empty());
    }

    #[test]
    fn deep_chain_walks_full_depth() {
        let store = setup();
        let n = 130usize;
        let ids: Vec<String> = (0..n).map(|i| format!("m{i:03}")).collect();
        for id in &ids {
            store.upsert_member(&make_member(id)).unwrap();
        }
        for i in 1..n {
            store.set_sponsor(&ids[i], &ids[i - 1]).unwrap();
        }

        let walker = TreeWalker::new(&store);
        let downline = walker.find_downline(&ids[0], MAX_REFERRAL_DEPTH).unwrap();
        // 129 descendants exist but the walk stops at 120 levels.
        assert_eq!(downline.len(), MAX_REFERRAL_DEPTH as usize);
        assert_eq!(downline.last().unwrap().depth, MAX_REFERRAL_DEPTH);

        let upline = walker.find_upline(&ids[n - 1], MAX_REFERRAL_DEPTH).unwrap();
        assert_eq!(upline.len(), MAX_REFERRAL_DEPTH as usize);
    }

    // -- sponsor_chain ----------------------------------------------------

    #[test]
    fn sponsor_chain_finds_ancestor_path() {
        let store = setup();
        seed_chain(&store);
        let walker = TreeWalker::new(&store);

        let chain = walker.sponsor_chain("c", "root").unwrap().unwrap();
        let ids: Vec<&str> = chain.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a", "root"]);
    }

    #[test]
    fn sponsor_chain_none_for_non_ancestor() {
        let store = setup();
        seed_tree(&store);
        let walker = TreeWalker::new(&store);

        // r1 is in a different branch, not in l2's upline.
        assert!(walker.sponsor_chain("l2", "r1").unwrap().is_none());
        // Downline members are not ancestors either.
        assert!(walker.sponsor_chain("root", "l1").unwrap().is_none());
    }

    #[test]
    fn sponsor_chain_self_is_singleton() {
        let store = setup();
        seed_chain(&store);
        let walker = TreeWalker::new(&store);

        let chain = walker.sponsor_chain("b", "b").unwrap().unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].id, "b");
    }

    #[test]
    fn sponsor_chain_unknown_member() {
        let store = setup();
        seed_chain(&store);
        let walker = TreeWalker::new(&store);

        assert!(walker.sponsor_chain("ghost", "root").unwrap().is_none());
    }

    // -- detect_cycles ----------------------------------------------------

    #[test]
    fn detect_cycles_empty_on_healthy_tree() {
        let store = setup();
        seed_tree(&store);
        let walker = TreeWalker::new(&store);

        assert!(walker.detect_cycles().unwrap().is_empty());
    }

    #[test]
    fn detect_cycles_finds_imported_cycle() {
        let store = setup();
        seed_cycle_raw(&store, &["x", "y", "z"]);
        let walker = TreeWalker::new(&store);

        let cycles = walker.detect_cycles().unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].size, 3);
        for id in ["x", "y", "z"] {
            assert!(cycles[0].member_ids.contains(&id.to_string()));
        }
    }

    #[test]
    fn detect_cycles_multiple_independent() {
        let store = setup();
        seed_cycle_raw(&store, &["x", "y"]);
        seed_cycle_raw(&store, &["p", "q", "r"]);
        let walker = TreeWalker::new(&store);

        let cycles = walker.detect_cycles().unwrap();
        assert_eq!(cycles.len(), 2);
        let sizes: Vec<usize> = cycles.iter().map(|c| c.size).collect();
        assert!(sizes.contains(&2));
        assert!(sizes.contains(&3));
    }

    #[test]
    fn detect_cycles_empty_graph() {
        let store = setup();
        let walker = TreeWalker::new(&store);
        assert!(walker.detect_cycles().unwrap().is_empty());
    }
}
