//! SQLite schema initialization for reftree.
//!
//! DDL statements are kept as separate constants so each can be executed
//! individually, which makes error reporting clearer than one big batch.

use rusqlite::Connection;

// ---------------------------------------------------------------------------
// DDL constants
// ---------------------------------------------------------------------------

const CREATE_MEMBERS: &str = "\
CREATE TABLE IF NOT EXISTS members (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  email TEXT,
  joined_at INTEGER NOT NULL,
  kyc_status TEXT NOT NULL DEFAULT 'unverified'
)";

// One sponsor per member: member_id is the primary key, not (member, sponsor).
const CREATE_REFERRAL_EDGES: &str = "\
CREATE TABLE IF NOT EXISTS referral_edges (
  member_id TEXT PRIMARY KEY,
  sponsor_id TEXT NOT NULL,
  FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE,
  FOREIGN KEY (sponsor_id) REFERENCES members(id) ON DELETE CASCADE
)";

const CREATE_PACKAGES: &str = "\
CREATE TABLE IF NOT EXISTS packages (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  tier TEXT NOT NULL,
  price_cents INTEGER NOT NULL,
  active INTEGER NOT NULL DEFAULT 1
)";

const CREATE_PURCHASES: &str = "\
CREATE TABLE IF NOT EXISTS purchases (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  member_id TEXT NOT NULL,
  package_id TEXT NOT NULL,
  price_cents INTEGER NOT NULL,
  purchased_at INTEGER NOT NULL,
  FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE,
  FOREIGN KEY (package_id) REFERENCES packages(id)
)";

const CREATE_COMMISSIONS: &str = "\
CREATE TABLE IF NOT EXISTS commissions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  purchase_id INTEGER NOT NULL,
  beneficiary_id TEXT NOT NULL,
  buyer_id TEXT NOT NULL,
  level INTEGER NOT NULL,
  amount_cents INTEGER NOT NULL,
  created_at INTEGER NOT NULL,
  FOREIGN KEY (purchase_id) REFERENCES purchases(id) ON DELETE CASCADE,
  FOREIGN KEY (beneficiary_id) REFERENCES members(id) ON DELETE CASCADE,
  FOREIGN KEY (buyer_id) REFERENCES members(id) ON DELETE CASCADE
)";

const CREATE_WALLET_LEDGER: &str = "\
CREATE TABLE IF NOT EXISTS wallet_ledger (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  member_id TEXT NOT NULL,
  kind TEXT NOT NULL,
  amount_cents INTEGER NOT NULL,
  note TEXT,
  created_at INTEGER NOT NULL,
  FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE
)";

const CREATE_PAYOUT_REQUESTS: &str = "\
CREATE TABLE IF NOT EXISTS payout_requests (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  member_id TEXT NOT NULL,
  gross_cents INTEGER NOT NULL,
  tds_cents INTEGER NOT NULL,
  net_cents INTEGER NOT NULL,
  status TEXT NOT NULL DEFAULT 'pending',
  requested_at INTEGER NOT NULL,
  settled_at INTEGER,
  FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE
)";

// Indexes ----------------------------------------------------------------

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_edges_sponsor ON referral_edges(sponsor_id)",
    "CREATE INDEX IF NOT EXISTS idx_purchases_member ON purchases(member_id)",
    "CREATE INDEX IF NOT EXISTS idx_purchases_time ON purchases(purchased_at)",
    "CREATE INDEX IF NOT EXISTS idx_commissions_beneficiary ON commissions(beneficiary_id)",
    "CREATE INDEX IF NOT EXISTS idx_commissions_time ON commissions(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_ledger_member ON wallet_ledger(member_id)",
    "CREATE INDEX IF NOT EXISTS idx_payouts_member ON payout_requests(member_id, status)",
];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Open (or create) the SQLite database at `db_path` and apply the full
/// reftree schema.
///
/// The returned connection has WAL mode, foreign keys ON, and synchronous
/// NORMAL already configured.
///
/// # Errors
///
/// Returns a `rusqlite::Error` if the database cannot be opened or any DDL
/// statement fails.
pub fn initialize_database(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;

    // -- Pragmas ----------------------------------------------------------
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Every edge endpoint is a real members row, so FK enforcement stays on.
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    // -- Tables -----------------------------------------------------------
    conn.execute_batch(CREATE_MEMBERS)?;
    conn.execute_batch(CREATE_REFERRAL_EDGES)?;
    conn.execute_batch(CREATE_PACKAGES)?;
    conn.execute_batch(CREATE_PURCHASES)?;
    conn.execute_batch(CREATE_COMMISSIONS)?;
    conn.execute_batch(CREATE_WALLET_LEDGER)?;
    conn.execute_batch(CREATE_PAYOUT_REQUESTS)?;

    // -- Indexes ----------------------------------------------------------
    for ddl in CREATE_INDEXES {
        conn.execute_batch(ddl)?;
    }

    Ok(conn)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
