//! Row-to-domain-type conversion helpers.
//!
//! Every converter reads columns by name so callers can select extra
//! columns (e.g. a traversal depth) alongside `table.*` without breaking
//! the mapping.

use rusqlite::Row;

use crate::error::{ReftreeError, Result};
use crate::types::{
    Commission, KycStatus, LedgerEntry, LedgerKind, Member, Package, PackageTier, PayoutRequest,
    PayoutStatus, Purchase,
};

pub fn row_to_member(row: &Row) -> Result<Member> {
    let kyc_raw: String = row.get("kyc_status")?;
    let kyc_status = KycStatus::from_str_loose(&kyc_raw)
        .ok_or_else(|| ReftreeError::Corrupt(format!("unknown kyc_status '{kyc_raw}'")))?;
    Ok(Member {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        joined_at: row.get("joined_at")?,
        kyc_status,
    })
}

pub fn row_to_package(row: &Row) -> Result<Package> {
    let tier_raw: String = row.get("tier")?;
    let tier = PackageTier::from_str_loose(&tier_raw)
        .ok_or_else(|| ReftreeError::Corrupt(format!("unknown package tier '{tier_raw}'")))?;
    let active: i64 = row.get("active")?;
    Ok(Package {
        id: row.get("id")?,
        name: row.get("name")?,
        tier,
        price_cents: row.get("price_cents")?,
        active: active != 0,
    })
}

pub fn row_to_purchase(row: &Row) -> Result<Purchase> {
    Ok(Purchase {
        id: row.get("id")?,
        member_id: row.get("member_id")?,
        package_id: row.get("package_id")?,
        price_cents: row.get("price_cents")?,
        purchased_at: row.get("purchased_at")?,
    })
}

pub fn row_to_commission(row: &Row) -> Result<Commission> {
    Ok(Commission {
        id: row.get("id")?,
        purchase_id: row.get("purchase_id")?,
        beneficiary_id: row.get("beneficiary_id")?,
        buyer_id: row.get("buyer_id")?,
        level: row.get("level")?,
        amount_cents: row.get("amount_cents")?,
        created_at: row.get("created_at")?,
    })
}

pub fn row_to_ledger_entry(row: &Row) -> Result<LedgerEntry> {
    let kind_raw: String = row.get("kind")?;
    let kind = LedgerKind::from_str_loose(&kind_raw)
        .ok_or_else(|| ReftreeError::Corrupt(format!("unknown ledger kind '{kind_raw}'")))?;
    Ok(LedgerEntry {
        id: row.get("id")?,
        member_id: row.get("member_id")?,
        kind,
        amount_cents: row.get("amount_cents")?,
        note: row.get("note")?,
        created_at: row.get("created_at")?,
    })
}

pub fn row_to_payout_request(row: &Row) -> Result<PayoutRequest> {
    let status_raw: String = row.get("status")?;
    let status = PayoutStatus::from_str_loose(&status_raw)
        .ok_or_else(|| ReftreeError::Corrupt(format!("unknown payout status '{status_raw}'")))?;
    Ok(PayoutRequest {
        id: row.get("id")?,
        member_id: row.get("member_id")?,
        gross_cents: row.get("gross_cents")?,
        tds_cents: row.get("tds_cents")?,
        net_cents: row.get("net_cents")?,
        status,
        requested_at: row.get("requested_at")?,
        settled_at: row.get("settled_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::initialize_database;

    #[test]
    fn member_roundtrip() {
        let conn = initialize_database(":memory:").unwrap();
        conn.execute(
            "INSERT INTO members (id, name, email, joined_at, kyc_status)
             VALUES ('m1', 'Asha', 'a@example.com', 42, 'approved')",
            [],
        )
        .unwrap();

        let member = conn
            .query_row("SELECT * FROM members WHERE id = 'm1'", [], |row| {
                Ok(row_to_member(row))
            })
            .unwrap()
            .unwrap();
        assert_eq!(member.id, "m1");
        assert_eq!(member.email.as_deref(), Some("a@example.com"));
        assert_eq!(member.kyc_status, KycStatus::Approved);
    }

    #[test]
    fn corrupt_kyc_status_is_rejected() {
        let conn = initialize_database(":memory:").unwrap();
        conn.execute(
            "INSERT INTO members (id, name, joined_at, kyc_status)
             VALUES ('m1', 'Asha', 42, 'weird')",
            [],
        )
        .unwrap();

        let result = conn
            .query_row("SELECT * FROM members WHERE id = 'm1'", [], |row| {
                Ok(row_to_member(row))
            })
            .unwrap();
        assert!(matches!(result, Err(ReftreeError::Corrupt(_))));
    }

    #[test]
    fn package_active_flag() {
        let conn = initialize_database(":memory:").unwrap();
        conn.execute(
            "INSERT INTO packages (id, name, tier, price_cents, active)
             VALUES ('p1', 'Gold Pack', 'gold', 250000, 0)",
            [],
        )
        .unwrap();

        let package = conn
            .query_row("SELECT * FROM packages WHERE id = 'p1'", [], |row| {
                Ok(row_to_package(row))
            })
            .unwrap()
            .unwrap();
        assert_eq!(package.tier, PackageTier::Gold);
        assert!(!package.active);
    }
}
