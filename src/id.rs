//! Referral-code generation.
//!
//! Member ids double as shareable referral codes. They are content-derived
//! (SHA-256 over name, sponsor, and join time) so bulk imports of the same
//! roster produce the same codes.

use sha2::{Digest, Sha256};

/// Length of a referral code in hex characters.
const CODE_LEN: usize = 12;

/// Derive a referral code from the registering member's details.
///
/// Collisions at 48 bits are vanishingly unlikely at platform scale; the
/// store's primary-key constraint still catches one if it ever happens.
pub fn referral_code(name: &str, sponsor_id: Option<&str>, joined_at: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b"\0");
    hasher.update(sponsor_id.unwrap_or("").as_bytes());
    hasher.update(b"\0");
    hasher.update(joined_at.to_be_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..CODE_LEN / 2])
}
