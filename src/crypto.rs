//! Cryptographic primitives for the transparency ledger.
//!
//! Everything here is SHA-256 over canonical JSON or over ASCII hex digests.
//! The ledger has four hashing roles:
//!
//! - canonical hash: `H(x) = SHA256(canonical_json(x))`
//! - chain hash: `Hc(data, prev) = SHA256(canonical_json(data) || prev)`
//!   with `prev` as ASCII hex, linking each audit event to its predecessor
//! - node hash: `Hn(l, r) = SHA256(l || r)` over ASCII hex concatenation,
//!   used for Merkle tree levels
//! - anonymous id: `anon_` + first 12 hex of `SHA256(identity || "||" || salt)`
//!
//! All digests are lowercase hex, 64 characters. Same input must hash the
//! same across runs and platforms; the canonical serialization in
//! [`crate::canonical`] carries that invariant.

use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical::to_canonical_json;
use crate::error::{LedgerError, Result};

/// The previous-hash value of the genesis event: 64 zeros.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Prefix carried by every issued API key.
pub const API_KEY_PREFIX: &str = "afr_";

/// SHA-256 of raw bytes as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Canonical hash: SHA-256 over the canonical JSON form of `value`.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<String> {
    let canonical = to_canonical_json(value)
        .map_err(|e| LedgerError::Persistence(format!("canonicalization failed: {e}")))?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Chain hash: SHA-256 over canonical JSON with the predecessor's hex digest
/// appended as ASCII.
pub fn chain_hash<T: Serialize>(data: &T, previous_hash: &str) -> Result<String> {
    let canonical = to_canonical_json(data)
        .map_err(|e| LedgerError::Persistence(format!("canonicalization failed: {e}")))?;
    let mut buf = canonical.into_bytes();
    buf.extend_from_slice(previous_hash.as_bytes());
    Ok(sha256_hex(&buf))
}

/// Merkle node hash over the ASCII concatenation of two hex digests.
pub fn node_hash(left: &str, right: &str) -> String {
    let mut buf = Vec::with_capacity(left.len() + right.len());
    buf.extend_from_slice(left.as_bytes());
    buf.extend_from_slice(right.as_bytes());
    sha256_hex(&buf)
}

/// Derive an anonymous reporter id from a client-side identity and salt.
///
/// The inputs are hashed and discarded; the server never persists them.
pub fn anonymous_id(identity: &str, salt: &str) -> String {
    let digest = sha256_hex(format!("{identity}||{salt}").as_bytes());
    format!("anon_{}", &digest[..12])
}

/// Generate a fresh API key: `afr_` followed by 32 random bytes in hex.
pub fn generate_api_key() -> String {
    format!("{API_KEY_PREFIX}{}", random_hex_32())
}

/// Generate a fresh 32-byte blinding factor in hex.
pub fn generate_blinding() -> String {
    random_hex_32()
}

fn random_hex_32() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Check a string is a well-formed lowercase SHA-256 hex digest.
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Check a string is a well-formed anonymous id (`anon_` + 12 hex).
pub fn is_anonymous_id(s: &str) -> bool {
    s.len() == 17
        && s.starts_with("anon_")
        && s.as_bytes()[5..]
            .iter()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
