//! Canonical JSON serialization and timestamp formatting.
//!
//! Every hash in the ledger is computed over canonical JSON: object keys
//! sorted lexicographically at every depth, UTF-8, compact separators, and
//! ISO-8601 UTC timestamps at second precision. Two runs (or two mirrors)
//! serializing the same value must produce identical bytes, otherwise every
//! verification property downstream breaks.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Serialize a value to canonical JSON.
///
/// Routing through `serde_json::Value` sorts object keys at every depth
/// (its map type is BTreeMap-backed); `to_string` emits compact separators.
pub fn to_canonical_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let value = serde_json::to_value(value)?;
    serde_json::to_string(&value)
}

/// Format a timestamp the way the ledger stores it: `2026-03-01T12:00:00Z`.
///
/// Timestamps are kept as pre-formatted strings in every record so canonical
/// hashing never depends on serializer precision behavior.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current UTC time in ledger format.
pub fn now_utc() -> String {
    format_timestamp(Utc::now())
}
