//! Intent ID derivation — the input to
//! [`crate::gateway::intent_id_to_client_order_id`].
//!
//! `intent_id = symbol:ts:hash(intent)`, where `hash` is a fixed FNV-1a over
//! the intent's semantic fields (side, qty, stop/target prices). Using a
//! hand-rolled FNV-1a rather than `std::collections::hash_map::DefaultHasher`
//! matters here: `DefaultHasher`'s algorithm is not guaranteed stable across
//! Rust versions, and a retried order after a process restart must derive
//! the exact same client order id or the broker sees it as a new order.

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Hashes the semantic content of an order intent: anything that, if
/// changed, should mint a new intent id rather than collide with a prior
/// retry's.
pub fn intent_hash(fields: &[&str]) -> u64 {
    let joined = fields.join("\u{1f}");
    fnv1a(joined.as_bytes())
}

/// Derives a stable `intent_id` from `(symbol, ts, intent_hash)`. Same
/// inputs always produce the same id, so a retried submit reuses the same
/// `client_order_id` (see `gateway::intent_id_to_client_order_id`) and the
/// broker de-duplicates it.
pub fn derive_intent_id(symbol: &str, ts: i64, hash: u64) -> String {
    format!("{symbol}-{ts}-{hash:016x}")
}
