//! Determinism verification utilities for cross-node consistency.
//!
//! Every node matching the same book and pools in the same batch context
//! must produce the exact same `MatchResult`. The `match_root` is a SHA-256
//! commitment over the result that enables quick verification without
//! comparing full payloads.

use sha2::{Digest, Sha256};
use tickmatch_types::{Direction, ExclusionReason, MatchResult, OrderRef};

fn ref_bytes(order: OrderRef) -> [u8; 9] {
    let (tag, id) = match order {
        OrderRef::Order(id) => (0u8, id.0),
        OrderRef::Pool(id) => (1u8, id.0),
    };
    let mut out = [0u8; 9];
    out[0] = tag;
    out[1..].copy_from_slice(&id.to_le_bytes());
    out
}

fn direction_byte(direction: Direction) -> u8 {
    match direction {
        Direction::Buy => 0,
        Direction::Sell => 1,
    }
}

fn reason_byte(reason: ExclusionReason) -> u8 {
    match reason {
        ExclusionReason::ZeroReceipt => 0,
        ExclusionReason::InsufficientOffer => 1,
    }
}

/// Compute the match root of a result.
///
/// Covers the batch id, clearing price, matched amount, every fill and
/// exclusion (in order), every pool delta and the dust. Decimals are hashed
/// in canonical text form. `matched_at` and `match_root` itself are not
/// covered.
#[must_use]
pub fn compute_match_root(result: &MatchResult) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"tickmatch:match_root:v1:");
    hasher.update(result.batch_id.0.to_le_bytes());
    hasher.update(result.price.to_canonical_string().as_bytes());
    hasher.update(b"|");
    hasher.update(result.matched_amount.to_canonical_string().as_bytes());
    hasher.update(b"|");

    hasher.update((result.fills.len() as u64).to_le_bytes());
    for fill in &result.fills {
        hasher.update(ref_bytes(fill.order));
        hasher.update([direction_byte(fill.direction), u8::from(fill.partial)]);
        for value in [fill.order_price, fill.filled_amount, fill.quote_amount, fill.dust] {
            hasher.update(value.to_canonical_string().as_bytes());
            hasher.update(b"|");
        }
    }

    hasher.update((result.excluded.len() as u64).to_le_bytes());
    for excluded in &result.excluded {
        hasher.update(ref_bytes(excluded.order));
        hasher.update([direction_byte(excluded.direction), reason_byte(excluded.reason)]);
        hasher.update(excluded.prospective_amount.to_canonical_string().as_bytes());
        hasher.update(b"|");
    }

    hasher.update((result.pool_deltas.len() as u64).to_le_bytes());
    for delta in &result.pool_deltas {
        hasher.update(delta.pool.0.to_le_bytes());
        hasher.update(delta.base_delta.to_canonical_string().as_bytes());
        hasher.update(b"|");
        hasher.update(delta.quote_delta.to_canonical_string().as_bytes());
        hasher.update(b"|");
    }

    hasher.update(result.dust.to_canonical_string().as_bytes());
    hasher.update(result.dust_collector.as_bytes());

    let digest = hasher.finalize();
    let mut root = [0u8; 32];
    root.copy_from_slice(&digest);
    root
}

/// Recompute the root and compare with the one the result carries.
#[must_use]
pub fn verify_match_root(result: &MatchResult) -> bool {
    compute_match_root(result) == result.match_root
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tickmatch_types::*;

    use super::*;

    fn make_fill(id: u64, direction: Direction, filled: i64) -> Fill {
        Fill {
            order: OrderRef::Order(OrderId(id)),
            direction,
            order_price: Dec::ONE,
            filled_amount: Dec::from_int(filled),
            quote_amount: Dec::from_int(filled),
            dust: Dec::ZERO,
            partial: false,
        }
    }

    fn make_result(fills: Vec<Fill>) -> MatchResult {
        MatchResult {
            batch_id: BatchId(7),
            matched_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            price: Dec::ONE,
            matched_amount: Dec::from_int(10),
            fills,
            excluded: Vec::new(),
            pool_deltas: Vec::new(),
            dust: Dec::ZERO,
            dust_collector: "dust".to_string(),
            match_root: [0u8; 32],
        }
    }

    #[test]
    fn same_result_same_root() {
        let r = make_result(vec![make_fill(1, Direction::Buy, 10), make_fill(2, Direction::Sell, 10)]);
        assert_eq!(compute_match_root(&r), compute_match_root(&r.clone()));
    }

    #[test]
    fn fill_order_matters() {
        let a = make_fill(1, Direction::Buy, 10);
        let b = make_fill(2, Direction::Sell, 10);
        let ab = make_result(vec![a.clone(), b.clone()]);
        let ba = make_result(vec![b, a]);
        assert_ne!(compute_match_root(&ab), compute_match_root(&ba));
    }

    #[test]
    fn book_order_and_pool_with_same_number_differ() {
        let mut pool_fill = make_fill(1, Direction::Buy, 10);
        pool_fill.order = OrderRef::Pool(PoolId(1));
        let book = make_result(vec![make_fill(1, Direction::Buy, 10)]);
        let pool = make_result(vec![pool_fill]);
        assert_ne!(compute_match_root(&book), compute_match_root(&pool));
    }

    #[test]
    fn timestamp_and_stored_root_are_not_covered() {
        let a = make_result(vec![make_fill(1, Direction::Buy, 10)]);
        let mut b = a.clone();
        b.matched_at = Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap();
        b.match_root = [0xAB; 32];
        assert_eq!(compute_match_root(&a), compute_match_root(&b));
    }

    #[test]
    fn verify_correct_and_wrong_root() {
        let mut r = make_result(vec![make_fill(1, Direction::Buy, 10)]);
        r.match_root = compute_match_root(&r);
        assert!(verify_match_root(&r));
        r.dust = Dec::ONE;
        assert!(!verify_match_root(&r));
    }
}
