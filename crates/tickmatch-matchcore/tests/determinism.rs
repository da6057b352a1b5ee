//! Integration test: determinism and conservation on randomized markets
//!
//! Given the same book, pools and batch context, any node must produce the
//! exact same `match_root`, and every matched batch must conserve base and
//! quote exactly.

use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tickmatch_amm::Pool;
use tickmatch_matchcore::{MatchEngine, OrderBook, verify_conservation, verify_match_root};
use tickmatch_types::*;

fn ctx(batch: u64) -> BatchContext {
    BatchContext {
        batch_id: BatchId(batch),
        block_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        last_price: None,
    }
}

/// Orders on 0.01 steps between 0.90 and 1.10.
fn random_orders(rng: &mut StdRng, count: u64) -> Vec<Order> {
    (1..=count)
        .map(|id| {
            let cents: i64 = rng.gen_range(90..=110);
            let price = Dec::new(i128::from(cents), 2);
            let amount = Dec::from_int(rng.gen_range(1..=1000));
            let direction = if rng.gen_bool(0.5) {
                Direction::Buy
            } else {
                Direction::Sell
            };
            Order::new_limit(OrderId(id), direction, price, amount, id).unwrap()
        })
        .collect()
}

fn build_book(engine: &MatchEngine, orders: &[Order]) -> OrderBook {
    let mut book = OrderBook::new(engine.grid().clone());
    book.add_orders(orders.iter().cloned()).unwrap();
    book
}

#[test]
fn two_engines_same_root() {
    let mut rng = StdRng::seed_from_u64(7);
    let orders = random_orders(&mut rng, 40);
    let pools = [Pool::dummy_basic(1, 2_000_000, 2_000_000)];

    let engine_a = MatchEngine::new(MatchConfig::default()).unwrap();
    let engine_b = MatchEngine::new(MatchConfig::default()).unwrap();
    let a = engine_a.run_batch(&ctx(100), &build_book(&engine_a, &orders), &pools).unwrap();
    let b = engine_b.run_batch(&ctx(100), &build_book(&engine_b, &orders), &pools).unwrap();

    assert_eq!(a, b);
    if let (Some(ra), Some(rb)) = (a.result(), b.result()) {
        assert_eq!(
            ra.match_root,
            rb.match_root,
            "same input must produce the same match_root.\nA: {}\nB: {}",
            hex::encode(ra.match_root),
            hex::encode(rb.match_root),
        );
    }
}

#[test]
fn insertion_order_does_not_change_the_result() {
    let mut rng = StdRng::seed_from_u64(11);
    let orders = random_orders(&mut rng, 30);
    let mut reversed = orders.clone();
    reversed.reverse();

    let engine = MatchEngine::new(MatchConfig::default()).unwrap();
    let a = engine.run_batch(&ctx(1), &build_book(&engine, &orders), &[]).unwrap();
    let b = engine.run_batch(&ctx(1), &build_book(&engine, &reversed), &[]).unwrap();
    assert_eq!(a, b);
}

#[test]
fn random_batches_conserve_and_clear_consistently() {
    let mut rng = StdRng::seed_from_u64(2024);
    let engine = MatchEngine::new(MatchConfig::default()).unwrap();

    for round in 0..24 {
        let orders = random_orders(&mut rng, 20);
        let mut book = build_book(&engine, &orders);
        let mut pools = if round % 2 == 0 {
            vec![Pool::dummy_basic(1, 500_000, 500_000)]
        } else {
            Vec::new()
        };

        let outcome = engine.run_batch(&ctx(round), &book, &pools).unwrap();
        let Some(result) = outcome.result() else {
            continue;
        };
        verify_conservation(result).unwrap();
        assert!(verify_match_root(result));
        assert!(!result.dust.is_negative());

        for fill in &result.fills {
            match fill.direction {
                Direction::Buy => assert!(fill.order_price >= result.price),
                Direction::Sell => assert!(fill.order_price <= result.price),
            }
        }

        // Without exclusions, every book order strictly better than the
        // price is filled completely.
        if result.excluded.is_empty() {
            for order in &orders {
                let better = match order.direction {
                    Direction::Buy => order.price > result.price,
                    Direction::Sell => order.price < result.price,
                };
                if better {
                    let fill = result.fill_of(OrderRef::Order(order.id)).unwrap();
                    assert_eq!(fill.filled_amount, order.amount, "round {round}: {}", order.id);
                }
            }
        }

        MatchEngine::apply_outcome(result, &mut book, &mut pools).unwrap();
        for order in &orders {
            let after = book.order(order.id).unwrap();
            assert!(!after.open_amount.is_negative());
            assert!(!after.remaining_offer.is_negative());
        }
    }
}
