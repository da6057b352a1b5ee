//! Settlement of a batch at its clearing price.
//!
//! Orders strictly better than the price fill completely. Walking each side
//! from the best tick toward the price, open amounts accumulate until the
//! matched volume `min(total buy, total sell)` is used up; only the last
//! order reached on a side may fill partially.
//!
//! Quote legs round against the trader: a buyer pays `ceil(price × filled)`,
//! a seller receives `trunc(price × filled)`. An order whose rounded leg is
//! unpayable (zero receipt, or a payment above its escrow) sits this batch
//! out and settlement runs again without it until nothing changes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tickmatch_types::{
    Dec, Direction, ExcludedOrder, ExclusionReason, Fill, OrderRef, PoolDelta, Result,
};
use tracing::warn;

use crate::OrderView;
use crate::source::{OrderSource, SourceOrder};

/// Everything settled at one clearing price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub matched_amount: Dec,
    /// Buys in priority order, then sells.
    pub fills: Vec<Fill>,
    pub excluded: Vec<ExcludedOrder>,
    /// Ordered by pool id.
    pub pool_deltas: Vec<PoolDelta>,
    /// Σ buy payments − Σ sell receipts.
    pub dust: Dec,
}

/// One order's share of the matched volume, before rounding.
#[derive(Debug, Clone)]
struct Allocation {
    order: OrderRef,
    direction: Direction,
    /// Tick of the last filled entry, the one closest to the price.
    order_price: Dec,
    filled: Dec,
    /// Open amount across the entries that participated.
    open: Dec,
    offer: Dec,
}

/// Orders of both sides that cross `price`, each side in priority order.
fn participants(
    source: &mut OrderSource<'_>,
    view: &OrderView,
    price: Dec,
) -> Result<(Vec<SourceOrder>, Vec<SourceOrder>)> {
    let mut buys = Vec::new();
    for tick in view.ticks(Direction::Buy).iter().take_while(|t| t.price >= price) {
        buys.extend(source.orders_at_tick(Direction::Buy, tick.price)?);
    }
    let mut sells = Vec::new();
    for tick in view.ticks(Direction::Sell).iter().take_while(|t| t.price <= price) {
        sells.extend(source.orders_at_tick(Direction::Sell, tick.price)?);
    }
    Ok((buys, sells))
}

fn total(side: &[SourceOrder], excluded: &BTreeSet<OrderRef>) -> Result<Dec> {
    side.iter()
        .filter(|o| !excluded.contains(&o.order))
        .try_fold(Dec::ZERO, |acc, o| acc.checked_add(o.amount))
}

/// Hand out `matched` along the side's priority order.
fn allocate(
    side: &[SourceOrder],
    excluded: &BTreeSet<OrderRef>,
    matched: Dec,
) -> Result<Vec<Allocation>> {
    let mut out: Vec<Allocation> = Vec::new();
    let mut position: BTreeMap<OrderRef, usize> = BTreeMap::new();
    let mut remaining = matched;
    for entry in side.iter().filter(|o| !excluded.contains(&o.order)) {
        if remaining.is_zero() {
            break;
        }
        let filled = entry.amount.min(remaining);
        remaining = remaining.checked_sub(filled)?;
        if let Some(&at) = position.get(&entry.order) {
            let alloc = &mut out[at];
            alloc.filled = alloc.filled.checked_add(filled)?;
            alloc.open = alloc.open.checked_add(entry.amount)?;
            alloc.order_price = entry.price;
        } else {
            position.insert(entry.order, out.len());
            out.push(Allocation {
                order: entry.order,
                direction: entry.direction,
                order_price: entry.price,
                filled,
                open: entry.amount,
                offer: entry.offer,
            });
        }
    }
    Ok(out)
}

/// Round one allocation's quote leg; `Err(reason)` if it cannot settle.
fn quote_leg(alloc: &Allocation, price: Dec) -> Result<std::result::Result<(Dec, Dec), ExclusionReason>> {
    let exact = price.mul_truncate(alloc.filled)?;
    Ok(match alloc.direction {
        Direction::Buy => {
            let pay = price.mul_round_up(alloc.filled)?.ceil()?;
            if pay > alloc.offer {
                Err(ExclusionReason::InsufficientOffer)
            } else {
                Ok((pay, pay.checked_sub(exact)?))
            }
        }
        Direction::Sell => {
            let receive = exact.truncate();
            if receive.is_zero() {
                Err(ExclusionReason::ZeroReceipt)
            } else if alloc.filled > alloc.offer {
                Err(ExclusionReason::InsufficientOffer)
            } else {
                Ok((receive, exact.checked_sub(receive)?))
            }
        }
    })
}

/// Settle every crossing order of `source` at `price`.
pub fn settle(source: &mut OrderSource<'_>, view: &OrderView, price: Dec) -> Result<Settlement> {
    let (buys, sells) = participants(source, view, price)?;
    let mut excluded_refs: BTreeSet<OrderRef> = BTreeSet::new();
    let mut excluded: Vec<ExcludedOrder> = Vec::new();

    loop {
        let matched = total(&buys, &excluded_refs)?.min(total(&sells, &excluded_refs)?);
        let allocations: Vec<Allocation> = allocate(&buys, &excluded_refs, matched)?
            .into_iter()
            .chain(allocate(&sells, &excluded_refs, matched)?)
            .collect();

        let mut fills = Vec::with_capacity(allocations.len());
        let mut newly_excluded = false;
        for alloc in &allocations {
            match quote_leg(alloc, price)? {
                Ok((quote_amount, dust)) => fills.push(Fill {
                    order: alloc.order,
                    direction: alloc.direction,
                    order_price: alloc.order_price,
                    filled_amount: alloc.filled,
                    quote_amount,
                    dust,
                    partial: alloc.filled < alloc.open,
                }),
                Err(reason) => {
                    warn!(
                        order = %alloc.order,
                        direction = %alloc.direction,
                        amount = %alloc.filled,
                        %reason,
                        "order excluded from settlement by rounding"
                    );
                    excluded_refs.insert(alloc.order);
                    excluded.push(ExcludedOrder {
                        order: alloc.order,
                        direction: alloc.direction,
                        reason,
                        prospective_amount: alloc.filled,
                    });
                    newly_excluded = true;
                }
            }
        }
        if newly_excluded {
            continue;
        }

        let mut dust = Dec::ZERO;
        let mut deltas: BTreeMap<OrderRef, PoolDelta> = BTreeMap::new();
        for fill in &fills {
            dust = dust.checked_add(fill.quote_flow())?;
            if let OrderRef::Pool(pool) = fill.order {
                deltas
                    .entry(fill.order)
                    .or_insert_with(|| PoolDelta::new(pool))
                    .absorb(fill)?;
            }
        }
        return Ok(Settlement {
            matched_amount: matched,
            fills,
            excluded,
            pool_deltas: deltas.into_values().collect(),
            dust,
        });
    }
}
