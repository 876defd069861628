//! Per-instrument order book.
//!
//! Bids and asks are each a price-level ladder: a `BTreeMap` from price to
//! a FIFO queue of orders resting at that price. Iteration order on the
//! map gives best-price-first; `VecDeque::pop_front` gives earliest-at-that-
//! price-first. Price-time priority falls out of these two properties
//! without re-sorting anything on insert.

use std::cmp::Reverse;
use std::collections::{BTreeMap, VecDeque};

use common::types::{OrderId, Side};

use crate::domain::Order;
use crate::money::Money;

/// Price key ordered for descending iteration (best bid first).
type BidKey = Reverse<Money>;

#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    pub instrument: String,
    bids: BTreeMap<BidKey, VecDeque<Order>>,
    asks: BTreeMap<Money, VecDeque<Order>>,
}

/// A price level for snapshot/market-data purposes — no order identity
/// is leaked, only the aggregated quantity resting at that price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Money,
    pub quantity: u32,
}

impl OrderBook {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    pub fn best_bid(&self) -> Option<Money> {
        self.bids.keys().next().map(|k| k.0)
    }

    pub fn best_ask(&self) -> Option<Money> {
        self.asks.keys().next().copied()
    }

    /// Insert a resting order, re-establishing the sort invariant for its
    /// side: bids descending by price then ascending by sequence, asks
    /// ascending by both.
    pub fn add(&mut self, order: Order, side: Side) {
        match side {
            Side::Buy => self
                .bids
                .entry(Reverse(order.price))
                .or_default()
                .push_back(order),
            Side::Sell => self.asks.entry(order.price).or_default().push_back(order),
        }
    }

    /// Returns a reference to the best order on `side` without removing it.
    pub fn peek_best(&self, side: Side) -> Option<&Order> {
        match side {
            Side::Buy => self.bids.values().next().and_then(|q| q.front()),
            Side::Sell => self.asks.values().next().and_then(|q| q.front()),
        }
    }

    /// Decrement the head order's remaining quantity by `qty`. If it
    /// reaches zero, remove and return it (the "consumed maker"). If it
    /// still has quantity left, returns `None` — the head stays in place.
    pub fn consume_head(&mut self, side: Side, qty: u32) -> Option<Order> {
        let consumed = match side {
            Side::Buy => {
                let (key, queue) = self.bids.iter_mut().next()?;
                let key = *key;
                let order = queue.front_mut()?;
                order.fill(qty);
                let done = order.is_filled();
                let result = if done { queue.pop_front() } else { None };
                if queue.is_empty() {
                    self.bids.remove(&key);
                }
                result
            }
            Side::Sell => {
                let (key, queue) = self.asks.iter_mut().next()?;
                let key = *key;
                let order = queue.front_mut()?;
                order.fill(qty);
                let done = order.is_filled();
                let result = if done { queue.pop_front() } else { None };
                if queue.is_empty() {
                    self.asks.remove(&key);
                }
                result
            }
        };
        consumed
    }

    /// Find a resting order by id without removing it.
    pub fn find_by_id(&self, order_id: OrderId, side: Side) -> Option<&Order> {
        match side {
            Side::Buy => find_in(&self.bids, order_id),
            Side::Sell => find_in(&self.asks, order_id),
        }
    }

    pub fn remove_by_id(&mut self, order_id: OrderId, side: Side) -> Option<Order> {
        match side {
            Side::Buy => remove_from(&mut self.bids, order_id),
            Side::Sell => remove_from(&mut self.asks, order_id),
        }
    }

    /// Remove every resting order owned by `account_id` from both sides,
    /// returning each with the side it was resting on.
    pub fn remove_all_for_account(
        &mut self,
        account_id: common::types::AccountId,
    ) -> Vec<(Order, Side)> {
        let mut removed = Vec::new();
        remove_matching(&mut self.bids, account_id, Side::Buy, &mut removed);
        remove_matching(&mut self.asks, account_id, Side::Sell, &mut removed);
        removed
    }

    pub fn aggregate_levels(&self, side: Side) -> Vec<PriceLevel> {
        match side {
            Side::Buy => self
                .bids
                .iter()
                .map(|(price, q)| PriceLevel {
                    price: price.0,
                    quantity: q.iter().map(|o| o.remaining).sum(),
                })
                .collect(),
            Side::Sell => self
                .asks
                .iter()
                .map(|(price, q)| PriceLevel {
                    price: *price,
                    quantity: q.iter().map(|o| o.remaining).sum(),
                })
                .collect(),
        }
    }

    /// Total quantity available on the opposite side that would cross a
    /// taker limited at `limit_price` — used only by the FOK pre-check.
    pub fn available_crossing_quantity(&self, taker_side: Side, limit_price: Money) -> u32 {
        match taker_side {
            Side::Buy => self
                .asks
                .range(..=limit_price)
                .flat_map(|(_, q)| q.iter())
                .map(|o| o.remaining)
                .sum(),
            Side::Sell => self
                .bids
                .range(..=Reverse(limit_price))
                .flat_map(|(_, q)| q.iter())
                .map(|o| o.remaining)
                .sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

fn find_in<K: Ord>(book_side: &BTreeMap<K, VecDeque<Order>>, order_id: OrderId) -> Option<&Order> {
    book_side
        .values()
        .find_map(|queue| queue.iter().find(|o| o.order_id == order_id))
}

fn remove_from(
    book_side: &mut BTreeMap<impl Ord + Copy, VecDeque<Order>>,
    order_id: OrderId,
) -> Option<Order> {
    let mut empty_key = None;
    let mut found = None;
    for (key, queue) in book_side.iter_mut() {
        if let Some(pos) = queue.iter().position(|o| o.order_id == order_id) {
            found = queue.remove(pos);
            if queue.is_empty() {
                empty_key = Some(*key);
            }
            break;
        }
    }
    if let Some(key) = empty_key {
        book_side.remove(&key);
    }
    found
}

fn remove_matching<K: Ord + Copy>(
    book_side: &mut BTreeMap<K, VecDeque<Order>>,
    account_id: common::types::AccountId,
    side: Side,
    out: &mut Vec<(Order, Side)>,
) {
    let mut empty_keys = Vec::new();
    for (key, queue) in book_side.iter_mut() {
        queue.retain(|o| {
            if o.account_id == account_id {
                out.push((o.clone(), side));
                false
            } else {
                true
            }
        });
        if queue.is_empty() {
            empty_keys.push(*key);
        }
    }
    for key in empty_keys {
        book_side.remove(&key);
    }
}
