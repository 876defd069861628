//! Core matching algorithm.
//!
//! The engine is pure with respect to accounts: it never touches cash or
//! inventory, only the order book it's given and the orders that flow
//! through it. Settlement (crediting/debiting accounts) is the
//! `Exchange`'s job, done from the trades this engine returns.

use common::types::Side;
use tracing::debug;

use crate::book::OrderBook;
use crate::domain::{Order, Trade};

/// Result of crossing a taker order against the book. The taker itself is
/// returned so the caller can decide, based on time-in-force, whether to
/// rest the remainder.
pub struct MatchOutcome {
    pub trades: Vec<Trade>,
    pub taker: Order,
}

/// Crosses `taker` against the opposite side of `book`, in place.
///
/// `taker_side` is the side the incoming order is trying to join (Buy
/// crosses into asks, Sell crosses into bids). `next_sequence` is called
/// once per trade to assign a strictly increasing sequence number.
pub fn match_order(
    book: &mut OrderBook,
    mut taker: Order,
    taker_side: Side,
    next_sequence: &mut impl FnMut() -> u64,
) -> MatchOutcome {
    let maker_side = taker_side.opposite();
    let mut trades = Vec::new();

    while taker.remaining > 0 {
        let crosses = match book.peek_best(maker_side) {
            Some(maker) => match taker_side {
                Side::Buy => taker.price >= maker.price,
                Side::Sell => taker.price <= maker.price,
            },
            None => false,
        };
        if !crosses {
            break;
        }

        let maker = book.peek_best(maker_side).expect("checked above");
        let maker_price = maker.price;
        let maker_remaining = maker.remaining;
        let maker_order_id = maker.order_id;
        let maker_account_id = maker.account_id;
        let qty = taker.remaining.min(maker_remaining);

        taker.fill(qty);
        book.consume_head(maker_side, qty);

        let (buy_order_id, sell_order_id, buyer_id, seller_id) = match taker_side {
            Side::Buy => (
                taker.order_id,
                maker_order_id,
                taker.account_id,
                maker_account_id,
            ),
            Side::Sell => (
                maker_order_id,
                taker.order_id,
                maker_account_id,
                taker.account_id,
            ),
        };

        let trade = Trade::new(
            book.instrument.clone(),
            maker_price,
            qty,
            buyer_id,
            seller_id,
            buy_order_id,
            sell_order_id,
            next_sequence(),
        );
        debug!(
            instrument = %trade.instrument,
            price = %trade.price,
            quantity = trade.quantity,
            "trade executed"
        );
        trades.push(trade);
    }

    MatchOutcome { trades, taker }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use common::types::{AccountId, TimeInForce};

    fn order(price: i64, qty: u32) -> Order {
        Order::new(
            AccountId::new(),
            Money::from_i64(price),
            qty,
            TimeInForce::Day,
        )
    }

    #[test]
    fn full_cross_single_maker() {
        let mut book = OrderBook::new("T");
        book.add(order(100, 5), Side::Sell);
        let mut seq = 0u64;
        let outcome = match_order(&mut book, order(100, 5), Side::Buy, &mut || {
            seq += 1;
            seq
        });
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].quantity, 5);
        assert_eq!(outcome.trades[0].price, Money::from_i64(100));
        assert!(outcome.taker.is_filled());
        assert!(book.peek_best(Side::Sell).is_none());
    }

    #[test]
    fn sweeps_multiple_levels_in_price_order() {
        let mut book = OrderBook::new("T");
        book.add(order(99, 5), Side::Sell);
        book.add(order(100, 3), Side::Sell);
        let mut seq = 0u64;
        let outcome = match_order(&mut book, order(100, 8), Side::Buy, &mut || {
            seq += 1;
            seq
        });
        assert_eq!(outcome.trades.len(), 2);
        assert_eq!(outcome.trades[0].price, Money::from_i64(99));
        assert_eq!(outcome.trades[1].price, Money::from_i64(100));
        assert!(outcome.taker.is_filled());
    }

    #[test]
    fn maker_price_governs_execution() {
        let mut book = OrderBook::new("T");
        book.add(order(90, 5), Side::Sell);
        let mut seq = 0u64;
        let outcome = match_order(&mut book, order(100, 5), Side::Buy, &mut || {
            seq += 1;
            seq
        });
        assert_eq!(outcome.trades[0].price, Money::from_i64(90));
    }

    #[test]
    fn no_cross_leaves_taker_untouched() {
        let mut book = OrderBook::new("T");
        book.add(order(105, 5), Side::Sell);
        let mut seq = 0u64;
        let outcome = match_order(&mut book, order(100, 5), Side::Buy, &mut || {
            seq += 1;
            seq
        });
        assert!(outcome.trades.is_empty());
        assert_eq!(outcome.taker.remaining, 5);
    }
}
