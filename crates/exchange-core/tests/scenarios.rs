//! End-to-end scenarios against the public `Exchange` API: one trader
//! crossing against a resting counterparty, covering each time-in-force
//! and the escrow/refund accounting that goes with it.

use common::types::{Side, TimeInForce};
use exchange_core::{Account, Exchange, ExchangeError, Money, Order};

const SYMBOL: &str = "T";
const STARTING_CASH: i64 = 10_000;

async fn exchange_with(mm_inventory: u32) -> (Exchange, Account, Account) {
    let exchange = Exchange::new();
    exchange.add_instrument(SYMBOL, None).await;

    let mm =
        Account::new("mm", Money::from_i64(STARTING_CASH)).with_inventory(SYMBOL, mm_inventory);
    let user = Account::new("user", Money::from_i64(STARTING_CASH));
    exchange.register_account(mm.clone()).await.unwrap();
    exchange.register_account(user.clone()).await.unwrap();
    (exchange, mm, user)
}

#[tokio::test]
async fn s1_simple_cross() {
    let (exchange, mm, user) = exchange_with(5).await;

    let ask = Order::new(mm.account_id, Money::from_i64(100), 5, TimeInForce::Day);
    exchange.place_order(SYMBOL, ask, Side::Sell).await.unwrap();

    let bid = Order::new(user.account_id, Money::from_i64(100), 5, TimeInForce::Day);
    let (trades, status) = exchange.place_order(SYMBOL, bid, Side::Buy).await.unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].price, Money::from_i64(100));
    assert_eq!(trades[0].quantity, 5);
    assert_eq!(status, exchange_core::OrderStatus::Filled);

    let user_after = exchange.get_account(user.account_id).await.unwrap();
    assert_eq!(user_after.cash, Money::from_i64(9500));
    assert_eq!(user_after.inventory_of(SYMBOL), 5);
}

#[tokio::test]
async fn s2_partial_fill_day_rests_remainder() {
    let (exchange, mm, user) = exchange_with(3).await;

    let ask = Order::new(mm.account_id, Money::from_i64(100), 3, TimeInForce::Day);
    exchange.place_order(SYMBOL, ask, Side::Sell).await.unwrap();

    let bid = Order::new(user.account_id, Money::from_i64(100), 10, TimeInForce::Day);
    let (trades, status) = exchange.place_order(SYMBOL, bid, Side::Buy).await.unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].quantity, 3);
    assert_eq!(status, exchange_core::OrderStatus::Partial);

    let user_after = exchange.get_account(user.account_id).await.unwrap();
    assert_eq!(user_after.cash, Money::from_i64(9000));
    assert_eq!(user_after.inventory_of(SYMBOL), 3);

    let (best_bid, _) = exchange.get_best_bid_ask(SYMBOL).await.unwrap();
    assert_eq!(best_bid, Some(Money::from_i64(100)));
}

#[tokio::test]
async fn s3_price_improvement_refunds_exactly() {
    let (exchange, mm, user) = exchange_with(5).await;

    let ask = Order::new(mm.account_id, Money::from_i64(90), 5, TimeInForce::Day);
    exchange.place_order(SYMBOL, ask, Side::Sell).await.unwrap();

    let bid = Order::new(user.account_id, Money::from_i64(100), 5, TimeInForce::Day);
    let (trades, status) = exchange.place_order(SYMBOL, bid, Side::Buy).await.unwrap();

    assert_eq!(trades[0].price, Money::from_i64(90));
    assert_eq!(status, exchange_core::OrderStatus::Filled);

    let user_after = exchange.get_account(user.account_id).await.unwrap();
    assert_eq!(user_after.cash, Money::from_i64(9550));
    assert_eq!(user_after.inventory_of(SYMBOL), 5);
}

#[tokio::test]
async fn partial_fill_refunds_price_improvement_on_filled_portion() {
    let (exchange, mm, user) = exchange_with(3).await;

    let ask = Order::new(mm.account_id, Money::from_i64(90), 3, TimeInForce::Day);
    exchange.place_order(SYMBOL, ask, Side::Sell).await.unwrap();

    let bid = Order::new(user.account_id, Money::from_i64(100), 10, TimeInForce::Day);
    let (trades, status) = exchange.place_order(SYMBOL, bid, Side::Buy).await.unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].price, Money::from_i64(90));
    assert_eq!(status, exchange_core::OrderStatus::Partial);

    // Escrowed 100*10=1000 up front. Filled 3@90=270, resting 7@100=700.
    // The 3*(100-90)=30 price improvement on the filled quantity must be
    // refunded even though the order still has a remainder resting.
    let user_after = exchange.get_account(user.account_id).await.unwrap();
    assert_eq!(user_after.cash, Money::from_i64(STARTING_CASH - 700 - 270));
    assert_eq!(user_after.inventory_of(SYMBOL), 3);
}

#[tokio::test]
async fn s4_ioc_partial_refunds_unfilled_remainder() {
    let (exchange, mm, user) = exchange_with(3).await;

    let ask = Order::new(mm.account_id, Money::from_i64(100), 3, TimeInForce::Day);
    exchange.place_order(SYMBOL, ask, Side::Sell).await.unwrap();

    let bid = Order::new(user.account_id, Money::from_i64(100), 10, TimeInForce::Ioc);
    let (trades, status) = exchange.place_order(SYMBOL, bid, Side::Buy).await.unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].quantity, 3);
    assert_eq!(status, exchange_core::OrderStatus::Filled);

    let user_after = exchange.get_account(user.account_id).await.unwrap();
    assert_eq!(user_after.cash, Money::from_i64(9700));
    assert_eq!(user_after.inventory_of(SYMBOL), 3);

    let (best_bid, _) = exchange.get_best_bid_ask(SYMBOL).await.unwrap();
    assert_eq!(best_bid, None);
}

#[tokio::test]
async fn s5_fok_unfillable_is_atomic() {
    let (exchange, mm, user) = exchange_with(3).await;

    let ask = Order::new(mm.account_id, Money::from_i64(100), 3, TimeInForce::Day);
    exchange.place_order(SYMBOL, ask, Side::Sell).await.unwrap();

    let bid = Order::new(user.account_id, Money::from_i64(100), 10, TimeInForce::Fok);
    let err = exchange
        .place_order(SYMBOL, bid, Side::Buy)
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::FokUnfillable(_)));

    let user_after = exchange.get_account(user.account_id).await.unwrap();
    assert_eq!(user_after.cash, Money::from_i64(STARTING_CASH));
    assert_eq!(user_after.inventory_of(SYMBOL), 0);

    let (_, best_ask) = exchange.get_best_bid_ask(SYMBOL).await.unwrap();
    assert_eq!(best_ask, Some(Money::from_i64(100)));
}

#[tokio::test]
async fn s6_sweep_multiple_levels_in_price_order() {
    let exchange = Exchange::new();
    exchange.add_instrument(SYMBOL, None).await;

    let buyer_high = Account::new("buyer-high", Money::from_i64(STARTING_CASH));
    let buyer_low = Account::new("buyer-low", Money::from_i64(STARTING_CASH));
    let seller = Account::new("seller", Money::from_i64(STARTING_CASH)).with_inventory(SYMBOL, 100);
    exchange.register_account(buyer_high.clone()).await.unwrap();
    exchange.register_account(buyer_low.clone()).await.unwrap();
    exchange.register_account(seller.clone()).await.unwrap();

    exchange
        .place_order(
            SYMBOL,
            Order::new(
                buyer_high.account_id,
                Money::from_i64(105),
                5,
                TimeInForce::Day,
            ),
            Side::Buy,
        )
        .await
        .unwrap();
    exchange
        .place_order(
            SYMBOL,
            Order::new(
                buyer_low.account_id,
                Money::from_i64(100),
                5,
                TimeInForce::Day,
            ),
            Side::Buy,
        )
        .await
        .unwrap();

    let ask = Order::new(seller.account_id, Money::from_i64(99), 8, TimeInForce::Day);
    let (trades, status) = exchange.place_order(SYMBOL, ask, Side::Sell).await.unwrap();

    assert_eq!(trades.len(), 2);
    assert_eq!(
        (trades[0].price, trades[0].quantity),
        (Money::from_i64(105), 5)
    );
    assert_eq!(
        (trades[1].price, trades[1].quantity),
        (Money::from_i64(100), 3)
    );
    assert_eq!(status, exchange_core::OrderStatus::Filled);

    let seller_after = exchange.get_account(seller.account_id).await.unwrap();
    assert_eq!(seller_after.cash, Money::from_i64(10825));
    assert_eq!(seller_after.inventory_of(SYMBOL), 92);
}

#[tokio::test]
async fn s7_cancel_refunds_escrow() {
    let (exchange, _mm, user) = exchange_with(0).await;

    let bid = Order::new(user.account_id, Money::from_i64(50), 10, TimeInForce::Day);
    let order_id = bid.order_id;
    exchange.place_order(SYMBOL, bid, Side::Buy).await.unwrap();

    let user_escrowed = exchange.get_account(user.account_id).await.unwrap();
    assert_eq!(user_escrowed.cash, Money::from_i64(9500));

    let refunded_qty = exchange
        .cancel_order(SYMBOL, order_id, Side::Buy, user.account_id)
        .await
        .unwrap();
    assert_eq!(refunded_qty, 10);

    let user_after = exchange.get_account(user.account_id).await.unwrap();
    assert_eq!(user_after.cash, Money::from_i64(STARTING_CASH));

    let (best_bid, _) = exchange.get_best_bid_ask(SYMBOL).await.unwrap();
    assert_eq!(best_bid, None);

    let err = exchange
        .cancel_order(SYMBOL, order_id, Side::Buy, user.account_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::OrderNotFound(_)));
}

#[tokio::test]
async fn cancel_by_non_owner_is_rejected_and_leaves_order_resting() {
    let (exchange, _mm, user) = exchange_with(0).await;
    let other = Account::new("other", Money::from_i64(STARTING_CASH));
    exchange.register_account(other.clone()).await.unwrap();

    let bid = Order::new(user.account_id, Money::from_i64(50), 10, TimeInForce::Day);
    let order_id = bid.order_id;
    exchange.place_order(SYMBOL, bid, Side::Buy).await.unwrap();

    let user_escrowed = exchange.get_account(user.account_id).await.unwrap();
    assert_eq!(user_escrowed.cash, Money::from_i64(9500));

    let err = exchange
        .cancel_order(SYMBOL, order_id, Side::Buy, other.account_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::OrderNotFound(_)));

    // No state change: escrow still held, order still resting.
    let user_after = exchange.get_account(user.account_id).await.unwrap();
    assert_eq!(user_after.cash, Money::from_i64(9500));
    let (best_bid, _) = exchange.get_best_bid_ask(SYMBOL).await.unwrap();
    assert_eq!(best_bid, Some(Money::from_i64(50)));

    // The rightful owner can still cancel it afterwards.
    let refunded_qty = exchange
        .cancel_order(SYMBOL, order_id, Side::Buy, user.account_id)
        .await
        .unwrap();
    assert_eq!(refunded_qty, 10);
}

#[tokio::test]
async fn liquidity_provider_is_exempt_from_escrow_and_settlement_credit() {
    let exchange = Exchange::new();
    exchange.add_instrument(SYMBOL, None).await;

    let lp = Account::new("lp", Money::from_i64(STARTING_CASH)).liquidity_provider();
    let user = Account::new("user", Money::from_i64(STARTING_CASH));
    exchange.register_account(lp.clone()).await.unwrap();
    exchange.register_account(user.clone()).await.unwrap();

    let ask = Order::new(lp.account_id, Money::from_i64(100), 5, TimeInForce::Day);
    exchange.place_order(SYMBOL, ask, Side::Sell).await.unwrap();

    let lp_before_fill = exchange.get_account(lp.account_id).await.unwrap();
    assert_eq!(lp_before_fill.inventory_of(SYMBOL), 0);

    let bid = Order::new(user.account_id, Money::from_i64(100), 5, TimeInForce::Day);
    exchange.place_order(SYMBOL, bid, Side::Buy).await.unwrap();

    let lp_after = exchange.get_account(lp.account_id).await.unwrap();
    assert_eq!(lp_after.cash, Money::from_i64(STARTING_CASH));
    assert_eq!(lp_after.inventory_of(SYMBOL), 0);
}
