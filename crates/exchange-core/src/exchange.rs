//! The exchange: accounts, per-instrument books and locks, escrow, and the
//! settlement path that turns matched trades into ledger updates.
//!
//! Concurrency model: each instrument owns an exclusive `tokio::sync::Mutex`
//! guarding its `OrderBook` plus a running sequence counter and last-trade
//! price. `place_order`/`cancel_order`/`cancel_all_for_account` acquire only
//! that instrument's lock, so two calls against different instruments run
//! concurrently. The account map is a separate `RwLock` acquired only for
//! the instant of each individual debit/credit — see §5 of the design
//! document for the accepted cross-instrument cash race this implies.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use common::types::{AccountId, OrderId, Side, TimeInForce};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::book::{OrderBook, PriceLevel};
use crate::domain::{Account, Order, OrderStatus, Trade};
use crate::engine;
use crate::error::{ExchangeError, ExchangeResult};
use crate::event::{EventSink, NullEventSink};
use crate::money::Money;

struct InstrumentState {
    book: Mutex<OrderBook>,
    sequence: AtomicU64,
    last_trade_price: Mutex<Option<Money>>,
}

impl InstrumentState {
    fn new(symbol: &str) -> Self {
        Self {
            book: Mutex::new(OrderBook::new(symbol)),
            sequence: AtomicU64::new(0),
            last_trade_price: Mutex::new(None),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }
}

/// The exchange's process-wide state holder. Constructed explicitly and
/// passed by `Arc` to concurrent callers — there is no ambient singleton.
pub struct Exchange {
    instruments: RwLock<HashMap<String, Arc<InstrumentState>>>,
    accounts: RwLock<HashMap<AccountId, Account>>,
    sink: Box<dyn EventSink>,
}

impl Exchange {
    pub fn new() -> Self {
        Self {
            instruments: RwLock::new(HashMap::new()),
            accounts: RwLock::new(HashMap::new()),
            sink: Box::new(NullEventSink),
        }
    }

    pub fn with_event_sink(sink: impl EventSink + 'static) -> Self {
        Self {
            instruments: RwLock::new(HashMap::new()),
            accounts: RwLock::new(HashMap::new()),
            sink: Box::new(sink),
        }
    }

    /// Idempotent: re-registering an already-listed symbol is a no-op.
    pub async fn add_instrument(&self, symbol: &str, initial_price: Option<Money>) {
        let mut instruments = self.instruments.write().await;
        if instruments.contains_key(symbol) {
            return;
        }
        let mut state = InstrumentState::new(symbol);
        if let Some(price) = initial_price {
            *state.last_trade_price.get_mut() = Some(price);
        }
        instruments.insert(symbol.to_string(), Arc::new(state));
        info!(symbol, "instrument added");
    }

    pub async fn register_account(&self, account: Account) -> ExchangeResult<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.account_id) {
            return Err(ExchangeError::DuplicateAccount(account.account_id));
        }
        accounts.insert(account.account_id, account);
        Ok(())
    }

    pub async fn get_account(&self, id: AccountId) -> Option<Account> {
        self.accounts.read().await.get(&id).cloned()
    }

    pub async fn accounts(&self) -> Vec<Account> {
        self.accounts.read().await.values().cloned().collect()
    }

    pub async fn instruments(&self) -> Vec<String> {
        self.instruments.read().await.keys().cloned().collect()
    }

    pub async fn get_best_bid_ask(&self, symbol: &str) -> Option<(Option<Money>, Option<Money>)> {
        let instrument = self.instruments.read().await.get(symbol)?.clone();
        let book = instrument.book.lock().await;
        Some((book.best_bid(), book.best_ask()))
    }

    /// Falls back to the midpoint of top-of-book when there's no trade
    /// history yet but both sides are populated; otherwise the last trade
    /// price, or nothing.
    pub async fn get_last_price(&self, symbol: &str) -> Option<Money> {
        let instrument = self.instruments.read().await.get(symbol)?.clone();
        let last = *instrument.last_trade_price.lock().await;
        if last.is_some() {
            return last;
        }
        let book = instrument.book.lock().await;
        match (book.best_bid(), book.best_ask()) {
            (Some(bid), Some(ask)) => Some(Money::new(
                (bid.as_decimal() + ask.as_decimal()) / rust_decimal::Decimal::TWO,
            )),
            _ => None,
        }
    }

    pub async fn snapshot_book(&self, symbol: &str) -> Option<(Vec<PriceLevel>, Vec<PriceLevel>)> {
        let instrument = self.instruments.read().await.get(symbol)?.clone();
        let book = instrument.book.lock().await;
        Some((
            book.aggregate_levels(Side::Buy),
            book.aggregate_levels(Side::Sell),
        ))
    }

    async fn instrument_state(&self, symbol: &str) -> ExchangeResult<Arc<InstrumentState>> {
        self.instruments
            .read()
            .await
            .get(symbol)
            .cloned()
            .ok_or_else(|| ExchangeError::UnknownInstrument(symbol.to_string()))
    }

    /// Places `order` on `side` of `symbol`'s book. See the module-level
    /// design document for the full step-by-step settlement algorithm this
    /// implements.
    pub async fn place_order(
        &self,
        symbol: &str,
        mut order: Order,
        side: Side,
    ) -> ExchangeResult<(Vec<Trade>, OrderStatus)> {
        let instrument = self.instrument_state(symbol).await?;
        // Confirm the account exists before taking the instrument lock.
        if self.get_account(order.account_id).await.is_none() {
            return Err(ExchangeError::UnknownAccount(order.account_id));
        }
        if !(order.price.is_positive()) {
            return Err(ExchangeError::BadInput("price must be positive".into()));
        }
        if order.remaining == 0 {
            return Err(ExchangeError::BadInput("quantity must be positive".into()));
        }

        let mut book = instrument.book.lock().await;

        let original_qty = order.remaining;
        let is_lp = self.is_liquidity_provider(order.account_id).await;

        // Step 3: pre-trade escrow.
        if !is_lp {
            self.debit_escrow(symbol, &order, side).await?;
        }

        // Step 4: FOK pre-check, before any mutation of the book.
        if order.time_in_force == TimeInForce::Fok {
            let available = book.available_crossing_quantity(side, order.price);
            if available < order.remaining {
                if !is_lp {
                    self.refund_escrow(symbol, order.account_id, side, order.price, original_qty)
                        .await;
                }
                warn!(
                    symbol,
                    order_id = %order.order_id,
                    available,
                    required = order.remaining,
                    "FOK order rejected: insufficient crossing liquidity"
                );
                return Err(ExchangeError::FokUnfillable(order.order_id));
            }
        }

        order.sequence = instrument.next_sequence();
        info!(
            symbol,
            order_id = %order.order_id,
            side = %side,
            price = %order.price,
            quantity = order.remaining,
            tif = %order.time_in_force,
            "order admitted"
        );

        // Step 5: run the matching engine.
        let mut next_seq = || instrument.next_sequence();
        let outcome = engine::match_order(&mut book, order, side, &mut next_seq);
        let order = outcome.taker;
        let trades = outcome.trades;

        // Step 6: settle each trade (credit counterparties; taker's own
        // debit already happened in step 3).
        if !trades.is_empty() {
            self.settle_trades(symbol, &trades).await;
            *instrument.last_trade_price.lock().await = Some(trades.last().unwrap().price);
        }

        let filled_qty = original_qty - order.remaining;
        let taker_trade_notional: Money = trades
            .iter()
            .filter(|t| self.order_is_taker(t, side, &order))
            .map(|t| t.price * t.quantity)
            .sum();

        // Price improvement on the filled quantity: the buyer escrowed at
        // their limit price but crossed at each maker's (better-or-equal)
        // price. Refund the difference as soon as it's realized, regardless
        // of whether any remainder rests, is cancelled, or fills too.
        if !is_lp && side == Side::Buy && filled_qty > 0 {
            let refund = order.price.times_qty(filled_qty) - taker_trade_notional;
            self.credit_cash(order.account_id, refund).await;
        }

        // Step 8: terminal disposition per time-in-force.
        let status = match order.time_in_force {
            TimeInForce::Day => {
                if order.remaining > 0 {
                    book.add(order.clone(), side);
                    if filled_qty == 0 {
                        OrderStatus::Open
                    } else {
                        OrderStatus::Partial
                    }
                } else {
                    OrderStatus::Filled
                }
            }
            TimeInForce::Ioc => {
                if order.remaining > 0 {
                    if !is_lp {
                        self.refund_escrow(
                            symbol,
                            order.account_id,
                            side,
                            order.price,
                            order.remaining,
                        )
                        .await;
                    }
                    if filled_qty > 0 {
                        OrderStatus::Filled
                    } else {
                        OrderStatus::Cancelled
                    }
                } else {
                    OrderStatus::Filled
                }
            }
            TimeInForce::Fok => {
                // The pre-check in step 4 guarantees a full fill here.
                OrderStatus::Filled
            }
        };

        drop(book);

        if !trades.is_empty() {
            self.sink.on_trades(symbol, &trades);
        }

        Ok((trades, status))
    }

    pub async fn cancel_order(
        &self,
        symbol: &str,
        order_id: OrderId,
        side: Side,
        account_id: AccountId,
    ) -> ExchangeResult<u32> {
        let instrument = self.instrument_state(symbol).await?;
        let mut book = instrument.book.lock().await;
        match book.find_by_id(order_id, side) {
            Some(order) if order.account_id == account_id => {}
            _ => return Err(ExchangeError::OrderNotFound(order_id)),
        }
        let removed = book
            .remove_by_id(order_id, side)
            .ok_or(ExchangeError::OrderNotFound(order_id))?;
        drop(book);

        if !self.is_liquidity_provider(account_id).await {
            self.refund_escrow(symbol, account_id, side, removed.price, removed.remaining)
                .await;
        }
        Ok(removed.remaining)
    }

    pub async fn cancel_all_for_account(
        &self,
        symbol: &str,
        account_id: AccountId,
    ) -> ExchangeResult<Vec<(Order, Side)>> {
        let instrument = self.instrument_state(symbol).await?;
        let mut book = instrument.book.lock().await;
        let removed = book.remove_all_for_account(account_id);
        drop(book);

        if !self.is_liquidity_provider(account_id).await {
            for (order, side) in &removed {
                self.refund_escrow(symbol, account_id, *side, order.price, order.remaining)
                    .await;
            }
        }
        Ok(removed)
    }

    async fn is_liquidity_provider(&self, account_id: AccountId) -> bool {
        self.accounts
            .read()
            .await
            .get(&account_id)
            .map(|a| a.is_liquidity_provider)
            .unwrap_or(false)
    }

    async fn debit_escrow(&self, symbol: &str, order: &Order, side: Side) -> ExchangeResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&order.account_id)
            .ok_or(ExchangeError::UnknownAccount(order.account_id))?;
        match side {
            Side::Buy => {
                let required = order.price.times_qty(order.remaining);
                if account.cash < required {
                    return Err(ExchangeError::InsufficientFunds {
                        account: order.account_id,
                        required: required.to_string(),
                        available: account.cash.to_string(),
                    });
                }
                account.debit_cash(required);
            }
            Side::Sell => {
                let available = account.inventory_of(symbol);
                if available < order.remaining {
                    return Err(ExchangeError::InsufficientInventory {
                        account: order.account_id,
                        required: order.remaining,
                        available,
                    });
                }
                account.debit_inventory_for(symbol, order.remaining);
            }
        }
        Ok(())
    }

    async fn refund_escrow(
        &self,
        symbol: &str,
        account_id: AccountId,
        side: Side,
        price: Money,
        qty: u32,
    ) {
        if qty == 0 {
            return;
        }
        let mut accounts = self.accounts.write().await;
        if let Some(account) = accounts.get_mut(&account_id) {
            match side {
                Side::Buy => account.credit_cash(price.times_qty(qty)),
                Side::Sell => account.credit_inventory_for(symbol, qty),
            }
        }
    }

    async fn credit_cash(&self, account_id: AccountId, amount: Money) {
        if !amount.is_positive() {
            return;
        }
        let mut accounts = self.accounts.write().await;
        if let Some(account) = accounts.get_mut(&account_id) {
            account.credit_cash(amount);
        }
    }

    /// Settlement credits for counterparties: buyer gets inventory, seller
    /// gets cash. The taker's own side was already escrowed in step 3, so
    /// only the *maker* side of each trade needs no further credit beyond
    /// what this loop gives both legs uniformly (liquidity providers are
    /// skipped per the ledger-neutral exemption).
    async fn settle_trades(&self, symbol: &str, trades: &[Trade]) {
        let mut accounts = self.accounts.write().await;
        for trade in trades {
            if let Some(buyer) = accounts.get_mut(&trade.buyer_id) {
                if !buyer.is_liquidity_provider {
                    buyer.credit_inventory_for(symbol, trade.quantity);
                }
            }
            if let Some(seller) = accounts.get_mut(&trade.seller_id) {
                if !seller.is_liquidity_provider {
                    seller.credit_cash(trade.price.times_qty(trade.quantity));
                }
            }
        }
    }

    fn order_is_taker(&self, trade: &Trade, taker_side: Side, taker: &Order) -> bool {
        match taker_side {
            Side::Buy => trade.buy_order_id == taker.order_id,
            Side::Sell => trade.sell_order_id == taker.order_id,
        }
    }
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}
