//! Core domain types: orders, trades, accounts.
//!
//! These types are shared across the order book, the matching engine, and
//! the exchange's settlement path. Side lives on the book, not on the
//! order itself — an `Order` only knows its price, remaining quantity,
//! owner, admission sequence, and time-in-force.

use std::collections::HashMap;

use common::types::{AccountId, OrderId, TimeInForce, TradeId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

/// An order admitted into the exchange.
///
/// `sequence` is assigned by the exchange at admission time and is the
/// sole tiebreak for price-time priority — it is monotonic and unique by
/// construction, unlike a wall-clock timestamp under a coarse clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub price: Money,
    pub remaining: u32,
    pub sequence: u64,
    pub time_in_force: TimeInForce,
}

impl Order {
    pub fn new(
        account_id: AccountId,
        price: Money,
        quantity: u32,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            order_id: OrderId::new(),
            account_id,
            price,
            remaining: quantity,
            sequence: 0,
            time_in_force,
        }
    }

    /// Decrement remaining quantity by `qty`. Never underflows: callers
    /// never ask for more than `remaining`.
    pub fn fill(&mut self, qty: u32) {
        self.remaining = self.remaining.saturating_sub(qty);
    }

    pub fn is_filled(&self) -> bool {
        self.remaining == 0
    }
}

/// An executed trade. Immutable once emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub instrument: String,
    pub price: Money,
    pub quantity: u32,
    pub buyer_id: AccountId,
    pub seller_id: AccountId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub sequence: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instrument: impl Into<String>,
        price: Money,
        quantity: u32,
        buyer_id: AccountId,
        seller_id: AccountId,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        sequence: u64,
    ) -> Self {
        Self {
            trade_id: TradeId::new(),
            instrument: instrument.into(),
            price,
            quantity,
            buyer_id,
            seller_id,
            buy_order_id,
            sell_order_id,
            sequence,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Terminal/intermediate disposition returned by `place_order`.
///
/// Per the open question on partial-IOC labelling: a partially-filled IOC
/// order reports `Filled` (matching the source's behaviour) rather than a
/// distinct "partial cancel" label — callers that need the exact filled
/// quantity should look at the trades returned alongside the status, not
/// infer it from the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Rests on the book with nothing filled yet
    Open,
    /// Rests on the book with some quantity filled
    Partial,
    /// Fully filled, nothing rests
    Filled,
    /// No quantity filled and nothing rests (IOC/FOK with zero crosses)
    Cancelled,
}

/// A participant in the exchange.
///
/// Liquidity-provider accounts are exempt from escrow debits and
/// settlement credits so that external market-making collaborators can be
/// bootstrapped without the exchange's ledger attributing flows to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    pub display_name: String,
    pub cash: Money,
    pub inventory: HashMap<String, u32>,
    pub is_liquidity_provider: bool,
}

impl Account {
    pub fn new(display_name: impl Into<String>, starting_cash: Money) -> Self {
        Self {
            account_id: AccountId::new(),
            display_name: display_name.into(),
            cash: starting_cash,
            inventory: HashMap::new(),
            is_liquidity_provider: false,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.account_id = AccountId::from_uuid(id);
        self
    }

    pub fn liquidity_provider(mut self) -> Self {
        self.is_liquidity_provider = true;
        self
    }

    pub fn with_inventory(mut self, instrument: impl Into<String>, qty: u32) -> Self {
        self.inventory.insert(instrument.into(), qty);
        self
    }

    pub fn inventory_of(&self, instrument: &str) -> u32 {
        self.inventory.get(instrument).copied().unwrap_or(0)
    }

    fn credit_inventory(&mut self, instrument: &str, qty: u32) {
        *self.inventory.entry(instrument.to_string()).or_insert(0) += qty;
    }

    fn debit_inventory(&mut self, instrument: &str, qty: u32) {
        if let Some(entry) = self.inventory.get_mut(instrument) {
            *entry = entry.saturating_sub(qty);
        }
    }

    /// Escrow cash for a resting/matching bid. Caller must have already
    /// checked `cash >= amount`.
    pub fn debit_cash(&mut self, amount: Money) {
        self.cash -= amount;
    }

    pub fn credit_cash(&mut self, amount: Money) {
        self.cash += amount;
    }

    /// Escrow inventory for a resting/matching ask. Caller must have
    /// already checked sufficient inventory.
    pub fn debit_inventory_for(&mut self, instrument: &str, qty: u32) {
        self.debit_inventory(instrument, qty);
    }

    pub fn credit_inventory_for(&mut self, instrument: &str, qty: u32) {
        self.credit_inventory(instrument, qty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::TimeInForce;

    #[test]
    fn order_fill_saturates() {
        let mut order = Order::new(AccountId::new(), Money::from_i64(100), 5, TimeInForce::Day);
        order.fill(3);
        assert_eq!(order.remaining, 2);
        assert!(!order.is_filled());
        order.fill(2);
        assert!(order.is_filled());
    }

    #[test]
    fn account_inventory_round_trips() {
        let mut account = Account::new("trader", Money::from_i64(1000));
        account.credit_inventory_for("AAPL", 10);
        assert_eq!(account.inventory_of("AAPL"), 10);
        account.debit_inventory_for("AAPL", 4);
        assert_eq!(account.inventory_of("AAPL"), 6);
    }
}
