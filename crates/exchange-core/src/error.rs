//! Exchange error types
//!
//! One variant per trigger documented for `place_order` / `cancel_order`.
//! None of these are retried internally; the caller decides what to do.

use common::types::{AccountId, OrderId};
use thiserror::Error;

/// Errors surfaced by the exchange to its callers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// The instrument symbol is not registered with the exchange
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    /// The order's account id has not been registered
    #[error("unknown account: {0}")]
    UnknownAccount(AccountId),

    /// `register_account` was called twice with the same id
    #[error("account already registered: {0}")]
    DuplicateAccount(AccountId),

    /// Price or quantity failed basic validation
    #[error("bad input: {0}")]
    BadInput(String),

    /// A bid's cash escrow check failed
    #[error("insufficient funds: account {account} needs {required}, has {available}")]
    InsufficientFunds {
        account: AccountId,
        required: String,
        available: String,
    },

    /// An ask's inventory escrow check failed
    #[error("insufficient inventory: account {account} needs {required}, has {available}")]
    InsufficientInventory {
        account: AccountId,
        required: u32,
        available: u32,
    },

    /// A fill-or-kill order could not be fully crossed at admission time
    #[error("order {0} could not be filled or killed: insufficient crossing liquidity")]
    FokUnfillable(OrderId),

    /// A cancel targeted an order that isn't resting on the book
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),
}

/// Convenience alias for exchange-core operations
pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;
