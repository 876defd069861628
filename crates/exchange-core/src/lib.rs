//! Matching engine and settlement kernel for OpenExchange.
//!
//! # Architecture
//!
//! - [`money`] - fixed-point monetary value used throughout the ledger
//! - [`domain`] - core types (`Order`, `Trade`, `Account`, `OrderStatus`)
//! - [`book`] - per-instrument price-level ladder (`OrderBook`)
//! - [`engine`] - the pure matching algorithm
//! - [`event`] - the `EventSink` observer boundary
//! - [`exchange`] - accounts, per-instrument locking, escrow and settlement
//! - [`error`] - the `ExchangeError` type returned across the public API
//!
//! The matching algorithm itself is a pure function over an `OrderBook` and
//! an incoming order; settlement (debiting and crediting accounts) is the
//! [`exchange::Exchange`]'s job, built from the trades the engine returns.

pub mod book;
pub mod domain;
pub mod engine;
pub mod error;
pub mod event;
pub mod exchange;
pub mod money;

pub use book::{OrderBook, PriceLevel};
pub use domain::{Account, Order, OrderStatus, Trade};
pub use engine::{match_order, MatchOutcome};
pub use error::{ExchangeError, ExchangeResult};
pub use event::{ChannelEventSink, EventSink, NullEventSink};
pub use exchange::Exchange;
pub use money::Money;
