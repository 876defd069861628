//! Observability infrastructure for OpenExchange
//!
//! This crate provides structured logging via `tracing`. It is deliberately
//! thin: the exchange core never depends on it directly, only the binaries
//! that embed the core do.
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("exchange-cli", LogFormat::Pretty)?;
//! ```

pub mod logging;

pub use logging::{init_logging, LogFormat};
