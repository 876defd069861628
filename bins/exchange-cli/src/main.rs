//! OpenExchange demo CLI.
//!
//! Wires up an in-process `Exchange` and drives it through a scripted
//! scenario, printing each trade and the resulting book state. There is no
//! network surface here — the core is an in-process library, and this
//! binary exists to exercise it end to end.

use anyhow::Result;
use clap::{Parser, Subcommand};
use common::types::{Side, TimeInForce};
use exchange_core::{Account, Exchange, Money, Order};
use observability::{init_logging, LogFormat};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "exchange-cli")]
#[command(about = "OpenExchange matching engine demo")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scripted demo scenario against one instrument
    Demo {
        /// Instrument symbol to trade
        #[arg(short, long, default_value = "ACME")]
        symbol: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging("exchange-cli", LogFormat::Pretty)?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo { symbol } => run_demo(&symbol).await,
    }
}

async fn run_demo(symbol: &str) -> Result<()> {
    info!(symbol, "starting demo scenario");
    let exchange = Exchange::new();
    exchange.add_instrument(symbol, None).await;

    let alice = Account::new("alice", Money::from_i64(10_000));
    let bob = Account::new("bob", Money::from_i64(10_000)).with_inventory(symbol, 100);
    let (alice_id, bob_id) = (alice.account_id, bob.account_id);
    exchange.register_account(alice).await?;
    exchange.register_account(bob).await?;

    println!("-- resting ask: bob sells 10 @ 95 --");
    let ask = Order::new(bob_id, Money::from_i64(95), 10, TimeInForce::Day);
    let (trades, status) = exchange.place_order(symbol, ask, Side::Sell).await?;
    println!("  status={status:?} trades={}", trades.len());

    println!("-- crossing bid: alice buys 6 @ 100 (IOC) --");
    let bid = Order::new(alice_id, Money::from_i64(100), 6, TimeInForce::Ioc);
    let (trades, status) = exchange.place_order(symbol, bid, Side::Buy).await?;
    for trade in &trades {
        println!("  trade: {} @ {}", trade.quantity, trade.price);
    }
    println!("  status={status:?}");

    let (bid_px, ask_px) = exchange.get_best_bid_ask(symbol).await.unwrap();
    println!(
        "-- book after demo: best_bid={:?} best_ask={:?} --",
        bid_px, ask_px
    );

    let alice_after = exchange.get_account(alice_id).await.unwrap();
    let bob_after = exchange.get_account(bob_id).await.unwrap();
    println!(
        "  alice: cash={} inventory={}",
        alice_after.cash,
        alice_after.inventory_of(symbol)
    );
    println!(
        "  bob:   cash={} inventory={}",
        bob_after.cash,
        bob_after.inventory_of(symbol)
    );

    Ok(())
}
