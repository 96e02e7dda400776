// ============================================================================
// Basic Usage Example
// ============================================================================

use order_matching_engine::numeric::{Price, Quantity};
use order_matching_engine::prelude::*;
use order_matching_engine::utils::init_logging;
use std::sync::Arc;

fn print_book(snapshot: &OrderBookSnapshot) {
    println!("\nBids:");
    for level in &snapshot.bids {
        println!("  {} @ {} ({} orders)", level.quantity, level.price, level.orders);
    }

    println!("\nAsks:");
    for level in &snapshot.asks {
        println!("  {} @ {} ({} orders)", level.quantity, level.price, level.orders);
    }

    println!("\nSpread: {:?}", snapshot.spread().map(|s| s.to_string()));
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info");
    println!("=== Matching Engine Example ===\n");

    let config = EngineConfig::from_env()?;
    let store = Arc::new(InMemoryStore::new());
    let engine = MatchingEngine::start(config, store.clone())?;

    println!("Started engine for {:?}\n", engine.symbols());

    // Add sell orders at different prices
    println!("Adding sell orders...");
    for i in 0i64..5 {
        engine.place(OrderRequest::limit(
            "BTCUSD",
            Side::Sell,
            Price::from_integer(50000 + i * 100)?,
            Quantity::from_integer(1)?,
        ))?;
    }

    // Add buy orders
    println!("Adding buy orders...");
    let mut last_buy = None;
    for i in 0i64..5 {
        let placement = engine.place(OrderRequest::limit(
            "BTCUSD",
            Side::Buy,
            Price::from_integer(49900 - i * 100)?,
            Quantity::from_integer(1)?,
        ))?;
        last_buy = Some(placement.order.id);
    }

    println!("\n=== Order Book Snapshot ===");
    print_book(&engine.snapshot("BTCUSD")?);

    // A limit buy that crosses the first 3 ask levels
    println!("\n=== Submitting Crossing Order ===");
    let placement = engine.place(OrderRequest::limit(
        "BTCUSD",
        Side::Buy,
        Price::from_integer(50200)?,
        "2.5".parse()?,
    ))?;

    for trade in &placement.trades {
        println!("  Trade: {} @ {} (qty: {})", trade.id, trade.price, trade.quantity);
    }
    println!(
        "  Order {} is {} with {} remaining",
        placement.order.id,
        placement.order.status(),
        placement.order.remaining_quantity()
    );

    // A market sell larger than the bid side
    println!("\n=== Submitting Market Order ===");
    let market = engine.place(OrderRequest::market(
        "BTCUSD",
        Side::Sell,
        Quantity::from_integer(10)?,
    ))?;
    println!(
        "  Executed {} in {} trades, order {}",
        market.executed_quantity(),
        market.trades.len(),
        market.order.status()
    );

    if let Some(id) = last_buy {
        match engine.cancel(id) {
            Ok(order) => println!("\nCanceled {}", order.id),
            Err(e) => println!("\nCould not cancel {}: {}", id, e),
        }
    }

    println!("\n=== Final Order Book ===");
    let final_snapshot = engine.snapshot("BTCUSD")?;
    println!("Bids: {} levels", final_snapshot.bids.len());
    println!("Asks: {} levels", final_snapshot.asks.len());

    println!("\n=== Recent Trades ===");
    for trade in engine.recent_trades("BTCUSD", 0)? {
        println!("  {} {} @ {}", trade.executed_at, trade.quantity, trade.price);
    }

    Ok(())
}
