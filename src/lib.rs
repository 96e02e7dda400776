// ============================================================================
// Order Matching Engine Library
// Per-symbol price/time matching with transactional persistence
// ============================================================================

//! # Order Matching Engine
//!
//! A limit order book and matching engine for any number of symbols, backed
//! by a transactional store.
//!
//! ## Features
//!
//! - **Price/time priority** for limit and market orders
//! - **Per-symbol locking**: one mutex per book, symbols never contend
//! - **Commit before apply**: the in-memory book only changes after the
//!   store accepted the operation's writes
//! - **Startup recovery** of every resting order from the store
//! - **Fixed-point arithmetic** for prices and quantities
//!
//! ## Example
//!
//! ```rust
//! use order_matching_engine::prelude::*;
//! use order_matching_engine::numeric::{Price, Quantity};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let engine = MatchingEngine::start(EngineConfig::default(), store).unwrap();
//!
//! let sell = OrderRequest::limit(
//!     "BTCUSD",
//!     Side::Sell,
//!     Price::from_integer(50000).unwrap(),
//!     Quantity::from_integer(1).unwrap(),
//! );
//! engine.place(sell).unwrap();
//!
//! let buy = OrderRequest::market("BTCUSD", Side::Buy, Quantity::from_integer(1).unwrap());
//! let placement = engine.place(buy).unwrap();
//! assert_eq!(placement.trades.len(), 1);
//! assert_eq!(placement.order.status(), OrderStatus::Filled);
//!
//! let snapshot = engine.snapshot("BTCUSD").unwrap();
//! println!("Best bid: {:?}", snapshot.best_bid());
//! println!("Best ask: {:?}", snapshot.best_ask());
//! ```

pub mod domain;
pub mod engine;
pub mod interfaces;
pub mod numeric;
pub mod persistence;
pub mod utils;

// Re-exports for convenience
pub mod prelude {
    pub use crate::domain::{
        EngineConfig, Order, OrderBook, OrderBookSnapshot, OrderId, OrderRequest, OrderStatus,
        OrderType, PriceLevel, Side, Trade, ValidationError,
    };
    pub use crate::engine::{EngineError, EngineResult, ErrorKind, MatchingEngine, Placement};
    pub use crate::interfaces::{PersistenceGateway, WriteBatch};
    pub use crate::persistence::InMemoryStore;

    #[cfg(feature = "async")]
    pub use crate::engine::AsyncMatchingEngine;
}
