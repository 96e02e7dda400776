// ============================================================================
// Domain Models Module
// Contains all core domain entities and value objects
// ============================================================================

pub mod config;
pub mod order;
pub mod order_book;
pub mod trade;

pub use config::{ConfigError, EngineConfig};
pub use order::{
    Order, OrderId, OrderRequest, OrderStateError, OrderStatus, OrderStatusTransition, OrderType,
    Side, ValidationError,
};
pub use order_book::{BookError, OrderBook, OrderBookSide, OrderBookSnapshot, PriceLevel};
pub use trade::Trade;
