// ============================================================================
// Persistence Gateway Interface
// The narrow transactional contract the engine needs from durable storage
// ============================================================================

use crate::domain::{Order, OrderId, OrderStatus, Trade};
use crate::numeric::Quantity;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("failed to begin transaction: {0}")]
    Begin(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("commit failed: {0}")]
    Commit(String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("order {0} does not exist")]
    MissingOrder(OrderId),

    #[error("order {0} already exists")]
    DuplicateOrder(OrderId),

    #[error("trade {0} already exists")]
    DuplicateTrade(Uuid),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// The mutable fields of an order, as written after a match or cancel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    pub order_id: OrderId,
    pub remaining_quantity: Quantity,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderUpdate {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            remaining_quantity: order.remaining_quantity(),
            status: order.status(),
            updated_at: order.updated_at(),
        }
    }
}

/// Every write produced by one engine operation.
///
/// Applied in field order (new orders, then updates, then trades) so trades
/// never reference an order the store has not seen yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    pub new_orders: Vec<Order>,
    pub order_updates: Vec<OrderUpdate>,
    pub trades: Vec<Trade>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_new_order(mut self, order: Order) -> Self {
        self.new_orders.push(order);
        self
    }

    pub fn with_update(mut self, update: OrderUpdate) -> Self {
        self.order_updates.push(update);
        self
    }

    pub fn len(&self) -> usize {
        self.new_orders.len() + self.order_updates.len() + self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An open unit of work. Dropping it without calling `commit` discards
/// every write made through it.
pub trait Transaction {
    fn create_order(&mut self, order: &Order) -> PersistenceResult<()>;

    /// Write remaining quantity, status and updated-at of an existing order
    fn update_order(&mut self, update: &OrderUpdate) -> PersistenceResult<()>;

    fn create_trade(&mut self, trade: &Trade) -> PersistenceResult<()>;

    /// Make all writes visible at once, or none of them
    fn commit(self: Box<Self>) -> PersistenceResult<()>;
}

/// Durable store of orders and trades.
///
/// Shared across all symbols; it needs no cross-symbol coordination because
/// the engine serializes writes per symbol.
pub trait PersistenceGateway: Send + Sync {
    fn begin(&self) -> PersistenceResult<Box<dyn Transaction + '_>>;

    fn fetch_order(&self, order_id: OrderId) -> PersistenceResult<Option<Order>>;

    /// Open and partial orders for `symbol`, oldest first
    fn fetch_open_orders(&self, symbol: &str) -> PersistenceResult<Vec<Order>>;

    /// Most recent trades for `symbol`, newest first
    fn recent_trades(&self, symbol: &str, limit: usize) -> PersistenceResult<Vec<Trade>>;

    /// Write a whole batch in a single transaction.
    fn commit_batch(&self, batch: &WriteBatch) -> PersistenceResult<()> {
        let mut tx = self.begin()?;
        for order in &batch.new_orders {
            tx.create_order(order)?;
        }
        for update in &batch.order_updates {
            tx.update_order(update)?;
        }
        for trade in &batch.trades {
            tx.create_trade(trade)?;
        }
        tx.commit()
    }
}
