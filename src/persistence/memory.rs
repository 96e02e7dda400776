// ============================================================================
// In-Memory Store
// Reference PersistenceGateway with all-or-nothing transactions
// ============================================================================

use crate::domain::{Order, OrderId, Trade};
use crate::interfaces::{
    OrderUpdate, PersistenceError, PersistenceGateway, PersistenceResult, Transaction, WriteBatch,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Debug, Default)]
struct StoreState {
    /// Orders in insertion order
    orders: Vec<Order>,
    positions: HashMap<OrderId, usize>,
    trades: Vec<Trade>,
    trade_ids: HashSet<Uuid>,
}

impl StoreState {
    fn order(&self, id: OrderId) -> Option<&Order> {
        self.positions.get(&id).map(|&pos| &self.orders[pos])
    }

    /// Check a batch against current contents without changing anything
    fn check(&self, batch: &WriteBatch) -> PersistenceResult<()> {
        let mut new_ids = HashSet::new();
        for order in &batch.new_orders {
            if self.positions.contains_key(&order.id) || !new_ids.insert(order.id) {
                return Err(PersistenceError::DuplicateOrder(order.id));
            }
        }

        let known = |id: OrderId| self.positions.contains_key(&id) || new_ids.contains(&id);

        for update in &batch.order_updates {
            if !known(update.order_id) {
                return Err(PersistenceError::MissingOrder(update.order_id));
            }
        }

        let mut trade_ids = HashSet::new();
        for trade in &batch.trades {
            if self.trade_ids.contains(&trade.id) || !trade_ids.insert(trade.id) {
                return Err(PersistenceError::DuplicateTrade(trade.id));
            }
            for id in [trade.buy_order_id, trade.sell_order_id] {
                if !known(id) {
                    return Err(PersistenceError::MissingOrder(id));
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, batch: WriteBatch) {
        for order in batch.new_orders {
            self.positions.insert(order.id, self.orders.len());
            self.orders.push(order);
        }
        for update in &batch.order_updates {
            if let Some(&pos) = self.positions.get(&update.order_id) {
                self.orders[pos] = with_update(&self.orders[pos], update);
            }
        }
        for trade in batch.trades {
            self.trade_ids.insert(trade.id);
            self.trades.push(trade);
        }
    }
}

fn with_update(order: &Order, update: &OrderUpdate) -> Order {
    Order::restore(
        order.id,
        order.symbol.clone(),
        order.side,
        order.order_type,
        order.price,
        order.initial_quantity,
        update.remaining_quantity,
        update.status,
        order.created_at,
        update.updated_at,
    )
}

/// Process-local store, used by tests, benchmarks and demos.
///
/// Writes are staged in the transaction and applied under one lock at
/// commit, so readers never observe half of a batch. Failure injection flags
/// let tests exercise the engine's rollback path.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    fail_next_begin: AtomicBool,
    fail_next_commit: AtomicBool,
    fail_next_read: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an order directly, outside any transaction.
    pub fn insert_order(&self, order: Order) -> PersistenceResult<()> {
        let mut state = self.state.lock();
        if state.positions.contains_key(&order.id) {
            return Err(PersistenceError::DuplicateOrder(order.id));
        }
        let pos = state.orders.len();
        state.positions.insert(order.id, pos);
        state.orders.push(order);
        Ok(())
    }

    /// Make the next `begin` fail
    pub fn fail_next_begin(&self) {
        self.fail_next_begin.store(true, Ordering::Release);
    }

    /// Make the next `commit` fail; its writes are discarded
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::Release);
    }

    /// Make the next read query fail
    pub fn fail_next_read(&self) {
        self.fail_next_read.store(true, Ordering::Release);
    }

    pub fn orders(&self) -> Vec<Order> {
        self.state.lock().orders.clone()
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.state.lock().trades.clone()
    }

    pub fn order_count(&self) -> usize {
        self.state.lock().orders.len()
    }

    pub fn trade_count(&self) -> usize {
        self.state.lock().trades.len()
    }

    fn check_read(&self) -> PersistenceResult<()> {
        if self.fail_next_read.swap(false, Ordering::AcqRel) {
            return Err(PersistenceError::Read("injected read failure".to_string()));
        }
        Ok(())
    }
}

/// Transaction over an [`InMemoryStore`]
pub struct MemoryTransaction<'a> {
    store: &'a InMemoryStore,
    staged: WriteBatch,
}

impl Transaction for MemoryTransaction<'_> {
    fn create_order(&mut self, order: &Order) -> PersistenceResult<()> {
        self.staged.new_orders.push(order.clone());
        Ok(())
    }

    fn update_order(&mut self, update: &OrderUpdate) -> PersistenceResult<()> {
        self.staged.order_updates.push(update.clone());
        Ok(())
    }

    fn create_trade(&mut self, trade: &Trade) -> PersistenceResult<()> {
        self.staged.trades.push(trade.clone());
        Ok(())
    }

    fn commit(self: Box<Self>) -> PersistenceResult<()> {
        let MemoryTransaction { store, staged } = *self;
        if store.fail_next_commit.swap(false, Ordering::AcqRel) {
            return Err(PersistenceError::Commit("injected commit failure".to_string()));
        }

        let mut state = store.state.lock();
        state.check(&staged)?;
        state.apply(staged);
        Ok(())
    }
}

impl PersistenceGateway for InMemoryStore {
    fn begin(&self) -> PersistenceResult<Box<dyn Transaction + '_>> {
        if self.fail_next_begin.swap(false, Ordering::AcqRel) {
            return Err(PersistenceError::Begin("injected begin failure".to_string()));
        }
        Ok(Box::new(MemoryTransaction {
            store: self,
            staged: WriteBatch::new(),
        }))
    }

    fn fetch_order(&self, order_id: OrderId) -> PersistenceResult<Option<Order>> {
        self.check_read()?;
        Ok(self.state.lock().order(order_id).cloned())
    }

    fn fetch_open_orders(&self, symbol: &str) -> PersistenceResult<Vec<Order>> {
        self.check_read()?;
        let mut open: Vec<Order> = self
            .state
            .lock()
            .orders
            .iter()
            .filter(|o| o.symbol == symbol && o.status().is_active())
            .cloned()
            .collect();
        // Stable: equal timestamps keep insertion order
        open.sort_by_key(|o| o.created_at);
        Ok(open)
    }

    fn recent_trades(&self, symbol: &str, limit: usize) -> PersistenceResult<Vec<Trade>> {
        self.check_read()?;
        let mut trades: Vec<Trade> = self
            .state
            .lock()
            .trades
            .iter()
            .rev()
            .filter(|t| t.symbol == symbol)
            .cloned()
            .collect();
        trades.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        trades.truncate(limit);
        Ok(trades)
    }
}
