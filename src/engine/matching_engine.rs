// ============================================================================
// Matching Engine
// Per-symbol dispatch: lock the book, match, persist, then apply
// ============================================================================

use super::errors::{EngineError, EngineResult};
use super::price_time::{self, MatchOutcome};
use super::registry::{BookHandle, BookRegistry, SymbolBook};
use crate::domain::{
    EngineConfig, Order, OrderBook, OrderBookSnapshot, OrderId, OrderRequest, OrderStatus, Trade,
    ValidationError,
};
use crate::interfaces::{OrderUpdate, PersistenceGateway, WriteBatch};
use crate::numeric::Quantity;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of placing an order: its final state and the trades it produced
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
    pub order: Order,
    pub trades: Vec<Trade>,
}

impl Placement {
    /// Total quantity the order executed
    pub fn executed_quantity(&self) -> Quantity {
        self.trades.iter().map(|t| t.quantity).sum()
    }
}

impl From<MatchOutcome> for Placement {
    fn from(outcome: MatchOutcome) -> Self {
        Self {
            order: outcome.incoming,
            trades: outcome.trades.into_vec(),
        }
    }
}

/// Matching engine over any number of symbols.
///
/// Every placement and cancellation holds its symbol's book lock across
/// matching, the durable commit and the in-memory update, so the book always
/// reflects what the store holds. Different symbols never contend.
///
/// Books for symbols outside the configuration are loaded from the store the
/// first time they are used, so a restart never hides their resting orders.
pub struct MatchingEngine {
    config: EngineConfig,
    books: BookRegistry,
    store: Arc<dyn PersistenceGateway>,
}

impl MatchingEngine {
    /// Build an engine and rebuild every configured symbol's book from the
    /// store. Fails if any book cannot be recovered.
    pub fn start(config: EngineConfig, store: Arc<dyn PersistenceGateway>) -> EngineResult<Self> {
        config.validate()?;

        let engine = Self {
            config,
            books: BookRegistry::new(),
            store,
        };
        engine.recover()?;
        Ok(engine)
    }

    /// Rebuild all configured books from the store
    pub fn recover(&self) -> EngineResult<usize> {
        let mut total = 0;
        for symbol in &self.config.known_symbols {
            total += self.recover_symbol(symbol)?;
        }
        info!(
            "Recovered {} resting orders across {} symbols",
            total,
            self.config.known_symbols.len()
        );
        Ok(total)
    }

    /// Replace one symbol's book with the store's open and partial orders.
    /// Returns how many orders were loaded.
    pub fn recover_symbol(&self, symbol: &str) -> EngineResult<usize> {
        let handle = self.books.get_or_create(symbol);
        let mut slot = handle.lock();
        slot.replace(self.load_book(symbol)?);
        let loaded = slot.len();

        info!("Recovered {} orders for {}", loaded, symbol);
        Ok(loaded)
    }

    // ========================================================================
    // Order entry
    // ========================================================================

    /// Validate, match and persist a new order.
    pub fn place(&self, request: OrderRequest) -> EngineResult<Placement> {
        request.validate()?;
        self.check_symbol(&request.symbol)?;

        let symbol = request.symbol.clone();
        self.with_book(&symbol, |slot| {
            // Stamp creation under the lock so time priority follows lock order
            let order = Order::new(request);
            self.execute(slot, order)
        })
    }

    /// Match and persist an order the caller has already built. It must be
    /// untouched: open, with nothing filled. The caller's id is kept, but the
    /// creation time is replaced by the time the book lock was taken.
    pub fn submit(&self, order: Order) -> EngineResult<Placement> {
        order.request().validate()?;
        if order.status() != OrderStatus::Open || order.remaining_quantity() != order.initial_quantity {
            return Err(ValidationError::NotNew(order.id).into());
        }
        self.check_symbol(&order.symbol)?;

        let symbol = order.symbol.clone();
        self.with_book(&symbol, |slot| {
            let order = order.with_created_at(Utc::now());
            self.execute(slot, order)
        })
    }

    /// Cancel a working order and return it in its canceled state.
    pub fn cancel(&self, order_id: OrderId) -> EngineResult<Order> {
        let current = self.fetch_existing(order_id)?;
        ensure_working(&current)?;

        self.with_book(&current.symbol, |slot| {
            // Re-read under the lock; a match may have finished the order since
            let mut order = self.fetch_existing(order_id)?;
            ensure_working(&order)?;

            order.cancel(Utc::now())?;
            let batch = WriteBatch::new().with_update(OrderUpdate::from(&order));
            self.store.commit_batch(&batch).map_err(|e| {
                error!("Failed to persist cancel of {}: {}", order_id, e);
                e
            })?;
            slot.remove(order_id);

            info!(
                "Canceled order {} on {} with {} remaining",
                order.id,
                order.symbol,
                order.remaining_quantity()
            );
            Ok(order)
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Stored state of an order
    pub fn get_order(&self, order_id: OrderId) -> EngineResult<Order> {
        self.fetch_existing(order_id)
    }

    /// Aggregated depth for `symbol` as recorded in the store
    pub fn snapshot(&self, symbol: &str) -> EngineResult<OrderBookSnapshot> {
        let orders = self.store.fetch_open_orders(symbol)?;
        Ok(OrderBookSnapshot::from_orders(symbol, orders.iter()))
    }

    /// Aggregated depth for `symbol` from the in-memory book. A symbol with
    /// no book yet is read straight from the store without creating one.
    pub fn live_depth(&self, symbol: &str) -> EngineResult<OrderBookSnapshot> {
        match self.books.get(symbol) {
            Some(_) => self.with_book(symbol, |slot| Ok(slot.snapshot())),
            None => Ok(self.load_book(symbol)?.snapshot()),
        }
    }

    /// Newest trades first. Limits outside `1..=max_trade_limit` use the
    /// configured default.
    pub fn recent_trades(&self, symbol: &str, limit: usize) -> EngineResult<Vec<Trade>> {
        let limit = self.config.effective_trade_limit(limit);
        Ok(self.store.recent_trades(symbol, limit)?)
    }

    /// Handle to a symbol's in-memory book. Locking it blocks trading on
    /// that symbol; a stale book has not been loaded from the store yet.
    pub fn book(&self, symbol: &str) -> Option<BookHandle> {
        self.books.get(symbol)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Symbols that currently have a book
    pub fn symbols(&self) -> Vec<String> {
        self.books.symbols()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Lock `symbol`'s book, loading it from the store first if it is stale.
    fn with_book<T, F>(&self, symbol: &str, f: F) -> EngineResult<T>
    where
        F: FnOnce(&mut SymbolBook) -> EngineResult<T>,
    {
        let handle = self.books.get_or_create(symbol);
        let mut slot = handle.lock();
        if slot.is_stale() {
            slot.replace(self.load_book(symbol)?);
        }
        f(&mut *slot)
    }

    /// Runs with the book locked. Nothing in memory changes unless the
    /// store accepted the batch; once it has, the placement is reported as
    /// done whatever happens to the in-memory copy.
    fn execute(&self, slot: &mut SymbolBook, order: Order) -> EngineResult<Placement> {
        let now = Utc::now();
        let outcome = price_time::match_order(slot, order, now)?;

        self.store.commit_batch(&outcome.write_batch()).map_err(|e| {
            error!(
                "Failed to persist order {} on {}: {}",
                outcome.incoming.id,
                slot.symbol(),
                e
            );
            e
        })?;

        self.settle(slot, &outcome);

        let placement = Placement::from(outcome);
        self.log_placement(&placement);
        Ok(placement)
    }

    /// Apply a committed outcome to the book. If the book no longer matches
    /// what the outcome was computed from, rebuild it from the store, or
    /// leave it stale for the next operation when the store cannot be read.
    fn settle(&self, slot: &mut SymbolBook, outcome: &MatchOutcome) {
        let Err(e) = outcome.apply_to(slot) else {
            return;
        };

        let symbol = slot.symbol().to_string();
        error!(
            "Book {} diverged after commit of order {}: {}; reloading from store",
            symbol, outcome.incoming.id, e
        );
        match self.load_book(&symbol) {
            Ok(book) => slot.replace(book),
            Err(e) => {
                error!("Reload of {} failed: {}; retrying on next use", symbol, e);
                slot.mark_stale();
            }
        }
    }

    fn log_placement(&self, placement: &Placement) {
        let order = &placement.order;
        let executed = placement.executed_quantity();

        if order.is_market_order() && executed < order.initial_quantity {
            let discarded = order
                .initial_quantity
                .checked_sub(executed)
                .unwrap_or(Quantity::ZERO);
            warn!(
                "Market order {} on {} ran out of liquidity; discarded {}",
                order.id, order.symbol, discarded
            );
        }

        info!(
            "Placed {} {} order {} on {}: {} trades, status {}",
            order.side,
            order.order_type,
            order.id,
            order.symbol,
            placement.trades.len(),
            order.status()
        );
    }

    fn load_book(&self, symbol: &str) -> EngineResult<OrderBook> {
        let orders = self.store.fetch_open_orders(symbol)?;
        let mut book = OrderBook::new(symbol);

        for order in orders {
            let order_id = order.id;
            if let Err(e) = book.insert(order) {
                warn!("Skipping stored order {} for {}: {}", order_id, symbol, e);
            }
        }
        debug!("Loaded {} resting orders for {}", book.len(), symbol);
        Ok(book)
    }

    fn fetch_existing(&self, order_id: OrderId) -> EngineResult<Order> {
        self.store
            .fetch_order(order_id)?
            .ok_or(EngineError::NotFound { order_id })
    }

    fn check_symbol(&self, symbol: &str) -> EngineResult<()> {
        if self.config.reject_unknown_symbols && !self.config.is_known_symbol(symbol) {
            return Err(ValidationError::UnknownSymbol(symbol.to_string()).into());
        }
        Ok(())
    }
}

fn ensure_working(order: &Order) -> EngineResult<()> {
    if order.status().is_terminal() {
        return Err(EngineError::AlreadyFinalized {
            order_id: order.id,
            status: order.status(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use crate::engine::ErrorKind;
    use crate::numeric::Price;
    use crate::persistence::InMemoryStore;
    use chrono::Duration;
    use std::thread;

    fn px(v: i64) -> Price {
        Price::from_integer(v).unwrap()
    }

    fn qty(v: i64) -> Quantity {
        Quantity::from_integer(v).unwrap()
    }

    fn setup() -> (Arc<InMemoryStore>, MatchingEngine) {
        let store = Arc::new(InMemoryStore::new());
        let engine = MatchingEngine::start(EngineConfig::default(), store.clone()).unwrap();
        (store, engine)
    }

    fn buy(price: i64, quantity: i64) -> OrderRequest {
        OrderRequest::limit("BTCUSD", Side::Buy, px(price), qty(quantity))
    }

    fn sell(price: i64, quantity: i64) -> OrderRequest {
        OrderRequest::limit("BTCUSD", Side::Sell, px(price), qty(quantity))
    }

    #[test]
    fn test_round_trip_fills_both_sides() {
        let (store, engine) = setup();

        let resting = engine.place(buy(100, 2)).unwrap();
        assert_eq!(resting.order.status(), OrderStatus::Open);
        assert!(resting.trades.is_empty());

        let taker = engine.place(sell(100, 2)).unwrap();
        assert_eq!(taker.order.status(), OrderStatus::Filled);
        assert_eq!(taker.trades.len(), 1);
        assert_eq!(taker.trades[0].price, px(100));
        assert_eq!(taker.trades[0].quantity, qty(2));

        let stored = engine.get_order(resting.order.id).unwrap();
        assert_eq!(stored.status(), OrderStatus::Filled);
        assert!(engine.snapshot("BTCUSD").unwrap().is_empty());
        assert!(engine.live_depth("BTCUSD").unwrap().is_empty());
        assert_eq!(store.trade_count(), 1);
    }

    #[test]
    fn test_partial_fill_scenario() {
        let (_store, engine) = setup();

        let resting = engine.place(buy(100, 10)).unwrap();
        let taker = engine.place(sell(100, 15)).unwrap();

        assert_eq!(taker.trades.len(), 1);
        assert_eq!(taker.trades[0].quantity, qty(10));
        assert_eq!(taker.trades[0].buy_order_id, resting.order.id);
        assert_eq!(taker.order.status(), OrderStatus::Partial);
        assert_eq!(taker.order.remaining_quantity(), qty(5));

        assert_eq!(
            engine.get_order(resting.order.id).unwrap().status(),
            OrderStatus::Filled
        );

        let snapshot = engine.snapshot("BTCUSD").unwrap();
        assert!(snapshot.bids.is_empty());
        assert_eq!(snapshot.asks.len(), 1);
        assert_eq!(snapshot.asks[0].price, px(100));
        assert_eq!(snapshot.asks[0].quantity, qty(5));
        assert_eq!(snapshot, engine.live_depth("BTCUSD").unwrap());
    }

    #[test]
    fn test_time_priority_at_equal_price() {
        let (_store, engine) = setup();

        let first = engine.place(sell(100, 1)).unwrap().order;
        let second = engine.place(sell(100, 1)).unwrap().order;

        let taker = engine.place(buy(100, 1)).unwrap();
        assert_eq!(taker.trades[0].sell_order_id, first.id);
        assert_eq!(engine.get_order(second.id).unwrap().status(), OrderStatus::Open);
    }

    #[test]
    fn test_market_order_remainder_is_canceled() {
        let (store, engine) = setup();
        engine.place(sell(100, 1)).unwrap();

        let placement = engine
            .place(OrderRequest::market("BTCUSD", Side::Buy, qty(3)))
            .unwrap();

        assert_eq!(placement.trades.len(), 1);
        assert_eq!(placement.executed_quantity(), qty(1));
        assert_eq!(placement.order.status(), OrderStatus::Canceled);
        assert_eq!(placement.order.remaining_quantity(), Quantity::ZERO);

        let stored = store
            .orders()
            .into_iter()
            .find(|o| o.id == placement.order.id)
            .unwrap();
        assert_eq!(stored.status(), OrderStatus::Canceled);
        assert!(engine.snapshot("BTCUSD").unwrap().is_empty());
    }

    #[test]
    fn test_validation_rejects_before_matching() {
        let (store, engine) = setup();

        let err = engine.place(buy(100, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let mut with_price = OrderRequest::market("BTCUSD", Side::Buy, qty(1));
        with_price.price = Some(px(10));
        assert_eq!(
            engine.place(with_price).unwrap_err(),
            EngineError::Validation(ValidationError::MarketOrderWithPrice)
        );
        assert_eq!(store.order_count(), 0);
    }

    #[test]
    fn test_unknown_symbol_policy() {
        let store = Arc::new(InMemoryStore::new());
        let engine = MatchingEngine::start(
            EngineConfig::new(["BTCUSD"]).reject_unknown_symbols(true),
            store,
        )
        .unwrap();

        let err = engine
            .place(OrderRequest::limit("DOGEUSD", Side::Buy, px(1), qty(1)))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation(ValidationError::UnknownSymbol("DOGEUSD".to_string()))
        );

        // Permissive engines create the book on first use
        let (_store, open) = setup();
        open.place(OrderRequest::limit("DOGEUSD", Side::Buy, px(1), qty(1)))
            .unwrap();
        assert!(open.symbols().contains(&"DOGEUSD".to_string()));
    }

    #[test]
    fn test_cancel_and_cancel_again() {
        let (_store, engine) = setup();
        let order = engine.place(buy(100, 3)).unwrap().order;

        let canceled = engine.cancel(order.id).unwrap();
        assert_eq!(canceled.status(), OrderStatus::Canceled);
        assert_eq!(canceled.remaining_quantity(), qty(3));
        assert!(engine.live_depth("BTCUSD").unwrap().is_empty());

        let err = engine.cancel(order.id).unwrap_err();
        assert_eq!(
            err,
            EngineError::AlreadyFinalized {
                order_id: order.id,
                status: OrderStatus::Canceled
            }
        );
        assert_eq!(engine.get_order(order.id).unwrap(), canceled);
    }

    #[test]
    fn test_cancel_filled_and_missing() {
        let (_store, engine) = setup();
        let maker = engine.place(buy(100, 1)).unwrap().order;
        engine.place(sell(100, 1)).unwrap();

        assert_eq!(engine.cancel(maker.id).unwrap_err().kind(), ErrorKind::AlreadyFinalized);

        let missing = OrderId::new();
        assert_eq!(
            engine.cancel(missing).unwrap_err(),
            EngineError::NotFound { order_id: missing }
        );
    }

    #[test]
    fn test_commit_failure_leaves_state_untouched() {
        let (store, engine) = setup();
        let maker = engine.place(buy(100, 5)).unwrap().order;
        let before = engine.live_depth("BTCUSD").unwrap();

        store.fail_next_commit();
        let err = engine.place(sell(100, 2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.is_retryable());

        assert_eq!(engine.live_depth("BTCUSD").unwrap(), before);
        assert_eq!(store.trade_count(), 0);
        assert_eq!(store.order_count(), 1);
        assert_eq!(engine.get_order(maker.id).unwrap().remaining_quantity(), qty(5));

        // Retrying after the failure goes through
        assert_eq!(engine.place(sell(100, 2)).unwrap().trades.len(), 1);
    }

    #[test]
    fn test_cancel_commit_failure_keeps_order_resting() {
        let (store, engine) = setup();
        let order = engine.place(buy(100, 1)).unwrap().order;

        store.fail_next_begin();
        assert_eq!(engine.cancel(order.id).unwrap_err().kind(), ErrorKind::Persistence);
        assert_eq!(engine.live_depth("BTCUSD").unwrap().bids.len(), 1);
        assert_eq!(engine.get_order(order.id).unwrap().status(), OrderStatus::Open);
    }

    #[test]
    fn test_start_recovers_resting_orders() {
        let store = Arc::new(InMemoryStore::new());
        {
            let engine = MatchingEngine::start(EngineConfig::default(), store.clone()).unwrap();
            engine.place(buy(99, 1)).unwrap();
            engine.place(buy(100, 2)).unwrap();
            engine.place(sell(105, 3)).unwrap();
            let gone = engine.place(sell(110, 1)).unwrap().order;
            engine.cancel(gone.id).unwrap();
        }

        let engine = MatchingEngine::start(EngineConfig::default(), store).unwrap();
        let live = engine.live_depth("BTCUSD").unwrap();
        assert_eq!(live, engine.snapshot("BTCUSD").unwrap());
        assert_eq!(live.best_bid(), Some(px(100)));
        assert_eq!(live.best_ask(), Some(px(105)));
        assert_eq!(live.bids.len() + live.asks.len(), 3);

        // The recovered book keeps matching
        let taker = engine.place(sell(99, 3)).unwrap();
        let prices: Vec<Price> = taker.trades.iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![px(100), px(99)]);
    }

    #[test]
    fn test_start_fails_when_store_unreadable() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_next_read();
        let err = MatchingEngine::start(EngineConfig::default(), store).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_recent_trades_limit() {
        let (_store, engine) = setup();
        for _ in 0..3 {
            engine.place(sell(100, 1)).unwrap();
            engine.place(buy(100, 1)).unwrap();
        }

        assert_eq!(engine.recent_trades("BTCUSD", 2).unwrap().len(), 2);
        assert_eq!(engine.recent_trades("BTCUSD", 0).unwrap().len(), 3);
        assert_eq!(engine.recent_trades("BTCUSD", 1_000).unwrap().len(), 3);
        assert!(engine.recent_trades("ETHUSD", 10).unwrap().is_empty());
    }

    #[test]
    fn test_submit_requires_fresh_order() {
        let (_store, engine) = setup();
        let mut order = Order::new(buy(100, 2));
        order.fill(qty(1), Utc::now()).unwrap();

        assert_eq!(
            engine.submit(order.clone()).unwrap_err(),
            EngineError::Validation(ValidationError::NotNew(order.id))
        );

        let fresh = Order::new(buy(100, 2));
        let placement = engine.submit(fresh.clone()).unwrap();
        assert_eq!(placement.order.id, fresh.id);
        assert_eq!(placement.order.request(), fresh.request());
    }

    #[test]
    fn test_submit_backdated_order_queues_behind() {
        let (_store, engine) = setup();
        let first = engine.place(sell(100, 1)).unwrap().order;

        let backdated = Order::new(sell(100, 1)).with_created_at(Utc::now() - Duration::hours(1));
        let later = engine.submit(backdated.clone()).unwrap().order;
        assert_eq!(later.id, backdated.id);
        assert!(later.created_at >= first.created_at);

        let taker = engine.place(buy(100, 1)).unwrap();
        assert_eq!(taker.trades[0].sell_order_id, first.id);
        assert_eq!(engine.get_order(later.id).unwrap().status(), OrderStatus::Open);
        assert_eq!(engine.get_order(later.id).unwrap().created_at, later.created_at);
    }

    #[test]
    fn test_unconfigured_symbol_recovers_on_first_use() {
        let store = Arc::new(InMemoryStore::new());
        let resting = {
            let engine = MatchingEngine::start(EngineConfig::default(), store.clone()).unwrap();
            engine
                .place(OrderRequest::limit("SOLUSD", Side::Buy, px(100), qty(1)))
                .unwrap()
                .order
        };

        let engine = MatchingEngine::start(EngineConfig::default(), store.clone()).unwrap();
        assert!(engine.book("SOLUSD").is_none());
        assert_eq!(engine.live_depth("SOLUSD").unwrap().best_bid(), Some(px(100)));
        // Reading depth does not create a book
        assert!(engine.book("SOLUSD").is_none());

        let taker = engine
            .place(OrderRequest::limit("SOLUSD", Side::Sell, px(100), qty(1)))
            .unwrap();
        assert_eq!(taker.trades.len(), 1);
        assert_eq!(taker.trades[0].buy_order_id, resting.id);
        assert_eq!(taker.order.status(), OrderStatus::Filled);
        assert_eq!(engine.get_order(resting.id).unwrap().status(), OrderStatus::Filled);
        assert!(engine.snapshot("SOLUSD").unwrap().is_empty());
        assert!(engine.live_depth("SOLUSD").unwrap().is_empty());
    }

    #[test]
    fn test_cancel_on_unconfigured_symbol_after_restart() {
        let store = Arc::new(InMemoryStore::new());
        let order = {
            let engine = MatchingEngine::start(EngineConfig::default(), store.clone()).unwrap();
            engine
                .place(OrderRequest::limit("SOLUSD", Side::Sell, px(20), qty(4)))
                .unwrap()
                .order
        };

        let engine = MatchingEngine::start(EngineConfig::default(), store).unwrap();
        assert_eq!(engine.cancel(order.id).unwrap().status(), OrderStatus::Canceled);

        let handle = engine.book("SOLUSD").unwrap();
        let slot = handle.lock();
        assert!(!slot.is_stale());
        assert!(!slot.contains(order.id));
    }

    /// Commit an outcome computed against a book the engine never saw, so
    /// applying it to the engine's book fails on the first maker.
    fn diverged_outcome(store: &InMemoryStore) -> MatchOutcome {
        let maker = Order::new(sell(100, 1));
        store.insert_order(maker.clone()).unwrap();

        let mut elsewhere = OrderBook::new("BTCUSD");
        elsewhere.insert(maker).unwrap();
        let outcome = price_time::match_order(&elsewhere, Order::new(buy(100, 3)), Utc::now()).unwrap();
        store.commit_batch(&outcome.write_batch()).unwrap();
        outcome
    }

    #[test]
    fn test_divergence_after_commit_reloads_book() {
        let (store, engine) = setup();
        let outcome = diverged_outcome(&store);

        let handle = engine.book("BTCUSD").unwrap();
        let mut slot = handle.lock();
        engine.settle(&mut slot, &outcome);

        assert!(!slot.is_stale());
        let rested = slot.get(outcome.incoming.id).unwrap();
        assert_eq!(rested.remaining_quantity(), qty(2));
        assert_eq!(slot.len(), 1);
    }

    #[test]
    fn test_failed_reload_leaves_book_stale_until_next_use() {
        let (store, engine) = setup();
        let outcome = diverged_outcome(&store);

        {
            let handle = engine.book("BTCUSD").unwrap();
            let mut slot = handle.lock();
            store.fail_next_read();
            engine.settle(&mut slot, &outcome);
            assert!(slot.is_stale());
        }

        // The next operation loads the committed state before matching
        let depth = engine.live_depth("BTCUSD").unwrap();
        assert_eq!(depth, engine.snapshot("BTCUSD").unwrap());
        assert_eq!(depth.best_bid(), Some(px(100)));

        let taker = engine.place(sell(100, 2)).unwrap();
        assert_eq!(taker.trades.len(), 1);
        assert_eq!(taker.trades[0].buy_order_id, outcome.incoming.id);
        assert!(engine.live_depth("BTCUSD").unwrap().is_empty());
        assert!(!engine.book("BTCUSD").unwrap().lock().is_stale());
    }

    #[test]
    fn test_stale_book_with_unreadable_store_fails_retryably() {
        let (store, engine) = setup();
        engine.book("BTCUSD").unwrap().lock().mark_stale();

        store.fail_next_read();
        let err = engine.place(buy(100, 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(store.order_count(), 0);

        assert_eq!(engine.place(buy(100, 1)).unwrap().order.status(), OrderStatus::Open);
    }

    #[test]
    fn test_concurrent_symbols_and_same_symbol() {
        let (store, engine) = setup();
        let engine = Arc::new(engine);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let symbol = if i % 2 == 0 { "BTCUSD" } else { "ETHUSD" };
                    let side = if i % 4 < 2 { Side::Buy } else { Side::Sell };
                    for _ in 0..25 {
                        engine
                            .place(OrderRequest::limit(symbol, side, px(100), qty(1)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Equal buy and sell interest at one price must cross out completely
        for symbol in ["BTCUSD", "ETHUSD"] {
            assert!(engine.live_depth(symbol).unwrap().is_empty());
            assert!(engine.snapshot(symbol).unwrap().is_empty());
        }
        assert_eq!(store.trade_count(), 100);
    }
}
